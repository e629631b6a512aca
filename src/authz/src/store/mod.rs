//! Permission storage boundary
//!
//! The engine consumes grants and role assignments through [`PermissionStore`]
//! and never manages connections or transactions itself.

mod in_memory;

pub use in_memory::InMemoryPermissionStore;

use crate::error::Result;
use crate::grant::Grant;
use crate::types::RoleId;
use async_trait::async_trait;

/// Source of raw grants and role assignments
///
/// Implementations own persistence; callers bound latency by dropping the
/// future (e.g. `tokio::time::timeout`).
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Grants attached directly to a user
    async fn get_user_grants(&self, user_id: &str) -> Result<Vec<Grant>>;

    /// Grants attached to a role
    async fn get_role_grants(&self, role_id: &str) -> Result<Vec<Grant>>;

    /// Roles assigned to a user, not expanded through inheritance
    async fn get_user_role_ids(&self, user_id: &str) -> Result<Vec<RoleId>>;

    /// Persist a grant, replacing any grant with the same id
    async fn set_grant(&self, grant: Grant) -> Result<()>;

    /// Delete a grant by id
    async fn delete_grant(&self, grant_id: &str) -> Result<()>;
}
