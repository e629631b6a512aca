//! # Gatehouse Authorization Engine
//!
//! Answers "may this principal perform this action on this resource?" with an
//! auditable reason.
//!
//! ## Features
//!
//! - **Role inheritance** with single-parent chains and cycle-safe traversal
//! - **Resource matching** with exact, `*` and `prefix*` semantics
//! - **Attribute conditions** (`eq`, `ne`, `in`, `not_in`) over request context
//! - **Deny overrides allow**, priority tie-breaks within an effect
//! - **TTL cache** of expanded grant sets with explicit invalidation
//! - **Fail-closed**: store errors, malformed requests and no-match all deny
//!
//! ## Example
//!
//! ```rust
//! use gatehouse_authz::{
//!     EngineConfig, Grant, InMemoryPermissionStore, PermissionEngine, PermissionRequest,
//!     RoleHierarchy,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(InMemoryPermissionStore::new());
//!     store.assign_role("user-1", "editor");
//!
//!     let engine = PermissionEngine::new(
//!         EngineConfig::default(),
//!         store,
//!         RoleHierarchy::with_default_roles(),
//!     );
//!
//!     engine
//!         .grant(Grant::deny("user-1", "project", "P1", ["delete"]).with_priority(100))
//!         .await?;
//!
//!     let request = PermissionRequest::new("user-1", "project", "P2", "delete");
//!     let decision = engine.evaluate(&request).await;
//!
//!     if decision.allowed {
//!         println!("Access granted: {}", decision.reason);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod condition;
pub mod engine;
pub mod error;
pub mod grant;
pub mod hierarchy;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use condition::{Condition, ConditionOperator, ConditionValue};
pub use engine::{
    AuditAction, AuditEvent, AuditSink, CacheStats, EffectiveGrantCache, EngineConfig,
    EngineMetrics, InMemoryAuditSink, PermissionEngine, TracingAuditSink,
};
pub use error::{AuthzError, Result};
pub use grant::{Effect, Grant, PrincipalType};
pub use hierarchy::{Role, RoleHierarchy};
pub use store::{InMemoryPermissionStore, PermissionStore};
pub use types::{EffectiveGrantSet, GrantId, PermissionDecision, PermissionRequest, RoleId};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
