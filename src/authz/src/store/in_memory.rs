//! In-memory permission store.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;

use super::PermissionStore;
use crate::error::{AuthzError, Result};
use crate::grant::{Grant, PrincipalType};
use crate::types::{GrantId, RoleId};

/// An in-memory permission store.
#[derive(Clone, Default)]
pub struct InMemoryPermissionStore {
    /// Grants, indexed by ID.
    grants: Arc<DashMap<GrantId, Grant>>,

    /// Role assignments, indexed by user ID.
    user_roles: Arc<DashMap<String, Vec<RoleId>>>,
}

impl InMemoryPermissionStore {
    /// Create a new in-memory permission store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign a role to a user (idempotent).
    pub fn assign_role(&self, user_id: impl Into<String>, role_id: impl Into<String>) {
        let role_id = role_id.into();
        let mut roles = self.user_roles.entry(user_id.into()).or_default();
        if !roles.contains(&role_id) {
            roles.push(role_id);
        }
    }

    /// Remove a role assignment; returns whether it existed.
    pub fn unassign_role(&self, user_id: &str, role_id: &str) -> bool {
        match self.user_roles.get_mut(user_id) {
            Some(mut roles) => {
                let before = roles.len();
                roles.retain(|r| r != role_id);
                roles.len() != before
            }
            None => false,
        }
    }

    /// Number of stored grants.
    pub fn grant_count(&self) -> usize {
        self.grants.len()
    }

    fn grants_for(&self, principal_type: PrincipalType, principal_id: &str) -> Vec<Grant> {
        let mut grants: Vec<Grant> = self
            .grants
            .iter()
            .filter(|g| g.principal_type == principal_type && g.principal_id == principal_id)
            .map(|g| g.value().clone())
            .collect();
        // DashMap iteration order is arbitrary
        grants.sort_by(|a, b| a.id.cmp(&b.id));
        grants
    }
}

#[async_trait]
impl PermissionStore for InMemoryPermissionStore {
    async fn get_user_grants(&self, user_id: &str) -> Result<Vec<Grant>> {
        Ok(self.grants_for(PrincipalType::User, user_id))
    }

    async fn get_role_grants(&self, role_id: &str) -> Result<Vec<Grant>> {
        Ok(self.grants_for(PrincipalType::Role, role_id))
    }

    async fn get_user_role_ids(&self, user_id: &str) -> Result<Vec<RoleId>> {
        Ok(self
            .user_roles
            .get(user_id)
            .map(|roles| roles.value().clone())
            .unwrap_or_default())
    }

    async fn set_grant(&self, grant: Grant) -> Result<()> {
        if grant.id.is_empty() {
            return Err(AuthzError::InvalidGrant("grant id is empty".to_string()));
        }
        self.grants.insert(grant.id.clone(), grant);
        Ok(())
    }

    async fn delete_grant(&self, grant_id: &str) -> Result<()> {
        if self.grants.remove(grant_id).is_none() {
            return Err(AuthzError::GrantNotFound(grant_id.to_string()));
        }
        Ok(())
    }
}
