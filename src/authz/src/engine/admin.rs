//! Administrative write path and role-rank helpers
//!
//! Writes go to the store first; cache invalidation completes before the
//! call returns, then the audit event is emitted.

use chrono::Utc;
use tracing::{info, warn};

use super::audit::{AuditAction, AuditEvent};
use super::PermissionEngine;
use crate::error::{AuthzError, Result};
use crate::grant::{Grant, PrincipalType};
use crate::hierarchy::Role;

impl PermissionEngine {
    /// Persist a grant.
    ///
    /// Assigns an id when absent and stamps `granted_at`. Returns the grant as stored.
    pub async fn grant(&self, mut grant: Grant) -> Result<Grant> {
        validate_grant(&grant)?;

        if grant.id.is_empty() {
            grant.id = uuid::Uuid::new_v4().to_string();
        }
        grant.granted_at = Utc::now();

        self.store.set_grant(grant.clone()).await?;
        self.invalidate_for(&grant).await;

        info!(
            "Granted {:?} {:?} on {}/{} to {:?} {} ({})",
            grant.effect,
            grant.actions,
            grant.resource_type,
            grant.resource_id,
            grant.principal_type,
            grant.principal_id,
            grant.id
        );

        self.emit(AuditEvent::for_grant(AuditAction::Grant, &grant)).await;
        Ok(grant)
    }

    /// Delete a grant by id.
    ///
    /// The engine keeps no grant-to-principal index, so the caller invalidates
    /// the affected principal (or use [`PermissionEngine::revoke_grant`]).
    pub async fn revoke(&self, grant_id: &str) -> Result<()> {
        self.store.delete_grant(grant_id).await?;

        info!("Revoked grant {}", grant_id);
        self.emit(AuditEvent::revoked_id(grant_id)).await;
        Ok(())
    }

    /// Delete a known grant and invalidate its principal
    pub async fn revoke_grant(&self, grant: &Grant) -> Result<()> {
        self.store.delete_grant(&grant.id).await?;
        self.invalidate_for(grant).await;

        info!(
            "Revoked grant {} from {:?} {}",
            grant.id, grant.principal_type, grant.principal_id
        );
        self.emit(AuditEvent::for_grant(AuditAction::Revoke, grant)).await;
        Ok(())
    }

    /// Drop one principal's cached grant set
    pub async fn invalidate_principal(&self, principal_id: &str) {
        if let Some(cache) = &self.cache {
            cache.invalidate(principal_id).await;
        }
    }

    /// Drop every cached grant set
    pub async fn invalidate_all(&self) {
        if let Some(cache) = &self.cache {
            cache.clear().await;
            info!("Effective grant cache invalidated");
        }
    }

    /// Add or replace a role. Every cached set may depend on it, so the cache is cleared.
    pub async fn register_role(&self, role: Role) {
        self.hierarchy.write().register(role);
        self.invalidate_all().await;
    }

    /// True when any directly assigned role has `rank >= min_rank`.
    ///
    /// Inheritance is not consulted. Lookup failures answer false.
    pub async fn has_role_level(&self, principal_id: &str, min_rank: i32) -> bool {
        let role_ids = match self.store.get_user_role_ids(principal_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Role lookup failed for principal {}: {}", principal_id, e);
                return false;
            }
        };

        let hierarchy = self.hierarchy.read();
        role_ids
            .iter()
            .filter_map(|id| hierarchy.rank(id))
            .any(|rank| rank >= min_rank)
    }

    /// True when any assigned role outranks `target_role_id` strictly.
    ///
    /// Equal ranks never manage each other, including a role managing itself.
    pub async fn can_manage_role(&self, principal_id: &str, target_role_id: &str) -> bool {
        let role_ids = match self.store.get_user_role_ids(principal_id).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Role lookup failed for principal {}: {}", principal_id, e);
                return false;
            }
        };

        let hierarchy = self.hierarchy.read();
        let Some(target_rank) = hierarchy.rank(target_role_id) else {
            return false;
        };

        role_ids
            .iter()
            .filter_map(|id| hierarchy.rank(id))
            .any(|rank| rank > target_rank)
    }

    async fn invalidate_for(&self, grant: &Grant) {
        match grant.principal_type {
            PrincipalType::User => self.invalidate_principal(&grant.principal_id).await,
            // Holders of the role and of its descendants are not indexed
            PrincipalType::Role => self.invalidate_all().await,
        }
    }

    async fn emit(&self, event: AuditEvent) {
        if let Some(sink) = &self.audit_sink {
            if let Err(e) = sink.record(event).await {
                warn!("Audit sink rejected event: {}", e);
            }
        }
    }
}

fn validate_grant(grant: &Grant) -> Result<()> {
    if grant.principal_id.is_empty() {
        return Err(AuthzError::InvalidGrant("principal id is empty".to_string()));
    }
    if grant.resource_type.is_empty() {
        return Err(AuthzError::InvalidGrant("resource type is empty".to_string()));
    }
    if grant.resource_id.is_empty() {
        return Err(AuthzError::InvalidGrant("resource id is empty".to_string()));
    }
    if grant.actions.is_empty() || grant.actions.iter().any(|a| a.is_empty()) {
        return Err(AuthzError::InvalidGrant(format!(
            "grant for {} has no usable actions",
            grant.principal_id
        )));
    }
    Ok(())
}
