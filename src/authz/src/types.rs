//! Request, decision and grant-set types

use crate::condition::ConditionValue;
use crate::error::{AuthzError, Result};
use crate::grant::Grant;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique grant identifier
pub type GrantId = String;

/// Unique role identifier
pub type RoleId = String;

/// Reason attached to a default deny
pub const NO_MATCHING_GRANT: &str = "no matching grant";

/// A single "is this allowed?" question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRequest {
    /// User asking
    pub principal_id: String,

    pub resource_type: String,

    pub resource_id: String,

    pub action: String,

    /// Ambient attributes consulted by grant conditions
    #[serde(default)]
    pub context: HashMap<String, ConditionValue>,
}

impl PermissionRequest {
    pub fn new(
        principal_id: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            principal_id: principal_id.into(),
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            action: action.into(),
            context: HashMap::new(),
        }
    }

    /// Add a context attribute
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<ConditionValue>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Reject requests that cannot be evaluated
    pub fn validate(&self) -> Result<()> {
        if self.principal_id.is_empty() {
            return Err(AuthzError::InvalidInput("principal id is empty".to_string()));
        }
        if self.resource_type.is_empty() {
            return Err(AuthzError::InvalidInput("resource type is empty".to_string()));
        }
        if self.action.is_empty() {
            return Err(AuthzError::InvalidInput("action is empty".to_string()));
        }
        Ok(())
    }
}

/// Outcome of a permission check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDecision {
    pub allowed: bool,

    pub reason: String,

    /// Grant that determined the outcome; `None` for default and error denies
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_grant_id: Option<GrantId>,
}

impl PermissionDecision {
    /// Decision determined by a grant
    pub fn matched(grant: &Grant, request: &PermissionRequest) -> Self {
        let allowed = grant.effect == crate::grant::Effect::Allow;
        let verb = if allowed { "allows" } else { "denies" };

        Self {
            allowed,
            reason: format!(
                "grant '{}' {} {} on {}/{}",
                grant.id, verb, request.action, request.resource_type, request.resource_id
            ),
            matched_grant_id: Some(grant.id.clone()),
        }
    }

    pub fn default_deny() -> Self {
        Self::deny_with(NO_MATCHING_GRANT.to_string())
    }

    pub fn invalid_request(detail: impl std::fmt::Display) -> Self {
        Self::deny_with(format!("invalid request: {}", detail))
    }

    pub fn lookup_failed(detail: impl std::fmt::Display) -> Self {
        Self::deny_with(format!("lookup failed: {}", detail))
    }

    fn deny_with(reason: String) -> Self {
        Self {
            allowed: false,
            reason,
            matched_grant_id: None,
        }
    }
}

/// Fully expanded grants for one principal
///
/// Immutable once built; shared through the cache as an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectiveGrantSet {
    /// Direct, role and inherited grants
    pub grants: Vec<Grant>,

    /// Assigned roles followed by their ancestors, without duplicates
    pub expanded_role_ids: Vec<RoleId>,

    pub computed_at: DateTime<Utc>,
}

impl EffectiveGrantSet {
    pub fn new(grants: Vec<Grant>, expanded_role_ids: Vec<RoleId>) -> Self {
        Self {
            grants,
            expanded_role_ids,
            computed_at: Utc::now(),
        }
    }
}
