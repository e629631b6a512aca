//! Grant definition and matching

use crate::condition::{Condition, ConditionValue};
use crate::types::{GrantId, RoleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Wildcard token for resource types, resource ids and actions
pub const WILDCARD: &str = "*";

/// Grant effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    Allow,
    Deny,
}

/// Kind of principal a grant is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalType {
    User,
    Role,
}

/// A single allow/deny rule scoping a principal to a resource pattern and action set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grant {
    /// Unique grant identifier (assigned on write when empty)
    #[serde(default)]
    pub id: GrantId,

    pub principal_id: String,

    pub principal_type: PrincipalType,

    /// Resource type or `*`
    pub resource_type: String,

    /// Exact id, `*`, or a prefix pattern ending in `*`
    pub resource_id: String,

    /// Actions covered; `*` covers any action
    pub actions: BTreeSet<String>,

    /// All must hold for the grant to apply
    #[serde(default)]
    pub conditions: Vec<Condition>,

    pub effect: Effect,

    /// Tie-break among grants of the same effect (higher first)
    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub granted_by: String,

    pub granted_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Grant {
    /// Create a grant for a principal; id is left empty for the engine to assign
    pub fn new<I, S>(
        principal_type: PrincipalType,
        principal_id: impl Into<String>,
        effect: Effect,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        actions: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: String::new(),
            principal_id: principal_id.into(),
            principal_type,
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            actions: actions.into_iter().map(Into::into).collect(),
            conditions: Vec::new(),
            effect,
            priority: 0,
            granted_by: String::new(),
            granted_at: Utc::now(),
            expires_at: None,
        }
    }

    /// Allow grant for a user
    pub fn allow<I, S>(
        user_id: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        actions: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(PrincipalType::User, user_id, Effect::Allow, resource_type, resource_id, actions)
    }

    /// Deny grant for a user
    pub fn deny<I, S>(
        user_id: impl Into<String>,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
        actions: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(PrincipalType::User, user_id, Effect::Deny, resource_type, resource_id, actions)
    }

    /// Synthetic wildcard allow carrying a role's inherited permissions.
    ///
    /// Lowest possible priority so any explicit grant takes precedence.
    pub fn inherited(role_id: &str, permissions: BTreeSet<String>) -> Self {
        Self {
            id: format!("inherited:{}", role_id),
            principal_id: role_id.to_string(),
            principal_type: PrincipalType::Role,
            resource_type: WILDCARD.to_string(),
            resource_id: WILDCARD.to_string(),
            actions: permissions,
            conditions: Vec::new(),
            effect: Effect::Allow,
            priority: i32::MIN,
            granted_by: "role-hierarchy".to_string(),
            granted_at: Utc::now(),
            expires_at: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn granted_by(mut self, granted_by: impl Into<String>) -> Self {
        self.granted_by = granted_by.into();
        self
    }

    /// Whether this is a synthetic grant materialized from the role hierarchy
    pub fn is_inherited(&self) -> bool {
        self.id.starts_with("inherited:")
    }

    /// Resource scope check: type is `*` or equal, id is `*`, equal, or a matching prefix pattern
    pub fn matches_resource(&self, resource_type: &str, resource_id: &str) -> bool {
        if self.resource_type != WILDCARD && self.resource_type != resource_type {
            return false;
        }

        if self.resource_id == WILDCARD || self.resource_id == resource_id {
            return true;
        }

        match self.resource_id.strip_suffix('*') {
            Some(prefix) => resource_id.starts_with(prefix),
            None => false,
        }
    }

    pub fn covers_action(&self, action: &str) -> bool {
        self.actions.contains(action) || self.actions.contains(WILDCARD)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if expires_at <= now)
    }

    pub fn conditions_satisfied(&self, context: &HashMap<String, ConditionValue>) -> bool {
        self.conditions.iter().all(|c| c.is_satisfied(context))
    }

    /// Role principal id, when the grant is attached to a role
    pub fn role_id(&self) -> Option<&RoleId> {
        match self.principal_type {
            PrincipalType::Role => Some(&self.principal_id),
            PrincipalType::User => None,
        }
    }
}
