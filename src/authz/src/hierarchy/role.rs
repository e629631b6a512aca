//! Role definitions and the built-in role ladder

use crate::types::RoleId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Named role with a rank and a single inheritance edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,

    pub name: String,

    /// Ordinal strength, higher = more privileged
    pub rank: i32,

    /// Parent role; `None` or empty marks a root
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_id: Option<RoleId>,

    /// Action tokens granted by this role alone
    #[serde(default)]
    pub direct_permissions: BTreeSet<String>,

    #[serde(default)]
    pub description: String,
}

impl Role {
    /// Create a root role named after its id
    pub fn new(id: impl Into<String>, rank: i32) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            rank,
            parent_id: None,
            direct_permissions: BTreeSet::new(),
            description: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.direct_permissions
            .extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Parent id, treating an empty string as no parent
    pub fn parent(&self) -> Option<&str> {
        self.parent_id.as_deref().filter(|p| !p.is_empty())
    }
}

/// guest ← user ← member ← editor ← admin ← owner
pub fn default_roles() -> Vec<Role> {
    vec![
        Role::new("guest", 0)
            .with_name("Guest")
            .with_permissions(["read"])
            .with_description("Read-only access"),
        Role::new("user", 10)
            .with_name("User")
            .with_parent("guest")
            .with_permissions(["write"])
            .with_description("Can create and edit own content"),
        Role::new("member", 20)
            .with_name("Member")
            .with_parent("user")
            .with_permissions(["execute"])
            .with_description("Can run workflows"),
        Role::new("editor", 30)
            .with_name("Editor")
            .with_parent("member")
            .with_permissions(["delete"])
            .with_description("Can remove content"),
        Role::new("admin", 40)
            .with_name("Admin")
            .with_parent("editor")
            .with_permissions(["manage"])
            .with_description("Can manage members and grants"),
        Role::new("owner", 50)
            .with_name("Owner")
            .with_parent("admin")
            .with_permissions(["*"])
            .with_description("Full control"),
    ]
}
