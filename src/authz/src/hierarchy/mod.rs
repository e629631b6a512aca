//! Role hierarchy
//!
//! Single-parent role inheritance with cycle-safe queries.
//!
//! # Example
//!
//! ```rust
//! use gatehouse_authz::hierarchy::{Role, RoleHierarchy};
//!
//! let mut hierarchy = RoleHierarchy::new();
//! hierarchy.register(Role::new("guest", 0).with_permissions(["read"]));
//! hierarchy.register(Role::new("editor", 30).with_parent("guest").with_permissions(["write"]));
//!
//! let permissions = hierarchy.inherited_permissions("editor");
//! assert!(permissions.contains("read"));
//! assert!(permissions.contains("write"));
//! ```

pub mod graph;
pub mod role;


pub use graph::RoleHierarchy;
pub use role::{default_roles, Role};
