//! Single-parent role graph with cycle-safe traversal
//!
//! Registration never rejects a cycle. Every walk keeps a visited set and
//! stops on the first repeated role, so a misconfigured graph yields bounded
//! results instead of hanging.

use super::role::{default_roles, Role};
use crate::types::RoleId;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

/// Role graph: `roleID -> Role` plus a `parentID -> children` index
#[derive(Debug, Clone, Default)]
pub struct RoleHierarchy {
    roles: HashMap<RoleId, Role>,
    children: HashMap<RoleId, BTreeSet<RoleId>>,
}

impl RoleHierarchy {
    /// Create an empty hierarchy
    pub fn new() -> Self {
        Self::default()
    }

    /// Hierarchy preloaded with the guest..owner ladder
    pub fn with_default_roles() -> Self {
        let mut hierarchy = Self::new();
        for role in default_roles() {
            hierarchy.register(role);
        }
        hierarchy
    }

    /// Insert or overwrite a role by id
    pub fn register(&mut self, role: Role) {
        if let Some(previous) = self.roles.get(&role.id) {
            if previous.parent() != role.parent() {
                if let Some(old_parent) = previous.parent() {
                    if let Some(siblings) = self.children.get_mut(old_parent) {
                        siblings.remove(&role.id);
                    }
                }
            }
        }

        if let Some(parent) = role.parent() {
            self.children
                .entry(parent.to_string())
                .or_default()
                .insert(role.id.clone());
        }

        let role_id = role.id.clone();
        debug!(role = %role_id, rank = role.rank, parent = ?role.parent(), "Registered role");
        self.roles.insert(role_id.clone(), role);

        if self.closes_cycle(&role_id) {
            warn!(role = %role_id, "Role registration closes an inheritance cycle");
        }
    }

    pub fn get(&self, role_id: &str) -> Option<&Role> {
        self.roles.get(role_id)
    }

    pub fn rank(&self, role_id: &str) -> Option<i32> {
        self.roles.get(role_id).map(|r| r.rank)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Registered role ids, sorted
    pub fn role_ids(&self) -> Vec<RoleId> {
        let mut ids: Vec<RoleId> = self.roles.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Walk from `role_id` to the root: self first, root last.
    ///
    /// Stops at an unknown or empty parent, or when a role repeats.
    pub fn inheritance_chain(&self, role_id: &str) -> Vec<Role> {
        let mut chain = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = Some(role_id);

        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            let Some(role) = self.roles.get(id) else {
                break;
            };
            chain.push(role.clone());
            current = role.parent();
        }

        chain
    }

    /// Union of direct permissions along the inheritance chain
    pub fn inherited_permissions(&self, role_id: &str) -> BTreeSet<String> {
        self.inheritance_chain(role_id)
            .into_iter()
            .flat_map(|role| role.direct_permissions)
            .collect()
    }

    /// True when `ancestor_id` is on `role_id`'s chain (a role is its own ancestor)
    pub fn is_ancestor(&self, role_id: &str, ancestor_id: &str) -> bool {
        self.inheritance_chain(role_id)
            .iter()
            .any(|role| role.id == ancestor_id)
    }

    /// Every role below `role_id`, breadth first; excludes `role_id` itself
    pub fn descendants(&self, role_id: &str) -> Vec<RoleId> {
        let mut result = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();

        visited.insert(role_id);
        queue.push_back(role_id);

        while let Some(current) = queue.pop_front() {
            let Some(children) = self.children.get(current) else {
                continue;
            };
            for child in children {
                if visited.insert(child.as_str()) {
                    result.push(child.clone());
                    queue.push_back(child.as_str());
                }
            }
        }

        result
    }

    /// Compare ranks; false when either role is unknown
    pub fn is_rank_at_least(&self, role_a: &str, role_b: &str) -> bool {
        match (self.rank(role_a), self.rank(role_b)) {
            (Some(a), Some(b)) => a >= b,
            _ => false,
        }
    }

    /// Every distinct parent cycle, each listed from its smallest role id
    pub fn detect_cycles(&self) -> Vec<Vec<RoleId>> {
        let mut cycles: Vec<Vec<RoleId>> = Vec::new();
        // Roles already proven to reach a root or a known cycle
        let mut settled: HashSet<&str> = HashSet::new();

        let mut ids: Vec<&str> = self.roles.keys().map(String::as_str).collect();
        ids.sort();

        for start in ids {
            let mut path: Vec<&str> = Vec::new();
            let mut on_path: HashSet<&str> = HashSet::new();
            let mut current = Some(start);

            while let Some(id) = current {
                if settled.contains(id) {
                    break;
                }
                if !on_path.insert(id) {
                    let begin = path.iter().position(|p| *p == id).unwrap_or(0);
                    let mut cycle: Vec<RoleId> =
                        path[begin..].iter().map(|s| s.to_string()).collect();
                    let min = cycle
                        .iter()
                        .enumerate()
                        .min_by(|a, b| a.1.cmp(b.1))
                        .map(|(i, _)| i)
                        .unwrap_or(0);
                    cycle.rotate_left(min);
                    cycles.push(cycle);
                    break;
                }
                path.push(id);
                current = self.roles.get(id).and_then(Role::parent);
            }

            settled.extend(path);
        }

        cycles
    }

    fn closes_cycle(&self, role_id: &str) -> bool {
        let Some(role) = self.roles.get(role_id) else {
            return false;
        };
        match role.parent() {
            Some(parent) => parent == role_id || self.is_ancestor(parent, role_id),
            None => false,
        }
    }
}
