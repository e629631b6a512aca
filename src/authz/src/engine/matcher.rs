//! Grant selection: resource filter, deny-first ordering, first survivor wins

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::debug;

use crate::grant::{Effect, Grant};
use crate::types::{PermissionDecision, PermissionRequest};

/// Grants whose resource scope covers the request, ordered for evaluation.
///
/// Deny sorts before allow; within an effect, higher priority first. The sort
/// is stable so equal keys keep their input order. Actions are not checked here.
pub fn candidates<'a>(grants: &'a [Grant], request: &PermissionRequest) -> Vec<&'a Grant> {
    let mut matching: Vec<&Grant> = grants
        .iter()
        .filter(|g| g.matches_resource(&request.resource_type, &request.resource_id))
        .collect();

    matching.sort_by(|a, b| evaluation_order(a, b));
    matching
}

fn evaluation_order(a: &Grant, b: &Grant) -> Ordering {
    match (a.effect, b.effect) {
        (Effect::Deny, Effect::Allow) => Ordering::Less,
        (Effect::Allow, Effect::Deny) => Ordering::Greater,
        _ => b.priority.cmp(&a.priority),
    }
}

/// Walk the ordered candidates and return the decision of the first grant
/// that is unexpired, has all conditions satisfied, and covers the action.
pub fn decide(grants: &[Grant], request: &PermissionRequest, now: DateTime<Utc>) -> PermissionDecision {
    for grant in candidates(grants, request) {
        if grant.is_expired_at(now) {
            debug!(grant = %grant.id, "Skipping expired grant");
            continue;
        }
        if !grant.conditions_satisfied(&request.context) {
            debug!(grant = %grant.id, "Grant conditions not satisfied");
            continue;
        }
        if !grant.covers_action(&request.action) {
            continue;
        }

        return PermissionDecision::matched(grant, request);
    }

    PermissionDecision::default_deny()
}
