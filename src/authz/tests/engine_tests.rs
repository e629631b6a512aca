//! Permission engine evaluation tests
//!
//! Default deny, deny-overrides-allow, expiry, wildcard matching, role
//! inheritance, conditions and fail-closed error handling.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use gatehouse_authz::{
    AuthzError, Condition, ConditionValue, EngineConfig, Grant, InMemoryPermissionStore,
    PermissionEngine, PermissionRequest, PermissionStore, PrincipalType, Effect, Result, Role,
    RoleHierarchy, RoleId,
};
use std::collections::HashMap;
use std::sync::Arc;

fn editor_ladder() -> RoleHierarchy {
    let mut hierarchy = RoleHierarchy::new();
    hierarchy.register(Role::new("guest", 0).with_permissions(["read"]));
    hierarchy.register(Role::new("user", 10).with_parent("guest").with_permissions(["write"]));
    hierarchy.register(Role::new("member", 20).with_parent("user").with_permissions(["execute"]));
    hierarchy.register(Role::new("editor", 30).with_parent("member").with_permissions(["delete"]));
    hierarchy
}

fn engine_with(store: Arc<InMemoryPermissionStore>, hierarchy: RoleHierarchy) -> PermissionEngine {
    PermissionEngine::new(EngineConfig::default(), store, hierarchy)
}

async fn seed(store: &InMemoryPermissionStore, grant: Grant) {
    store.set_grant(grant).await.unwrap();
}

async fn allowed(engine: &PermissionEngine, user: &str, resource_type: &str, resource_id: &str) -> bool {
    engine
        .evaluate(&PermissionRequest::new(user, resource_type, resource_id, "read"))
        .await
        .allowed
}

// ============================================================================
// DEFAULT DENY
// ============================================================================

#[tokio::test]
async fn test_default_deny_without_grants() {
    let store = Arc::new(InMemoryPermissionStore::new());
    let engine = engine_with(store, RoleHierarchy::new());

    let decision = engine
        .evaluate(&PermissionRequest::new("user-1", "project", "P1", "read"))
        .await;

    assert!(!decision.allowed);
    assert_eq!(decision.reason, "no matching grant");
    assert!(decision.matched_grant_id.is_none());
}

#[tokio::test]
async fn test_default_deny_when_only_other_resources_granted() {
    let store = Arc::new(InMemoryPermissionStore::new());
    seed(&store, Grant::allow("user-1", "project", "P1", ["read"]).with_id("g-1")).await;
    let engine = engine_with(store, RoleHierarchy::new());

    let other_id = engine
        .evaluate(&PermissionRequest::new("user-1", "project", "P2", "read"))
        .await;
    let other_type = engine
        .evaluate(&PermissionRequest::new("user-1", "invoice", "P1", "read"))
        .await;
    let other_user = engine
        .evaluate(&PermissionRequest::new("user-2", "project", "P1", "read"))
        .await;

    assert!(!other_id.allowed);
    assert!(!other_type.allowed);
    assert!(!other_user.allowed);
}

// ============================================================================
// CONFLICT RESOLUTION
// ============================================================================

#[tokio::test]
async fn test_deny_overrides_allow_regardless_of_priority() {
    let store = Arc::new(InMemoryPermissionStore::new());
    seed(
        &store,
        Grant::allow("user-1", "project", "P1", ["read"]).with_id("allow").with_priority(i32::MAX),
    )
    .await;
    seed(
        &store,
        Grant::deny("user-1", "project", "*", ["read"]).with_id("deny").with_priority(i32::MIN),
    )
    .await;
    let engine = engine_with(store, RoleHierarchy::new());

    let decision = engine
        .evaluate(&PermissionRequest::new("user-1", "project", "P1", "read"))
        .await;

    assert!(!decision.allowed);
    assert_eq!(decision.matched_grant_id.as_deref(), Some("deny"));
}

#[tokio::test]
async fn test_higher_priority_deny_reported_first() {
    let store = Arc::new(InMemoryPermissionStore::new());
    seed(&store, Grant::deny("user-1", "*", "*", ["read"]).with_id("deny-10").with_priority(10)).await;
    seed(&store, Grant::deny("user-1", "*", "*", ["read"]).with_id("deny-90").with_priority(90)).await;
    let engine = engine_with(store, RoleHierarchy::new());

    let decision = engine
        .evaluate(&PermissionRequest::new("user-1", "project", "P1", "read"))
        .await;

    assert_eq!(decision.matched_grant_id.as_deref(), Some("deny-90"));
}

// ============================================================================
// EXPIRY
// ============================================================================

#[tokio::test]
async fn test_expired_grant_is_never_matched() {
    let store = Arc::new(InMemoryPermissionStore::new());
    seed(
        &store,
        Grant::allow("user-1", "project", "P1", ["read"])
            .with_id("expired")
            .with_expiry(Utc::now() - Duration::minutes(5)),
    )
    .await;
    let engine = engine_with(store, RoleHierarchy::new());

    let decision = engine
        .evaluate(&PermissionRequest::new("user-1", "project", "P1", "read"))
        .await;

    assert!(!decision.allowed);
    assert_ne!(decision.matched_grant_id.as_deref(), Some("expired"));
}

#[tokio::test]
async fn test_unexpired_grant_matches() {
    let store = Arc::new(InMemoryPermissionStore::new());
    seed(
        &store,
        Grant::allow("user-1", "project", "P1", ["read"])
            .with_id("valid")
            .with_expiry(Utc::now() + Duration::hours(1)),
    )
    .await;
    let engine = engine_with(store, RoleHierarchy::new());

    let decision = engine
        .evaluate(&PermissionRequest::new("user-1", "project", "P1", "read"))
        .await;

    assert!(decision.allowed);
    assert_eq!(decision.matched_grant_id.as_deref(), Some("valid"));
}

// ============================================================================
// WILDCARDS
// ============================================================================

#[tokio::test]
async fn test_wildcard_resource_semantics() {
    let store = Arc::new(InMemoryPermissionStore::new());
    seed(&store, Grant::allow("any-type", "*", "doc-1", ["read"]).with_id("t")).await;
    seed(&store, Grant::allow("any-id", "project", "*", ["read"]).with_id("i")).await;
    seed(&store, Grant::allow("prefix", "project", "proj-*", ["read"]).with_id("p")).await;
    let engine = engine_with(store, RoleHierarchy::new());

    assert!(allowed(&engine, "any-type", "project", "doc-1").await);
    assert!(allowed(&engine, "any-type", "invoice", "doc-1").await);
    assert!(!allowed(&engine, "any-type", "invoice", "doc-2").await);

    assert!(allowed(&engine, "any-id", "project", "anything").await);
    assert!(!allowed(&engine, "any-id", "invoice", "anything").await);

    assert!(allowed(&engine, "prefix", "project", "proj-123").await);
    assert!(!allowed(&engine, "prefix", "project", "other-123").await);
}

#[tokio::test]
async fn test_wildcard_action() {
    let store = Arc::new(InMemoryPermissionStore::new());
    seed(&store, Grant::allow("user-1", "project", "P1", ["*"]).with_id("all")).await;
    let engine = engine_with(store, RoleHierarchy::new());

    for action in ["read", "write", "archive"] {
        let decision = engine
            .evaluate(&PermissionRequest::new("user-1", "project", "P1", action))
            .await;
        assert!(decision.allowed, "wildcard action should cover {}", action);
    }
}

// ============================================================================
// ROLE INHERITANCE
// ============================================================================

#[tokio::test]
async fn test_inheritance_monotonicity() {
    let store = Arc::new(InMemoryPermissionStore::new());
    store.assign_role("user-1", "editor");
    let engine = engine_with(store, editor_ladder());

    for action in ["read", "write", "execute", "delete"] {
        let decision = engine
            .evaluate(&PermissionRequest::new("user-1", "anything", "any-id", action))
            .await;
        assert!(decision.allowed, "editor should be allowed to {}", action);
        assert_eq!(decision.matched_grant_id.as_deref(), Some("inherited:editor"));
    }

    let decision = engine
        .evaluate(&PermissionRequest::new("user-1", "anything", "any-id", "manage"))
        .await;
    assert!(!decision.allowed);
}

#[tokio::test]
async fn test_lower_role_lacks_descendant_permissions() {
    let store = Arc::new(InMemoryPermissionStore::new());
    store.assign_role("user-1", "user");
    let engine = engine_with(store, editor_ladder());

    let read = engine.evaluate(&PermissionRequest::new("user-1", "doc", "1", "read")).await;
    let delete = engine.evaluate(&PermissionRequest::new("user-1", "doc", "1", "delete")).await;

    assert!(read.allowed);
    assert!(!delete.allowed);
}

#[tokio::test]
async fn test_ancestor_role_grants_apply_to_descendant_holders() {
    let store = Arc::new(InMemoryPermissionStore::new());
    store.assign_role("user-1", "editor");
    seed(
        &store,
        Grant::new(PrincipalType::Role, "guest", Effect::Deny, "billing", "*", ["read"])
            .with_id("guest-no-billing"),
    )
    .await;
    let engine = engine_with(store, editor_ladder());

    let decision = engine
        .evaluate(&PermissionRequest::new("user-1", "billing", "inv-1", "read"))
        .await;

    assert!(!decision.allowed);
    assert_eq!(decision.matched_grant_id.as_deref(), Some("guest-no-billing"));
}

#[tokio::test]
async fn test_cyclic_hierarchy_still_evaluates() {
    let mut hierarchy = RoleHierarchy::new();
    hierarchy.register(Role::new("A", 1).with_parent("B").with_permissions(["a"]));
    hierarchy.register(Role::new("B", 2).with_parent("C").with_permissions(["b"]));
    hierarchy.register(Role::new("C", 3).with_parent("A").with_permissions(["c"]));

    let store = Arc::new(InMemoryPermissionStore::new());
    store.assign_role("user-1", "A");
    let engine = engine_with(store, hierarchy);

    let decision = engine.evaluate(&PermissionRequest::new("user-1", "x", "1", "c")).await;
    assert!(decision.allowed);

    let set = engine.effective_grants("user-1").await.unwrap();
    assert_eq!(set.expanded_role_ids, vec!["A", "B", "C"]);
}

// ============================================================================
// SCENARIO: exact-id deny over inherited allow
// ============================================================================

#[tokio::test]
async fn test_exact_deny_over_inherited_allow() {
    let store = Arc::new(InMemoryPermissionStore::new());
    store.assign_role("user-1", "editor");
    seed(
        &store,
        Grant::deny("user-1", "project", "P1", ["delete"])
            .with_id("no-delete-p1")
            .with_priority(100),
    )
    .await;
    let engine = engine_with(store, editor_ladder());

    let p1 = engine
        .evaluate(&PermissionRequest::new("user-1", "project", "P1", "delete"))
        .await;
    let p2 = engine
        .evaluate(&PermissionRequest::new("user-1", "project", "P2", "delete"))
        .await;

    assert!(!p1.allowed);
    assert_eq!(p1.matched_grant_id.as_deref(), Some("no-delete-p1"));
    assert!(p2.allowed);
    assert_eq!(p2.matched_grant_id.as_deref(), Some("inherited:editor"));
}

// ============================================================================
// CONDITIONS
// ============================================================================

#[tokio::test]
async fn test_conditions_evaluated_against_context() {
    let store = Arc::new(InMemoryPermissionStore::new());
    seed(
        &store,
        Grant::allow("user-1", "report", "*", ["export"])
            .with_id("eu-export")
            .with_condition(Condition::is_in("region", ["eu-west", "eu-central"]))
            .with_condition(Condition::eq("mfa", true)),
    )
    .await;
    let engine = engine_with(store, RoleHierarchy::new());

    let base = PermissionRequest::new("user-1", "report", "q3", "export");

    let missing = engine.evaluate(&base).await;
    assert!(!missing.allowed, "missing context must fail closed");

    let partial = engine.evaluate(&base.clone().with_context("region", "eu-west")).await;
    assert!(!partial.allowed);

    let full = engine
        .evaluate(&base.clone().with_context("region", "eu-west").with_context("mfa", true))
        .await;
    assert!(full.allowed);

    let wrong_region = engine
        .evaluate(&base.with_context("region", "us-east").with_context("mfa", true))
        .await;
    assert!(!wrong_region.allowed);
}

#[tokio::test]
async fn test_conditional_deny_only_applies_when_satisfied() {
    let store = Arc::new(InMemoryPermissionStore::new());
    seed(&store, Grant::allow("user-1", "project", "*", ["read"]).with_id("read")).await;
    seed(
        &store,
        Grant::deny("user-1", "project", "*", ["read"])
            .with_id("blocked-network")
            .with_condition(Condition::eq("network", "public")),
    )
    .await;
    let engine = engine_with(store, RoleHierarchy::new());

    let office = PermissionRequest::new("user-1", "project", "P1", "read").with_context("network", "office");
    let public = PermissionRequest::new("user-1", "project", "P1", "read").with_context("network", "public");

    assert!(engine.evaluate(&office).await.allowed);
    assert!(!engine.evaluate(&public).await.allowed);
}

// ============================================================================
// FAIL-CLOSED ERROR HANDLING
// ============================================================================

struct BrokenStore;

#[async_trait]
impl PermissionStore for BrokenStore {
    async fn get_user_grants(&self, _user_id: &str) -> Result<Vec<Grant>> {
        Err(AuthzError::Store("connection refused".to_string()))
    }

    async fn get_role_grants(&self, _role_id: &str) -> Result<Vec<Grant>> {
        Err(AuthzError::Store("connection refused".to_string()))
    }

    async fn get_user_role_ids(&self, _user_id: &str) -> Result<Vec<RoleId>> {
        Ok(vec!["owner".to_string()])
    }

    async fn set_grant(&self, _grant: Grant) -> Result<()> {
        Err(AuthzError::Store("read-only".to_string()))
    }

    async fn delete_grant(&self, _grant_id: &str) -> Result<()> {
        Err(AuthzError::Store("read-only".to_string()))
    }
}

#[tokio::test]
async fn test_store_failure_denies() {
    let engine = PermissionEngine::new(
        EngineConfig::default(),
        Arc::new(BrokenStore),
        RoleHierarchy::with_default_roles(),
    );

    let decision = engine
        .evaluate(&PermissionRequest::new("user-1", "project", "P1", "read"))
        .await;

    assert!(!decision.allowed);
    assert!(decision.reason.starts_with("lookup failed"), "reason: {}", decision.reason);
    assert!(decision.matched_grant_id.is_none());

    // Failures are not cached
    assert_eq!(engine.cache().unwrap().len().await, 0);
}

#[tokio::test]
async fn test_invalid_request_denies() {
    let store = Arc::new(InMemoryPermissionStore::new());
    seed(&store, Grant::allow("user-1", "*", "*", ["*"]).with_id("everything")).await;
    let engine = engine_with(store, RoleHierarchy::new());

    let no_type = engine.evaluate(&PermissionRequest::new("user-1", "", "P1", "read")).await;
    let no_action = engine.evaluate(&PermissionRequest::new("user-1", "project", "P1", "")).await;

    assert!(!no_type.allowed);
    assert!(no_type.reason.starts_with("invalid request"));
    assert!(!no_action.allowed);
    assert!(no_action.reason.starts_with("invalid request"));
}

#[tokio::test]
async fn test_check_permission_maps_deny_to_forbidden() {
    let store = Arc::new(InMemoryPermissionStore::new());
    seed(&store, Grant::allow("user-1", "project", "P1", ["read"]).with_id("g-1")).await;
    seed(&store, Grant::deny("user-1", "project", "P1", ["write"]).with_id("g-2")).await;
    let engine = engine_with(store, RoleHierarchy::new());

    assert!(engine
        .check_permission(&PermissionRequest::new("user-1", "project", "P1", "read"))
        .await
        .is_ok());

    let err = engine
        .check_permission(&PermissionRequest::new("user-1", "project", "P1", "write"))
        .await
        .unwrap_err();
    assert!(err.is_forbidden());
    match err {
        AuthzError::Forbidden { grant_id, .. } => assert_eq!(grant_id.as_deref(), Some("g-2")),
        other => panic!("unexpected error: {}", other),
    }

    let err = engine
        .check_permission(&PermissionRequest::new("user-1", "project", "P9", "read"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthzError::Forbidden { grant_id: None, .. }));
}

#[tokio::test]
async fn test_middleware_check_with_context() {
    let store = Arc::new(InMemoryPermissionStore::new());
    seed(
        &store,
        Grant::allow("user-1", "api", "/v1/*", ["GET"])
            .with_id("api-read")
            .with_condition(Condition::ne("client", "blocked")),
    )
    .await;
    let engine = engine_with(store, RoleHierarchy::new());

    let mut context: HashMap<String, ConditionValue> = HashMap::new();
    context.insert("client".to_string(), "cli".into());
    assert!(engine.check("user-1", "api", "/v1/users", "GET", context).await.is_ok());

    let mut context: HashMap<String, ConditionValue> = HashMap::new();
    context.insert("client".to_string(), "blocked".into());
    assert!(engine.check("user-1", "api", "/v1/users", "GET", context).await.is_err());

    assert!(engine
        .check("user-1", "api", "/v2/users", "GET", HashMap::new())
        .await
        .is_err());
}

#[tokio::test]
async fn test_metrics_track_decisions() {
    let store = Arc::new(InMemoryPermissionStore::new());
    seed(&store, Grant::allow("user-1", "*", "*", ["read"]).with_id("g")).await;
    let engine = engine_with(store, RoleHierarchy::new());

    engine.evaluate(&PermissionRequest::new("user-1", "doc", "1", "read")).await;
    engine.evaluate(&PermissionRequest::new("user-1", "doc", "1", "write")).await;
    engine.evaluate(&PermissionRequest::new("user-1", "", "1", "read")).await;

    let metrics = engine.metrics().await.unwrap();
    assert_eq!(metrics.total_evaluations, 3);
    assert_eq!(metrics.allowed_decisions, 1);
    assert_eq!(metrics.denied_decisions, 2);
    assert_eq!(metrics.invalid_requests, 1);
    assert_eq!(metrics.cache_misses, 1);
    assert_eq!(metrics.cache_hits, 1);

    let exported = engine.export_metrics().await.unwrap();
    assert!(exported.contains("permission_allowed_total 1"));
}
