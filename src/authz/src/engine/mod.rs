//! Permission engine
//!
//! Orchestrates the role hierarchy, the permission store and the effective
//! grant cache to answer permission checks, and exposes the administrative
//! write path.

pub mod admin;
pub mod audit;
pub mod cache;
pub mod matcher;
pub mod metrics;

pub use audit::{AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use cache::{CacheStats, EffectiveGrantCache, DEFAULT_TTL};
pub use metrics::{EngineMetrics, MetricsCollector};

use crate::condition::ConditionValue;
use crate::error::{AuthzError, Result};
use crate::grant::Grant;
use crate::hierarchy::RoleHierarchy;
use crate::store::PermissionStore;
use crate::types::{EffectiveGrantSet, PermissionDecision, PermissionRequest, RoleId};

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Permission engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cache expanded grant sets per principal
    pub enable_cache: bool,

    /// Staleness bound for cached grant sets
    pub cache_ttl: Duration,

    /// Enable metrics collection
    pub enable_metrics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_cache: true,
            cache_ttl: DEFAULT_TTL,
            enable_metrics: true,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with environment variables:
    ///
    /// - `AUTHZ_CACHE_ENABLED` - `true`/`false` (default: true)
    /// - `AUTHZ_CACHE_TTL_SECS` - cache TTL in seconds (default: 300)
    /// - `AUTHZ_METRICS_ENABLED` - `true`/`false` (default: true)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let enable_cache = lookup("AUTHZ_CACHE_ENABLED")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.enable_cache);

        let cache_ttl = lookup("AUTHZ_CACHE_TTL_SECS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.cache_ttl);

        let enable_metrics = lookup("AUTHZ_METRICS_ENABLED")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.enable_metrics);

        Self {
            enable_cache,
            cache_ttl,
            enable_metrics,
        }
    }
}

/// Main permission engine
///
/// # Architecture
///
/// ```text
/// PermissionRequest → [EffectiveGrantCache] ─hit──────────────┐
///                          │ miss                              ↓
///                     PermissionStore + RoleHierarchy → filter → sort → first match → PermissionDecision
/// ```
///
/// Evaluation never fails: store errors and malformed requests become deny
/// decisions. There is no default-allow path.
pub struct PermissionEngine {
    hierarchy: Arc<RwLock<RoleHierarchy>>,

    store: Arc<dyn PermissionStore>,

    cache: Option<Arc<EffectiveGrantCache>>,

    audit_sink: Option<Arc<dyn AuditSink>>,

    metrics: Option<Arc<MetricsCollector>>,

    config: EngineConfig,
}

impl PermissionEngine {
    /// Create an engine over a store and a role hierarchy
    pub fn new(
        config: EngineConfig,
        store: Arc<dyn PermissionStore>,
        hierarchy: RoleHierarchy,
    ) -> Self {
        let cache = config
            .enable_cache
            .then(|| Arc::new(EffectiveGrantCache::new(config.cache_ttl)));

        let metrics = config
            .enable_metrics
            .then(|| Arc::new(MetricsCollector::new()));

        info!(
            "PermissionEngine initialized with roles={}, cache={}, ttl={:?}, metrics={}",
            hierarchy.len(),
            config.enable_cache,
            config.cache_ttl,
            config.enable_metrics
        );

        Self {
            hierarchy: Arc::new(RwLock::new(hierarchy)),
            store,
            cache,
            audit_sink: None,
            metrics,
            config,
        }
    }

    /// Use an externally constructed cache (e.g. shared between engines)
    pub fn with_cache(mut self, cache: Arc<EffectiveGrantCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Emit audit events for grants and revokes to `sink`
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<EffectiveGrantCache>> {
        self.cache.as_ref()
    }

    /// Get engine metrics
    pub async fn metrics(&self) -> Option<EngineMetrics> {
        match &self.metrics {
            Some(metrics) => Some(metrics.get_metrics().await),
            None => None,
        }
    }

    /// Metrics in Prometheus text format
    pub async fn export_metrics(&self) -> Option<String> {
        match &self.metrics {
            Some(metrics) => Some(metrics.export_prometheus().await),
            None => None,
        }
    }

    /// Get cache statistics
    pub async fn cache_stats(&self) -> Option<CacheStats> {
        match &self.cache {
            Some(cache) => Some(cache.stats().await),
            None => None,
        }
    }

    /// Run `f` against the current role hierarchy
    pub fn with_hierarchy<R>(&self, f: impl FnOnce(&RoleHierarchy) -> R) -> R {
        f(&self.hierarchy.read())
    }

    /// Answer a permission request.
    ///
    /// # Pipeline
    ///
    /// 1. Validate the request
    /// 2. Resolve the principal's effective grants (cache or store + hierarchy)
    /// 3. Keep grants whose resource scope covers the request
    /// 4. Order deny before allow, then by descending priority
    /// 5. First unexpired grant with satisfied conditions and a covering action wins
    /// 6. Otherwise deny
    pub async fn evaluate(&self, request: &PermissionRequest) -> PermissionDecision {
        let start = Instant::now();

        debug!(
            "Permission request: principal={}, resource={}/{}, action={}",
            request.principal_id, request.resource_type, request.resource_id, request.action
        );

        let decision = self.decide(request).await;

        debug!(
            allowed = decision.allowed,
            grant = ?decision.matched_grant_id,
            "Decision: {}",
            decision.reason
        );

        if let Some(metrics) = &self.metrics {
            metrics.record_decision(decision.allowed, start.elapsed()).await;
        }

        decision
    }

    /// Evaluate and turn a deny into [`AuthzError::Forbidden`]
    pub async fn check_permission(&self, request: &PermissionRequest) -> Result<()> {
        let decision = self.evaluate(request).await;
        if decision.allowed {
            Ok(())
        } else {
            Err(AuthzError::Forbidden {
                reason: decision.reason,
                grant_id: decision.matched_grant_id,
            })
        }
    }

    /// Middleware-facing check; an error means forbidden
    pub async fn check(
        &self,
        principal_id: &str,
        resource_type: &str,
        resource_id: &str,
        action: &str,
        context: HashMap<String, ConditionValue>,
    ) -> Result<()> {
        let mut request = PermissionRequest::new(principal_id, resource_type, resource_id, action);
        request.context = context;
        self.check_permission(&request).await
    }

    /// Expanded grant set for a principal, from cache when fresh
    ///
    /// A set whose fetch overlapped an invalidation is returned to this caller
    /// but not cached.
    pub async fn effective_grants(&self, principal_id: &str) -> Result<Arc<EffectiveGrantSet>> {
        let mut generation = None;

        if let Some(cache) = &self.cache {
            if let Some(set) = cache.get(principal_id).await {
                if let Some(metrics) = &self.metrics {
                    metrics.record_cache_hit().await;
                }
                debug!("Cache hit for principal {}", principal_id);
                return Ok(set);
            }
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_miss().await;
            }
            generation = Some(cache.generation());
        }

        let set = Arc::new(self.load_effective_grants(principal_id).await?);

        if let (Some(cache), Some(generation)) = (&self.cache, generation) {
            cache
                .put_if_current(principal_id, generation, Arc::clone(&set))
                .await;
        }

        Ok(set)
    }

    async fn decide(&self, request: &PermissionRequest) -> PermissionDecision {
        if let Err(e) = request.validate() {
            if let Some(metrics) = &self.metrics {
                metrics.record_invalid_request().await;
            }
            return PermissionDecision::invalid_request(e);
        }

        let effective = match self.effective_grants(&request.principal_id).await {
            Ok(set) => set,
            Err(e) => {
                warn!("Grant lookup failed for principal {}: {}", request.principal_id, e);
                if let Some(metrics) = &self.metrics {
                    metrics.record_lookup_failure().await;
                }
                return PermissionDecision::lookup_failed(e);
            }
        };

        matcher::decide(&effective.grants, request, Utc::now())
    }

    /// Store fetch + role expansion + inherited grant synthesis
    async fn load_effective_grants(&self, principal_id: &str) -> Result<EffectiveGrantSet> {
        let (user_grants, role_ids) = tokio::try_join!(
            self.store.get_user_grants(principal_id),
            self.store.get_user_role_ids(principal_id),
        )?;

        let expanded_role_ids = self.expand_roles(&role_ids);

        let role_grants = futures::future::try_join_all(
            expanded_role_ids
                .iter()
                .map(|role_id| self.store.get_role_grants(role_id)),
        )
        .await?;

        let inherited: Vec<Grant> = {
            let hierarchy = self.hierarchy.read();
            expanded_role_ids
                .iter()
                .map(|role_id| (role_id, hierarchy.inherited_permissions(role_id)))
                .filter(|(_, permissions)| !permissions.is_empty())
                .map(|(role_id, permissions)| Grant::inherited(role_id, permissions))
                .collect()
        };

        let mut grants = user_grants;
        grants.extend(role_grants.into_iter().flatten());
        grants.extend(inherited);

        debug!(
            "Expanded grants for {}: {} grants across roles {:?}",
            principal_id,
            grants.len(),
            expanded_role_ids
        );

        Ok(EffectiveGrantSet::new(grants, expanded_role_ids))
    }

    /// Assigned roles followed by their ancestors, first occurrence wins
    fn expand_roles(&self, role_ids: &[RoleId]) -> Vec<RoleId> {
        let hierarchy = self.hierarchy.read();
        let mut seen: HashSet<RoleId> = HashSet::new();
        let mut expanded = Vec::new();

        for role_id in role_ids {
            let chain = hierarchy
                .inheritance_chain(role_id)
                .into_iter()
                .map(|role| role.id);

            for id in std::iter::once(role_id.clone()).chain(chain) {
                if seen.insert(id.clone()) {
                    expanded.push(id);
                }
            }
        }

        expanded
    }
}
