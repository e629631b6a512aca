//! Evaluation counters and latency percentiles

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

const MAX_SAMPLES: usize = 10_000;

/// Engine performance metrics
#[derive(Debug, Clone, Default)]
pub struct EngineMetrics {
    /// Total number of evaluations
    pub total_evaluations: u64,

    pub allowed_decisions: u64,

    pub denied_decisions: u64,

    pub cache_hits: u64,

    pub cache_misses: u64,

    /// Store failures folded into deny decisions
    pub lookup_failures: u64,

    pub invalid_requests: u64,

    pub avg_latency_ms: f64,
    pub latency_p50_ms: f64,
    pub latency_p99_ms: f64,
}

impl EngineMetrics {
    /// Calculate cache hit rate
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }

    /// Calculate allow rate
    pub fn allow_rate(&self) -> f64 {
        let total = self.allowed_decisions + self.denied_decisions;
        if total == 0 {
            0.0
        } else {
            self.allowed_decisions as f64 / total as f64
        }
    }
}

/// Metrics collector
pub struct MetricsCollector {
    metrics: Arc<RwLock<EngineMetrics>>,

    /// Recent latency samples in milliseconds
    latency_samples: Arc<RwLock<Vec<f64>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(RwLock::new(EngineMetrics::default())),
            latency_samples: Arc::new(RwLock::new(Vec::with_capacity(1_024))),
        }
    }

    pub async fn record_cache_hit(&self) {
        self.metrics.write().await.cache_hits += 1;
    }

    pub async fn record_cache_miss(&self) {
        self.metrics.write().await.cache_misses += 1;
    }

    pub async fn record_lookup_failure(&self) {
        self.metrics.write().await.lookup_failures += 1;
    }

    pub async fn record_invalid_request(&self) {
        self.metrics.write().await.invalid_requests += 1;
    }

    /// Record a finished evaluation.
    ///
    /// Only appends the sample; percentiles are computed when a snapshot is read.
    pub async fn record_decision(&self, allowed: bool, latency: Duration) {
        let latency_ms = latency.as_secs_f64() * 1000.0;

        {
            let mut samples = self.latency_samples.write().await;
            samples.push(latency_ms);
            if samples.len() > MAX_SAMPLES {
                samples.drain(0..1_000);
            }
        }

        let mut metrics = self.metrics.write().await;
        metrics.total_evaluations += 1;
        if allowed {
            metrics.allowed_decisions += 1;
        } else {
            metrics.denied_decisions += 1;
        }
    }

    /// Get current metrics snapshot
    pub async fn get_metrics(&self) -> EngineMetrics {
        let mut sorted = self.latency_samples.read().await.clone();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let mut snapshot = self.metrics.read().await.clone();
        if !sorted.is_empty() {
            snapshot.avg_latency_ms = sorted.iter().sum::<f64>() / sorted.len() as f64;
        }
        snapshot.latency_p50_ms = Self::percentile(&sorted, 0.50);
        snapshot.latency_p99_ms = Self::percentile(&sorted, 0.99);
        snapshot
    }

    /// Reset all metrics
    pub async fn reset(&self) {
        *self.metrics.write().await = EngineMetrics::default();
        self.latency_samples.write().await.clear();
    }

    /// Export metrics in Prometheus text format
    pub async fn export_prometheus(&self) -> String {
        let metrics = self.get_metrics().await;

        format!(
            r#"# HELP permission_evaluations_total Total number of permission evaluations
# TYPE permission_evaluations_total counter
permission_evaluations_total {}

# HELP permission_allowed_total Number of allowed decisions
# TYPE permission_allowed_total counter
permission_allowed_total {}

# HELP permission_denied_total Number of denied decisions
# TYPE permission_denied_total counter
permission_denied_total {}

# HELP permission_cache_hits_total Effective grant cache hits
# TYPE permission_cache_hits_total counter
permission_cache_hits_total {}

# HELP permission_cache_misses_total Effective grant cache misses
# TYPE permission_cache_misses_total counter
permission_cache_misses_total {}

# HELP permission_lookup_failures_total Store failures folded into deny
# TYPE permission_lookup_failures_total counter
permission_lookup_failures_total {}

# HELP permission_latency_seconds Evaluation latency percentiles
# TYPE permission_latency_seconds summary
permission_latency_seconds{{quantile="0.5"}} {}
permission_latency_seconds{{quantile="0.99"}} {}
"#,
            metrics.total_evaluations,
            metrics.allowed_decisions,
            metrics.denied_decisions,
            metrics.cache_hits,
            metrics.cache_misses,
            metrics.lookup_failures,
            metrics.latency_p50_ms / 1000.0,
            metrics.latency_p99_ms / 1000.0,
        )
    }

    fn percentile(sorted: &[f64], p: f64) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        let index = ((sorted.len() - 1) as f64 * p).round() as usize;
        sorted[index.min(sorted.len() - 1)]
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
