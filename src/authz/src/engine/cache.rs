//! TTL cache of expanded per-principal grant sets

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::types::EffectiveGrantSet;

/// Default time-to-live for cached grant sets
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Cached entry with TTL
#[derive(Clone)]
struct CachedEntry {
    set: Arc<EffectiveGrantSet>,
    cached_at: Instant,
}

impl CachedEntry {
    fn new(set: Arc<EffectiveGrantSet>) -> Self {
        Self {
            set,
            cached_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// Per-principal cache of effective grant sets
///
/// - Read-write lock around the map; callers never hold it across a store call
/// - Lazy expiry, checked on read; no background sweeper
/// - No request coalescing: concurrent misses may each rebuild the set
/// - Invalidations bump a generation; sets fetched under an older generation
///   are discarded by [`EffectiveGrantCache::put_if_current`]
pub struct EffectiveGrantCache {
    entries: RwLock<HashMap<String, CachedEntry>>,
    ttl: Duration,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl EffectiveGrantCache {
    /// Create a cache with the given TTL
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for a principal, if any
    pub async fn get(&self, principal_id: &str) -> Option<Arc<EffectiveGrantSet>> {
        {
            let entries = self.entries.read().await;
            match entries.get(principal_id) {
                Some(entry) if !entry.is_expired(self.ttl) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(Arc::clone(&entry.set));
                }
                Some(_) => {}
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        // Expired on the first look; a concurrent put may have refreshed it since
        let mut entries = self.entries.write().await;
        self.recheck(&mut entries, principal_id)
    }

    /// Second look under the write lock: serve a refreshed entry, evict a stale one
    fn recheck(
        &self,
        entries: &mut HashMap<String, CachedEntry>,
        principal_id: &str,
    ) -> Option<Arc<EffectiveGrantSet>> {
        if let Some(entry) = entries.get(principal_id) {
            if !entry.is_expired(self.ttl) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.set));
            }
        }

        if entries.remove(principal_id).is_some() {
            self.expirations.fetch_add(1, Ordering::Relaxed);
            debug!(principal = %principal_id, "Expired effective grant set");
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Current invalidation generation.
    ///
    /// Read before fetching a grant set and hand it to [`Self::put_if_current`].
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Store a set, overwriting any previous entry and restarting its TTL
    pub async fn put(&self, principal_id: &str, set: Arc<EffectiveGrantSet>) {
        let mut entries = self.entries.write().await;
        entries.insert(principal_id.to_string(), CachedEntry::new(set));
    }

    /// Store a set only if no invalidation happened since `generation` was read.
    ///
    /// Returns whether the set was stored. A set fetched before a write must
    /// not outlive the invalidation that write triggered.
    pub async fn put_if_current(
        &self,
        principal_id: &str,
        generation: u64,
        set: Arc<EffectiveGrantSet>,
    ) -> bool {
        let mut entries = self.entries.write().await;
        if self.generation.load(Ordering::Acquire) != generation {
            debug!(principal = %principal_id, "Discarding grant set fetched before an invalidation");
            return false;
        }
        entries.insert(principal_id.to_string(), CachedEntry::new(set));
        true
    }

    /// Drop one principal's entry
    pub async fn invalidate(&self, principal_id: &str) {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        if entries.remove(principal_id).is_some() {
            debug!(principal = %principal_id, "Invalidated effective grant set");
        }
    }

    /// Drop every entry
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        self.generation.fetch_add(1, Ordering::AcqRel);
        let count = entries.len();
        entries.clear();
        debug!(count, "Cleared effective grant cache");
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Get cache statistics
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.len().await,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }
}

impl Default for EffectiveGrantCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
