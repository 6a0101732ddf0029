//! Multi-layer cache: three composed stores with read-through promotion.

use super::policy::CachePolicy;
use super::store::CacheStore;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Identifies one of the three composed stores.
///
/// Probe order for layer-less gets is `Fast` → `Session` → `Durable`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheLayer {
    /// Short-lived, cheapest tier; promotion target.
    Fast,
    /// Session-scoped tier.
    Session,
    /// Long-lived tier.
    Durable,
}

/// Per-layer policies plus the sweep interval.
#[derive(Debug, Clone)]
pub struct MultiLayerConfig {
    pub fast: CachePolicy,
    pub session: CachePolicy,
    pub durable: CachePolicy,
    pub sweep_interval: Duration,
}

impl Default for MultiLayerConfig {
    fn default() -> Self {
        Self {
            fast: CachePolicy::new()
                .with_max_entries(1000)
                .with_max_size_bytes(10 * 1024 * 1024)
                .with_default_ttl(Duration::from_secs(300)),
            session: CachePolicy::new()
                .with_max_entries(5000)
                .with_max_size_bytes(50 * 1024 * 1024)
                .with_default_ttl(Duration::from_secs(1800)),
            durable: CachePolicy::new()
                .with_max_entries(10_000)
                .with_max_size_bytes(100 * 1024 * 1024)
                .with_default_ttl(Duration::from_secs(86_400)),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl MultiLayerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fast(mut self, policy: CachePolicy) -> Self {
        self.fast = policy;
        self
    }

    pub fn with_session(mut self, policy: CachePolicy) -> Self {
        self.session = policy;
        self
    }

    pub fn with_durable(mut self, policy: CachePolicy) -> Self {
        self.durable = policy;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

/// Options for a single `set`.
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Entry TTL; the target layer's `default_ttl` when omitted.
    pub ttl: Option<Duration>,
    /// Target layer; `Fast` when omitted. Writes never replicate to other
    /// layers.
    pub layer: Option<CacheLayer>,
    /// Tags for bulk invalidation.
    pub tags: HashSet<String>,
}

impl SetOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn with_layer(mut self, layer: CacheLayer) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }
}

/// Point-in-time counters across all three layers.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub fast_hits: u64,
    pub session_hits: u64,
    pub durable_hits: u64,
    pub entries: usize,
    pub size_bytes: usize,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct LayerHits {
    fast: AtomicU64,
    session: AtomicU64,
    durable: AtomicU64,
}

struct SweepHandle {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Three bounded stores composed behind one interface.
///
/// A layer-less `get` probes Fast → Session → Durable; a hit in a lower tier
/// is promoted (copied) into Fast under Fast's own TTL and eviction rules,
/// never removing the original. Writes go to exactly one layer.
pub struct MultiLayerCache {
    fast: CacheStore,
    session: CacheStore,
    durable: CacheStore,
    hits: AtomicU64,
    misses: AtomicU64,
    layer_hits: LayerHits,
    sweep_interval: Duration,
    sweeper: Mutex<Option<SweepHandle>>,
}

impl MultiLayerCache {
    pub fn new(config: MultiLayerConfig) -> Self {
        Self {
            fast: CacheStore::new(config.fast),
            session: CacheStore::new(config.session),
            durable: CacheStore::new(config.durable),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            layer_hits: LayerHits {
                fast: AtomicU64::new(0),
                session: AtomicU64::new(0),
                durable: AtomicU64::new(0),
            },
            sweep_interval: config.sweep_interval,
            sweeper: Mutex::new(None),
        }
    }

    fn store(&self, layer: CacheLayer) -> &CacheStore {
        match layer {
            CacheLayer::Fast => &self.fast,
            CacheLayer::Session => &self.session,
            CacheLayer::Durable => &self.durable,
        }
    }

    /// Look up a key.
    ///
    /// With an explicit `layer`, only that store is probed. Without one, the
    /// probe walks Fast, then Session, then Durable; a Session or Durable hit
    /// is copied into Fast (promotion may itself evict in Fast).
    pub fn get(&self, key: &str, layer: Option<CacheLayer>) -> Option<Vec<u8>> {
        if let Some(layer) = layer {
            return match self.store(layer).get(key) {
                Some(value) => {
                    self.record_hit(layer);
                    Some(value)
                }
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    None
                }
            };
        }

        if let Some(value) = self.fast.get(key) {
            self.record_hit(CacheLayer::Fast);
            return Some(value);
        }
        if let Some((value, tags)) = self.session.fetch(key) {
            self.record_hit(CacheLayer::Session);
            self.promote(key, &value, tags);
            return Some(value);
        }
        if let Some((value, tags)) = self.durable.fetch(key) {
            self.record_hit(CacheLayer::Durable);
            self.promote(key, &value, tags);
            return Some(value);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Copy a lower-tier hit into Fast. Fast's default TTL applies; the
    /// origin entry is untouched.
    fn promote(&self, key: &str, value: &[u8], tags: HashSet<String>) {
        if !self.fast.set(key, value.to_vec(), None, tags) {
            debug!(key, "promotion skipped, entry does not fit fast layer");
        }
    }

    fn record_hit(&self, layer: CacheLayer) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        let counter = match layer {
            CacheLayer::Fast => &self.layer_hits.fast,
            CacheLayer::Session => &self.layer_hits.session,
            CacheLayer::Durable => &self.layer_hits.durable,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Write to a single layer (default Fast). Returns `false` when the
    /// entry was not admitted (oversized); cache misbehavior is degradation,
    /// not an error.
    pub fn set(&self, key: &str, value: Vec<u8>, options: SetOptions) -> bool {
        let layer = options.layer.unwrap_or(CacheLayer::Fast);
        self.store(layer).set(key, value, options.ttl, options.tags)
    }

    /// Typed read through serde_json. A payload that fails to decode counts
    /// as a miss rather than an error.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str, layer: Option<CacheLayer>) -> Option<T> {
        let raw = self.get(key, layer)?;
        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "cached payload failed to decode, treating as miss");
                None
            }
        }
    }

    /// Typed write through serde_json.
    pub fn set_json<T: Serialize>(&self, key: &str, value: &T, options: SetOptions) -> Result<bool> {
        let raw = serde_json::to_vec(value)?;
        Ok(self.set(key, raw, options))
    }

    /// Delete from all three layers; `true` if at least one held the key.
    pub fn delete(&self, key: &str) -> bool {
        let fast = self.fast.delete(key);
        let session = self.session.delete(key);
        let durable = self.durable.delete(key);
        fast || session || durable
    }

    /// Tag invalidation aggregated across layers.
    pub fn delete_by_tags(&self, tags: &[String]) -> usize {
        self.fast.delete_by_tags(tags)
            + self.session.delete_by_tags(tags)
            + self.durable.delete_by_tags(tags)
    }

    pub fn clear(&self) {
        self.fast.clear();
        self.session.clear();
        self.durable.clear();
    }

    /// One sweep pass over all layers; returns entries removed.
    pub fn sweep(&self) -> usize {
        self.fast.sweep_expired() + self.session.sweep_expired() + self.durable.sweep_expired()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fast_hits: self.layer_hits.fast.load(Ordering::Relaxed),
            session_hits: self.layer_hits.session.load(Ordering::Relaxed),
            durable_hits: self.layer_hits.durable.load(Ordering::Relaxed),
            entries: self.fast.len() + self.session.len() + self.durable.len(),
            size_bytes: self.fast.size_bytes()
                + self.session.size_bytes()
                + self.durable.size_bytes(),
            evictions: self.fast.evictions()
                + self.session.evictions()
                + self.durable.evictions(),
        }
    }

    /// Start the periodic expiry sweep as a background task.
    ///
    /// The task holds only a `Weak` reference, so dropping the cache ends it;
    /// [`MultiLayerCache::shutdown`] stops it deterministically. Idempotent.
    pub fn start_sweeper(self: &Arc<Self>) {
        let mut guard = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_some() {
            return;
        }
        let token = CancellationToken::new();
        let task_token = token.clone();
        let weak: Weak<Self> = Arc::downgrade(self);
        let interval = self.sweep_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(cache) = weak.upgrade() else { break };
                        let removed = cache.sweep();
                        if removed > 0 {
                            debug!(removed, "periodic sweep removed expired entries");
                        }
                    }
                }
            }
        });
        *guard = Some(SweepHandle { token, handle });
    }

    /// Cancel the sweep task and wait for it to finish.
    pub async fn shutdown(&self) {
        let taken = {
            let mut guard = self.sweeper.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        if let Some(sweeper) = taken {
            sweeper.token.cancel();
            if let Err(e) = sweeper.handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "sweep task ended abnormally");
                }
            }
        }
    }
}

impl Drop for MultiLayerCache {
    fn drop(&mut self) {
        // Best-effort cancellation; shutdown() is the deterministic path.
        if let Ok(mut guard) = self.sweeper.lock() {
            if let Some(sweeper) = guard.take() {
                sweeper.token.cancel();
            }
        }
    }
}
