//! Named-cache registry.
//!
//! Replaces the global singleton-manager pattern with an explicit registry
//! object: construct one at process start, inject it where caching is
//! needed, and build a fresh one per test instead of resetting global state.

use super::layered::{MultiLayerCache, MultiLayerConfig};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Process-wide factory for named [`MultiLayerCache`] instances.
pub struct CacheRegistry {
    caches: Mutex<HashMap<String, Arc<MultiLayerCache>>>,
    start_sweepers: bool,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self {
            caches: Mutex::new(HashMap::new()),
            start_sweepers: true,
        }
    }

    /// Registry whose caches never spawn sweep tasks. Useful for tests that
    /// drive expiry manually.
    pub fn without_sweepers() -> Self {
        Self {
            caches: Mutex::new(HashMap::new()),
            start_sweepers: false,
        }
    }

    /// Get the cache registered under `name`, creating it lazily.
    ///
    /// Idempotent by name: the first caller's config wins, and a differing
    /// config on a later call is ignored (use a new name for a new policy).
    pub fn get_or_create(&self, name: &str, config: MultiLayerConfig) -> Arc<MultiLayerCache> {
        let mut caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = caches.get(name) {
            debug!(name, "cache already registered, supplied config ignored");
            return Arc::clone(existing);
        }
        let cache = Arc::new(MultiLayerCache::new(config));
        if self.start_sweepers {
            cache.start_sweeper();
        }
        caches.insert(name.to_string(), Arc::clone(&cache));
        cache
    }

    /// Get a cache only if it is already registered.
    pub fn get(&self, name: &str) -> Option<Arc<MultiLayerCache>> {
        self.caches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.caches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Clear the contents of every registered cache. The caches themselves
    /// stay registered.
    pub fn clear_all(&self) {
        let caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());
        for cache in caches.values() {
            cache.clear();
        }
    }

    /// Stop every cache's sweep task and drop the registrations. The
    /// registry owner calls this on shutdown so no background work leaks.
    pub async fn shutdown(&self) {
        let drained: Vec<Arc<MultiLayerCache>> = {
            let mut caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());
            caches.drain().map(|(_, c)| c).collect()
        };
        for cache in drained {
            cache.shutdown().await;
        }
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}
