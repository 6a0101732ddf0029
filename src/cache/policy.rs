//! Cache policy configuration and eviction candidate selection.

use super::entry::CacheEntry;
use std::time::Duration;

/// Candidate-selection strategy used when a store is over capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EvictionPolicy {
    /// Least recently used: ascending `last_access`.
    #[default]
    Lru,
    /// Least frequently used: ascending hit count.
    Lfu,
    /// First in, first out: ascending `created_at`.
    Fifo,
    /// Soonest to expire: ascending remaining TTL.
    Ttl,
}

impl EvictionPolicy {
    /// Order keys most-evictable first.
    ///
    /// Pure over the entry snapshot it is given. Ties on the primary key
    /// fall back to ascending `created_at` so the ordering is deterministic.
    pub fn select_candidates<'a>(
        &self,
        entries: impl Iterator<Item = (&'a String, &'a CacheEntry)>,
    ) -> Vec<String> {
        let mut ranked: Vec<(&'a String, &'a CacheEntry)> = entries.collect();
        match self {
            Self::Lru => ranked.sort_by_key(|(_, e)| (e.last_access, e.created_at)),
            Self::Lfu => ranked.sort_by_key(|(_, e)| (e.hits, e.created_at)),
            Self::Fifo => ranked.sort_by_key(|(_, e)| e.created_at),
            Self::Ttl => ranked.sort_by_key(|(_, e)| (e.remaining_ttl(), e.created_at)),
        }
        ranked.into_iter().map(|(k, _)| k.clone()).collect()
    }
}

/// Per-store configuration.
///
/// `compression_enabled` is reserved for a future compressed value encoding
/// and is currently never read.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    pub max_size_bytes: usize,
    pub max_entries: usize,
    pub default_ttl: Duration,
    pub eviction_policy: EvictionPolicy,
    pub compression_enabled: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            max_size_bytes: 50 * 1024 * 1024,
            max_entries: 1000,
            default_ttl: Duration::from_secs(3600),
            eviction_policy: EvictionPolicy::Lru,
            compression_enabled: false,
        }
    }
}

impl CachePolicy {
    /// Create a new policy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_size_bytes(mut self, bytes: usize) -> Self {
        self.max_size_bytes = bytes;
        self
    }

    pub fn with_max_entries(mut self, entries: usize) -> Self {
        self.max_entries = entries;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_eviction_policy(mut self, policy: EvictionPolicy) -> Self {
        self.eviction_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::collections::HashSet;
    use std::thread;
    use std::time::Duration;

    fn entry(ttl_ms: u64) -> CacheEntry {
        CacheEntry::new(vec![0u8; 8], Duration::from_millis(ttl_ms), HashSet::new())
    }

    // Entries inserted with small sleeps so created_at/last_access order is
    // observable without mocking clocks.
    fn three_entries() -> HashMap<String, CacheEntry> {
        let mut map = HashMap::new();
        map.insert("a".to_string(), entry(10_000));
        thread::sleep(Duration::from_millis(5));
        map.insert("b".to_string(), entry(10_000));
        thread::sleep(Duration::from_millis(5));
        map.insert("c".to_string(), entry(10_000));
        map
    }

    #[test]
    fn test_lru_orders_by_last_access() {
        let mut map = three_entries();
        thread::sleep(Duration::from_millis(5));
        map.get_mut("a").unwrap().touch();

        let order = EvictionPolicy::Lru.select_candidates(map.iter());
        assert_eq!(order, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_lfu_orders_by_hits_with_created_tiebreak() {
        let mut map = three_entries();
        map.get_mut("c").unwrap().touch();
        map.get_mut("c").unwrap().touch();
        map.get_mut("b").unwrap().touch();

        // a (0 hits) before b (1) before c (2)
        let order = EvictionPolicy::Lfu.select_candidates(map.iter());
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_fifo_orders_by_insertion() {
        let mut map = three_entries();
        // Access pattern must not affect FIFO
        map.get_mut("a").unwrap().touch();

        let order = EvictionPolicy::Fifo.select_candidates(map.iter());
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_ttl_orders_soonest_expiry_first() {
        let mut map = HashMap::new();
        map.insert("long".to_string(), entry(60_000));
        map.insert("short".to_string(), entry(100));
        map.insert("medium".to_string(), entry(5_000));

        let order = EvictionPolicy::Ttl.select_candidates(map.iter());
        assert_eq!(order, vec!["short", "medium", "long"]);
    }

    #[test]
    fn test_policy_builder() {
        let policy = CachePolicy::new()
            .with_max_entries(10)
            .with_max_size_bytes(4096)
            .with_default_ttl(Duration::from_secs(30))
            .with_eviction_policy(EvictionPolicy::Fifo);
        assert_eq!(policy.max_entries, 10);
        assert_eq!(policy.max_size_bytes, 4096);
        assert_eq!(policy.default_ttl, Duration::from_secs(30));
        assert_eq!(policy.eviction_policy, EvictionPolicy::Fifo);
        assert!(!policy.compression_enabled);
    }
}
