//! Per-layer bounded cache store.

use super::entry::CacheEntry;
use super::key::normalize_key;
use super::policy::CachePolicy;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<String, CacheEntry>,
    size_bytes: usize,
    evictions: u64,
}

/// One capacity- and count-bounded key→value store.
///
/// Every mutation, including the lazy-expiry removal performed inside
/// [`CacheStore::get`], happens under the store's single mutex, so the
/// capacity invariant (`size_bytes <= max_size_bytes` and
/// `len <= max_entries`) holds whenever the lock is released.
pub struct CacheStore {
    policy: CachePolicy,
    state: Mutex<StoreState>,
}

impl CacheStore {
    pub fn new(policy: CachePolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Look up a key. TTL-expired entries count as misses and are removed
    /// on the spot (lazy expiry), independent of the periodic sweep.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.fetch(key).map(|(value, _)| value)
    }

    /// Like [`CacheStore::get`] but also returns the entry's tags, so a hit
    /// in a lower tier can be promoted with its invalidation tags intact.
    pub(crate) fn fetch(&self, key: &str) -> Option<(Vec<u8>, HashSet<String>)> {
        let key = normalize_key(key);
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = st.entries.get_mut(&key) {
            if !entry.is_expired() {
                entry.touch();
                return Some((entry.value().to_vec(), entry.tags.clone()));
            }
        }
        // Absent, or expired: lazy-expiry removal under the same lock.
        if let Some(e) = st.entries.remove(&key) {
            st.size_bytes = st.size_bytes.saturating_sub(e.size_bytes());
        }
        None
    }

    /// Insert a value, evicting synchronously beforehand so the capacity
    /// invariant is never observable as violated.
    ///
    /// Returns `false` when the value cannot fit even into an emptied store
    /// (oversized single entry); the cache stays usable, the entry is simply
    /// not admitted.
    pub fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
        tags: HashSet<String>,
    ) -> bool {
        let key = normalize_key(key);
        let ttl = ttl.unwrap_or(self.policy.default_ttl);
        let entry = CacheEntry::new(value, ttl, tags);
        let incoming = entry.size_bytes();

        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());

        // Replacing an existing entry releases its accounted size first.
        if let Some(old) = st.entries.remove(&key) {
            st.size_bytes = st.size_bytes.saturating_sub(old.size_bytes());
        }

        if !self.ensure_capacity(&mut st, incoming) {
            debug!(key = %key, size = incoming, "entry exceeds store capacity, not cached");
            return false;
        }

        st.size_bytes += incoming;
        st.entries.insert(key, entry);
        true
    }

    /// Evict candidates until both bounds admit `incoming` more bytes and
    /// one more entry. Runs with the state lock already held.
    fn ensure_capacity(&self, st: &mut StoreState, incoming: usize) -> bool {
        if incoming > self.policy.max_size_bytes || self.policy.max_entries == 0 {
            return false;
        }
        while st.size_bytes + incoming > self.policy.max_size_bytes
            || st.entries.len() >= self.policy.max_entries
        {
            let candidates = self
                .policy
                .eviction_policy
                .select_candidates(st.entries.iter());
            let Some(victim) = candidates.into_iter().next() else {
                // No candidates left; only reachable if accounting drifted.
                return false;
            };
            if let Some(evicted) = st.entries.remove(&victim) {
                st.size_bytes = st.size_bytes.saturating_sub(evicted.size_bytes());
                st.evictions += 1;
                debug!(key = %victim, policy = ?self.policy.eviction_policy, "evicted cache entry");
            }
        }
        true
    }

    pub fn delete(&self, key: &str) -> bool {
        let key = normalize_key(key);
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match st.entries.remove(&key) {
            Some(e) => {
                st.size_bytes = st.size_bytes.saturating_sub(e.size_bytes());
                true
            }
            None => false,
        }
    }

    /// Remove every entry whose tag set intersects `tags`; returns the
    /// number removed. Full scan.
    pub fn delete_by_tags(&self, tags: &[String]) -> usize {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let victims: Vec<String> = st
            .entries
            .iter()
            .filter(|(_, e)| e.has_any_tag(tags))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &victims {
            if let Some(e) = st.entries.remove(key) {
                st.size_bytes = st.size_bytes.saturating_sub(e.size_bytes());
            }
        }
        victims.len()
    }

    pub fn clear(&self) {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        st.entries.clear();
        st.size_bytes = 0;
    }

    /// Hard-delete every TTL-expired entry; called by the periodic sweep.
    /// Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let victims: Vec<String> = st
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for key in &victims {
            if let Some(e) = st.entries.remove(key) {
                st.size_bytes = st.size_bytes.saturating_sub(e.size_bytes());
            }
        }
        victims.len()
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn size_bytes(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .size_bytes
    }

    pub fn evictions(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .evictions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::policy::EvictionPolicy;
    use std::thread;

    fn store(max_entries: usize, max_bytes: usize) -> CacheStore {
        CacheStore::new(
            CachePolicy::new()
                .with_max_entries(max_entries)
                .with_max_size_bytes(max_bytes)
                .with_default_ttl(Duration::from_secs(60)),
        )
    }

    fn set(store: &CacheStore, key: &str, value: &[u8]) -> bool {
        store.set(key, value.to_vec(), None, HashSet::new())
    }

    #[test]
    fn test_get_set_roundtrip() {
        let s = store(10, 4096);
        assert!(set(&s, "k1", b"value"));
        assert_eq!(s.get("k1"), Some(b"value".to_vec()));
        assert_eq!(s.get("missing"), None);
    }

    #[test]
    fn test_keys_are_normalized() {
        let s = store(10, 4096);
        assert!(set(&s, "Hello  World", b"v"));
        assert_eq!(s.get("hello world"), Some(b"v".to_vec()));
    }

    #[test]
    fn test_entry_count_bound_holds_after_every_set() {
        let s = store(2, 4096);
        for i in 0..10 {
            assert!(set(&s, &format!("k{}", i), b"x"));
            assert!(s.len() <= 2);
        }
    }

    #[test]
    fn test_size_bound_holds_after_every_set() {
        let s = store(100, 64);
        for i in 0..10 {
            assert!(set(&s, &format!("k{}", i), &[0u8; 20]));
            assert!(s.size_bytes() <= 64);
        }
    }

    #[test]
    fn test_oversized_entry_is_soft_rejected() {
        let s = store(10, 32);
        assert!(set(&s, "small", b"ok"));
        assert!(!set(&s, "huge", &[0u8; 64]));
        // Store still works and kept the small entry
        assert_eq!(s.get("small"), Some(b"ok".to_vec()));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_lru_eviction_order() {
        // cap=2: insert a, b; read a; insert c -> b evicted
        let s = store(2, 4096);
        set(&s, "a", b"1");
        thread::sleep(Duration::from_millis(5));
        set(&s, "b", b"2");
        thread::sleep(Duration::from_millis(5));
        assert!(s.get("a").is_some());
        thread::sleep(Duration::from_millis(5));
        set(&s, "c", b"3");

        assert!(s.get("b").is_none());
        assert!(s.get("a").is_some());
        assert!(s.get("c").is_some());
        assert_eq!(s.evictions(), 1);
    }

    #[test]
    fn test_lfu_evicts_least_hit() {
        let s = CacheStore::new(
            CachePolicy::new()
                .with_max_entries(2)
                .with_eviction_policy(EvictionPolicy::Lfu),
        );
        set(&s, "hot", b"1");
        set(&s, "cold", b"2");
        s.get("hot");
        s.get("hot");
        set(&s, "new", b"3");

        assert!(s.get("cold").is_none());
        assert!(s.get("hot").is_some());
    }

    #[test]
    fn test_expired_entry_is_a_miss_and_removed() {
        let s = store(10, 4096);
        s.set("gone", b"v".to_vec(), Some(Duration::ZERO), HashSet::new());
        assert_eq!(s.len(), 1);
        assert_eq!(s.get("gone"), None);
        assert_eq!(s.len(), 0);
        assert_eq!(s.size_bytes(), 0);
    }

    #[test]
    fn test_replace_releases_old_size() {
        let s = store(10, 64);
        set(&s, "k", &[0u8; 40]);
        assert_eq!(s.size_bytes(), 40);
        set(&s, "k", &[0u8; 10]);
        assert_eq!(s.size_bytes(), 10);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_delete_by_tags_idempotent() {
        let s = store(10, 4096);
        let tags: HashSet<String> = ["user:42".to_string()].into_iter().collect();
        s.set("a", b"1".to_vec(), None, tags.clone());
        s.set("b", b"2".to_vec(), None, tags);
        s.set("c", b"3".to_vec(), None, HashSet::new());

        let wanted = vec!["user:42".to_string()];
        assert_eq!(s.delete_by_tags(&wanted), 2);
        assert_eq!(s.delete_by_tags(&wanted), 0);
        assert!(s.get("c").is_some());
    }

    #[test]
    fn test_sweep_removes_cold_expired_entries() {
        let s = store(10, 4096);
        s.set("dead", b"1".to_vec(), Some(Duration::ZERO), HashSet::new());
        s.set("alive", b"2".to_vec(), Some(Duration::from_secs(60)), HashSet::new());
        assert_eq!(s.sweep_expired(), 1);
        assert_eq!(s.len(), 1);
        assert_eq!(s.sweep_expired(), 0);
    }

    #[test]
    fn test_clear() {
        let s = store(10, 4096);
        set(&s, "a", b"1");
        set(&s, "b", b"2");
        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.size_bytes(), 0);
    }

    #[test]
    fn test_concurrent_sets_respect_bounds() {
        use std::sync::Arc;

        let s = Arc::new(store(8, 1024));
        let mut handles = vec![];
        for t in 0..4 {
            let s = Arc::clone(&s);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    s.set(&format!("t{}-{}", t, i), vec![0u8; 16], None, HashSet::new());
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(s.len() <= 8);
        assert!(s.size_bytes() <= 1024);
    }
}
