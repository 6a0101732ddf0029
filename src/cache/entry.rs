//! Cache entry representation and size accounting.

use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
// tokio's Instant so tests can drive expiry with a paused clock; identical
// to std::time::Instant outside a runtime.
use tokio::time::Instant;

/// Fallback size charged for values whose serialized size cannot be
/// determined.
pub const FALLBACK_ENTRY_SIZE: usize = 1024;

/// A single cached value with its bookkeeping.
///
/// Entries are created by `set`, mutated only through [`CacheEntry::touch`]
/// (stats on read), and removed by explicit delete, lazy expiry on read, the
/// periodic sweep, or eviction under capacity pressure.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub(crate) value: Vec<u8>,
    pub(crate) created_at: Instant,
    pub(crate) last_access: Instant,
    pub(crate) ttl: Duration,
    pub(crate) hits: u64,
    pub(crate) size_bytes: usize,
    pub(crate) tags: HashSet<String>,
}

impl CacheEntry {
    pub fn new(value: Vec<u8>, ttl: Duration, tags: HashSet<String>) -> Self {
        let now = Instant::now();
        let size_bytes = value.len();
        Self {
            value,
            created_at: now,
            last_access: now,
            ttl,
            hits: 0,
            size_bytes,
            tags,
        }
    }

    /// TTL check; readers call this on every lookup regardless of when the
    /// sweep last ran.
    pub fn is_expired(&self) -> bool {
        self.created_at.elapsed() >= self.ttl
    }

    /// Remaining lifetime, zero once expired. Ordering key for the TTL
    /// eviction policy.
    pub fn remaining_ttl(&self) -> Duration {
        self.ttl.saturating_sub(self.created_at.elapsed())
    }

    /// Record a read hit.
    pub fn touch(&mut self) {
        self.last_access = Instant::now();
        self.hits += 1;
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn has_any_tag(&self, tags: &[String]) -> bool {
        tags.iter().any(|t| self.tags.contains(t))
    }
}

/// Estimate the cache-accounting size of a value, in bytes.
///
/// Deterministic and side-effect-free: serialized length when serde can
/// encode the value, [`FALLBACK_ENTRY_SIZE`] otherwise.
pub fn estimate_size<T: Serialize>(value: &T) -> usize {
    serde_json::to_vec(value)
        .map(|v| v.len())
        .unwrap_or(FALLBACK_ENTRY_SIZE)
}
