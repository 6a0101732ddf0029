//! 多层响应缓存模块：按容量与 TTL 约束缓存昂贵的 AI 调用结果。
//!
//! # Multi-Layer Response Caching Module
//!
//! This module caches the results of expensive AI/LLM invocations across
//! three independently bounded tiers, reducing API costs and latency for
//! repeated requests.
//!
//! ## Overview
//!
//! Caching is valuable for:
//! - Reducing API costs by avoiding duplicate upstream calls
//! - Improving response latency for repeated queries
//! - Enabling degraded-mode operation when the upstream is unavailable
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`MultiLayerCache`] | Fast/Session/Durable tiers with read-through promotion |
//! | [`CacheStore`] | One capacity- and count-bounded store |
//! | [`CachePolicy`] | Per-store limits, default TTL, and eviction policy |
//! | [`EvictionPolicy`] | LRU / LFU / FIFO / TTL candidate selection |
//! | [`CacheRegistry`] | Explicit named-cache factory (no global singletons) |
//! | [`CacheKeyGenerator`] | Request-fingerprint key generation |
//!
//! ## Example
//!
//! ```rust
//! use ai_cache_rust::cache::{CacheRegistry, MultiLayerConfig, SetOptions};
//!
//! let registry = CacheRegistry::without_sweepers();
//! let cache = registry.get_or_create("responses", MultiLayerConfig::default());
//!
//! cache.set("prompt-fingerprint", b"answer".to_vec(), SetOptions::new());
//! assert_eq!(cache.get("prompt-fingerprint", None), Some(b"answer".to_vec()));
//! ```
//!
//! ## Capacity Invariant
//!
//! Eviction runs synchronously before every insertion, so
//! `entries <= max_entries` and `size_bytes <= max_size_bytes` hold whenever
//! a `set` call has returned. An entry larger than a store's entire byte
//! budget is soft-rejected; the cache keeps serving.

mod entry;
mod key;
mod layered;
mod policy;
mod registry;
mod store;

pub use entry::{estimate_size, CacheEntry, FALLBACK_ENTRY_SIZE};
pub use key::{normalize_key, CacheKey, CacheKeyGenerator};
pub use layered::{CacheLayer, CacheStats, MultiLayerCache, MultiLayerConfig, SetOptions};
pub use policy::{CachePolicy, EvictionPolicy};
pub use registry::CacheRegistry;
pub use store::CacheStore;
