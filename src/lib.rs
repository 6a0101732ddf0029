//! # ai-cache-rust
//!
//! AI 调用的弹性与缓存运行时：多层缓存、熔断器与指数退避重试。
//!
//! Resilience and caching runtime for AI workloads: a multi-layer response
//! cache with configurable eviction, a per-dependency circuit breaker, an
//! exponential-backoff retry engine, and a typed error-recovery dispatcher.
//!
//! ## Overview
//!
//! This library sits in front of every expensive AI/LLM invocation made by
//! an orchestration layer. A caller probes the cache by request fingerprint;
//! on a miss it invokes the upstream through the resilience executor, which
//! gates the call behind a circuit breaker, retries transient failures with
//! exponential backoff, and classifies anything that still fails so the
//! caller can decide between a degraded answer and a surfaced error.
//! Successful results are written back with a TTL and an invalidation tag
//! set.
//!
//! ## Core Philosophy
//!
//! - **Cache is an optimization, not a correctness dependency**: cache
//!   faults degrade, they never fail a request
//! - **Explicit over global**: caches and breakers live in injectable
//!   registries constructed at process start, not in singletons
//! - **Typed failure handling**: every raw error is classified into a closed
//!   kind/severity taxonomy before any recovery decision is made
//! - **Bounded by construction**: capacity invariants hold after every write
//!   because eviction runs synchronously before insertion
//!
//! ## Quick Start
//!
//! ```rust
//! use ai_cache_rust::cache::{CacheRegistry, MultiLayerConfig, SetOptions};
//!
//! let registry = CacheRegistry::without_sweepers();
//! let cache = registry.get_or_create("responses", MultiLayerConfig::default());
//!
//! cache.set("fingerprint", b"answer".to_vec(), SetOptions::new().with_tag("user:42"));
//! assert!(cache.get("fingerprint", None).is_some());
//! assert_eq!(cache.delete_by_tags(&["user:42".to_string()]), 1);
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Multi-layer bounded cache with eviction, tags, and sweep |
//! | [`resilience`] | Circuit breaker, retry engine, recovery dispatch |
//! | [`error`] | Typed error taxonomy and classification |

pub mod cache;
pub mod error;
pub mod resilience;

pub use cache::{
    CacheKey, CacheKeyGenerator, CacheLayer, CachePolicy, CacheRegistry, CacheStats,
    EvictionPolicy, MultiLayerCache, MultiLayerConfig, SetOptions,
};
pub use error::{classify, ErrorKind, Result, Severity, SystemError};
pub use resilience::{
    BreakerState, CallOptions, CircuitBreaker, CircuitBreakerConfig, Outcome, RecoveryStrategy,
    ResilienceExecutor, RetryConfig,
};
