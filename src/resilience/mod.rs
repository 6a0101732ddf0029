//! 弹性模式模块：熔断、退避重试与类型化错误恢复。
//!
//! # Resilience Primitives Module
//!
//! This module guards every expensive upstream (LLM) invocation with a
//! circuit breaker, an exponential-backoff retry loop, and a typed
//! error-recovery dispatcher.
//!
//! ## Overview
//!
//! Resilience patterns are essential for production AI systems to:
//! - Prevent cascade failures when the upstream is unavailable
//! - Stop hammering a dependency that is already rate limiting
//! - Provide graceful degradation instead of user-visible failure
//! - Enable fast failure detection and recovery
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`circuit_breaker`] | Per-dependency Closed/Open/HalfOpen state machine |
//! | [`retry`] | Exponential-backoff retry with deadline support |
//! | [`recovery`] | ErrorKind → RecoveryStrategy dispatch |
//! | [`ResilienceExecutor`] | Single entry point combining all three |
//!
//! ## Example
//!
//! ```rust,no_run
//! use ai_cache_rust::resilience::{ResilienceExecutor, CallOptions};
//! use ai_cache_rust::error::SystemError;
//!
//! # async fn demo() -> ai_cache_rust::error::Result<()> {
//! let exec = ResilienceExecutor::new();
//! let options = CallOptions::new().with_fallback(|| "cached summary".to_string());
//! let outcome = exec
//!     .call("openai:gpt-4o", options, || async {
//!         // the expensive upstream call
//!         Ok::<String, SystemError>("fresh answer".to_string())
//!     })
//!     .await?;
//! if outcome.degraded {
//!     // render with a "temporarily degraded" notice
//! }
//! # Ok(())
//! # }
//! ```

pub mod circuit_breaker;
pub mod recovery;
pub mod retry;

pub use circuit_breaker::{
    BreakerRegistry, BreakerState, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerSnapshot,
};
pub use recovery::{strategy_for, Disposition, ErrorHandler, RecoveryStrategy};
pub use retry::{retry_with_backoff, RetryConfig};

use crate::error::Result;
use std::future::Future;
use tracing::debug;

/// A successful call result, annotated so the presentation layer can
/// distinguish a degraded or cached answer from a fresh one.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    /// Value came from a cache rather than the upstream.
    pub cached: bool,
    /// Value is a fallback or placeholder, not a full-quality result.
    pub degraded: bool,
}

impl<T> Outcome<T> {
    pub fn fresh(value: T) -> Self {
        Self {
            value,
            cached: false,
            degraded: false,
        }
    }

    pub fn cached(value: T) -> Self {
        Self {
            value,
            cached: true,
            degraded: false,
        }
    }

    pub fn degraded(value: T) -> Self {
        Self {
            value,
            cached: false,
            degraded: true,
        }
    }
}

/// Per-call options for [`ResilienceExecutor::call`].
pub struct CallOptions<T> {
    pub retry: RetryConfig,
    /// Best-effort substitute used when the breaker is open or recovery
    /// selects fallback/degradation.
    pub fallback: Option<Box<dyn Fn() -> T + Send + Sync>>,
}

impl<T> CallOptions<T> {
    pub fn new() -> Self {
        Self {
            retry: RetryConfig::default(),
            fallback: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_fallback(mut self, fallback: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }
}

impl<T> Default for CallOptions<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// The single entry point guarding upstream calls.
///
/// Composition order per attempt: the retry loop drives attempts; each
/// attempt takes a breaker permit, runs the (unlocked) upstream call, and
/// records the outcome. Failures that survive retries and the breaker gate
/// are handed to the [`ErrorHandler`], which may convert them into a
/// degraded result via the caller's fallback.
pub struct ResilienceExecutor {
    breakers: BreakerRegistry,
    handler: ErrorHandler,
}

impl ResilienceExecutor {
    pub fn new() -> Self {
        Self {
            breakers: BreakerRegistry::default(),
            handler: ErrorHandler::new(),
        }
    }

    pub fn with_breaker_config(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: BreakerRegistry::new(config),
            handler: ErrorHandler::new(),
        }
    }

    /// Call `op` guarded by the dependency's breaker, the retry loop, and
    /// the recovery dispatcher.
    pub async fn call<T, F, Fut>(
        &self,
        dependency: &str,
        options: CallOptions<T>,
        op: F,
    ) -> Result<Outcome<T>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let breaker = self.breakers.get_or_create(dependency);

        let attempt = || async {
            // Permit check and outcome recording are short critical
            // sections; the upstream await happens with no lock held.
            breaker.allow()?;
            match op().await {
                Ok(value) => {
                    breaker.on_success();
                    Ok(value)
                }
                Err(e) => {
                    breaker.on_failure();
                    Err(e)
                }
            }
        };

        match retry_with_backoff(&options.retry, attempt).await {
            Ok(value) => Ok(Outcome::fresh(value)),
            Err(e) => match self.handler.handle(e, dependency) {
                Disposition::Rethrow(e) => match options.fallback {
                    // A breaker-open (or otherwise rethrown) failure still
                    // degrades gracefully when the caller offered a fallback.
                    Some(fb) => {
                        debug!(dependency, "rethrown failure converted by caller fallback");
                        Ok(Outcome::degraded(fb()))
                    }
                    None => Err(e),
                },
                Disposition::UseFallback(e) | Disposition::Degrade(e) => match options.fallback {
                    Some(fb) => Ok(Outcome::degraded(fb())),
                    // No fallback to degrade into: the classified error
                    // surfaces with its kind and severity intact.
                    None => Err(e),
                },
            },
        }
    }

    /// Observability hook: snapshots of every breaker created so far.
    pub fn breaker_snapshots(&self) -> Vec<CircuitBreakerSnapshot> {
        self.breakers.snapshots()
    }
}

impl Default for ResilienceExecutor {
    fn default() -> Self {
        Self::new()
    }
}
