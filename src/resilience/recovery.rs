//! Typed error-recovery dispatch.
//!
//! Maps every [`ErrorKind`] to a recovery strategy through an exhaustive
//! match, so adding an error kind fails compilation here instead of falling
//! through an untyped policy map at runtime.

use crate::error::{ErrorKind, Severity, SystemError};
use tracing::{debug, warn};

/// How a classified failure should be recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Re-raise for the caller's retry loop.
    Retry,
    /// Substitute the caller-supplied fallback value.
    Fallback,
    /// Gate through the circuit breaker before any further attempt.
    CircuitBreaker,
    /// Return a reduced-quality placeholder rather than an error.
    GracefulDegradation,
}

/// Fixed policy table: kind → strategy.
pub fn strategy_for(kind: ErrorKind) -> RecoveryStrategy {
    match kind {
        ErrorKind::Network => RecoveryStrategy::Retry,
        ErrorKind::Timeout => RecoveryStrategy::Retry,
        ErrorKind::UpstreamRateLimit => RecoveryStrategy::CircuitBreaker,
        ErrorKind::InvalidInput => RecoveryStrategy::Fallback,
        ErrorKind::Processing => RecoveryStrategy::Fallback,
        ErrorKind::CacheFault => RecoveryStrategy::GracefulDegradation,
        ErrorKind::Storage => RecoveryStrategy::Retry,
        ErrorKind::Unknown => RecoveryStrategy::GracefulDegradation,
    }
}

/// What the executor should do with a failure after local recovery policy
/// has been consulted.
#[derive(Debug)]
pub enum Disposition {
    /// Propagate to the retry loop / caller.
    Rethrow(SystemError),
    /// Use the caller-supplied fallback; degraded result. Carries the
    /// original error so a caller without a fallback can still surface it.
    UseFallback(SystemError),
    /// Produce a best-effort placeholder; degraded result.
    Degrade(SystemError),
}

/// Dispatches classified errors to their recovery strategy.
#[derive(Debug, Default)]
pub struct ErrorHandler;

impl ErrorHandler {
    pub fn new() -> Self {
        Self
    }

    /// Decide the disposition for `error` raised while calling `context`.
    ///
    /// Retry and circuit-breaker strategies re-raise: the retry loop and the
    /// breaker gate already sit upstream of this handler, so the error keeps
    /// flowing through them. Fallback and graceful degradation convert the
    /// failure into a degraded-but-successful result.
    pub fn handle(&self, error: SystemError, context: &str) -> Disposition {
        if error.severity >= Severity::Critical {
            warn!(context, error = %error, "critical failure, no local recovery");
            return Disposition::Rethrow(error);
        }
        match strategy_for(error.kind) {
            RecoveryStrategy::Retry | RecoveryStrategy::CircuitBreaker => {
                Disposition::Rethrow(error)
            }
            RecoveryStrategy::Fallback => {
                debug!(context, error = %error, "recovering via fallback");
                Disposition::UseFallback(error)
            }
            RecoveryStrategy::GracefulDegradation => {
                debug!(context, error = %error, "recovering via graceful degradation");
                Disposition::Degrade(error)
            }
        }
    }
}
