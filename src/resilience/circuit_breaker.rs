use crate::error::{Result, SystemError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Breaker state as seen from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Normal operation; calls pass through.
    Closed,
    /// Failing; calls are short-circuited until the reset timeout elapses.
    Open,
    /// Trial mode; probe calls are allowed through.
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures in Closed before opening.
    pub failure_threshold: u32,
    /// Consecutive successes in HalfOpen before closing.
    pub success_threshold: u32,
    /// How long Open lasts before the next call is allowed as a probe.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure threshold
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the success threshold for closing from half-open
    pub fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Set the reset timeout
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

#[derive(Debug)]
struct State {
    state: BreakerState,
    failure_count: u32,
    success_count: u32,
    last_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerSnapshot {
    pub dependency: String,
    pub state: BreakerState,
    pub failure_count: u32,
    pub success_count: u32,
    /// Remaining open time in ms, if currently open.
    pub open_remaining_ms: Option<u64>,
    /// Milliseconds since the most recent recorded failure.
    pub last_failure_ms: Option<u64>,
}

/// Per-dependency circuit breaker.
///
/// - Closed: counts consecutive failures; opens at the threshold
/// - Open: short-circuits; lazily moves to HalfOpen once the reset timeout
///   has elapsed at the next permit check (no timer)
/// - HalfOpen: successes accumulate toward closing; one failure reopens
///
/// The permit check and the outcome recording are two separate short
/// critical sections; the lock is never held across the upstream call.
pub struct CircuitBreaker {
    dependency: String,
    cfg: CircuitBreakerConfig,
    state: Mutex<State>,
}

impl CircuitBreaker {
    pub fn new(dependency: impl Into<String>, cfg: CircuitBreakerConfig) -> Self {
        Self {
            dependency: dependency.into(),
            cfg,
            state: Mutex::new(State {
                state: BreakerState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_at: None,
                opened_at: None,
            }),
        }
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    /// Permit check. `Err` carries the non-retryable breaker-open error.
    ///
    /// Performs the lazy Open → HalfOpen transition when the reset timeout
    /// has elapsed.
    pub fn allow(&self) -> Result<()> {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match st.state {
            BreakerState::Closed | BreakerState::HalfOpen => Ok(()),
            BreakerState::Open => {
                let elapsed = st.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::MAX);
                if elapsed >= self.cfg.reset_timeout {
                    debug!(dependency = %self.dependency, "breaker moving to half-open probe mode");
                    st.state = BreakerState::HalfOpen;
                    st.success_count = 0;
                    Ok(())
                } else {
                    Err(SystemError::breaker_open(&self.dependency))
                }
            }
        }
    }

    /// Record a successful call outcome.
    pub fn on_success(&self) {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        match st.state {
            BreakerState::Closed => {
                // One success fully heals the failure count; no decay.
                st.failure_count = 0;
            }
            BreakerState::HalfOpen => {
                st.success_count = st.success_count.saturating_add(1);
                if st.success_count >= self.cfg.success_threshold {
                    debug!(dependency = %self.dependency, "breaker closed after successful probes");
                    st.state = BreakerState::Closed;
                    st.failure_count = 0;
                    st.success_count = 0;
                    st.opened_at = None;
                }
            }
            // Success arriving while Open: a call admitted before the
            // breaker opened finished late. The gate stays shut.
            BreakerState::Open => {}
        }
    }

    /// Record a failed call outcome.
    pub fn on_failure(&self) {
        let mut st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        st.last_failure_at = Some(Instant::now());
        match st.state {
            BreakerState::Closed => {
                st.failure_count = st.failure_count.saturating_add(1);
                if st.failure_count >= self.cfg.failure_threshold {
                    warn!(
                        dependency = %self.dependency,
                        failures = st.failure_count,
                        "circuit breaker opened"
                    );
                    st.state = BreakerState::Open;
                    st.opened_at = Some(Instant::now());
                }
            }
            BreakerState::HalfOpen => {
                warn!(dependency = %self.dependency, "probe failed, breaker reopened");
                st.state = BreakerState::Open;
                st.opened_at = Some(Instant::now());
                st.success_count = 0;
            }
            BreakerState::Open => {}
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .state
    }

    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let st = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let open_remaining_ms = st.opened_at.and_then(|opened| {
            if st.state != BreakerState::Open {
                return None;
            }
            self.cfg
                .reset_timeout
                .checked_sub(opened.elapsed())
                .map(|d| d.as_millis() as u64)
        });
        CircuitBreakerSnapshot {
            dependency: self.dependency.clone(),
            state: st.state,
            failure_count: st.failure_count,
            success_count: st.success_count,
            open_remaining_ms,
            last_failure_ms: st
                .last_failure_at
                .map(|t| t.elapsed().as_millis() as u64),
        }
    }

    /// Run `op` through the breaker: permit check, the (unlocked) call,
    /// then outcome recording.
    ///
    /// When the breaker is open, `fallback` is invoked if present; otherwise
    /// the non-retryable breaker-open error propagates.
    pub async fn execute<T, F, Fut>(&self, op: F, fallback: Option<&(dyn Fn() -> T + Send + Sync)>) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        if let Err(open_err) = self.allow() {
            return match fallback {
                Some(fb) => Ok(fb()),
                None => Err(open_err),
            };
        }
        match op().await {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                self.on_failure();
                Err(e)
            }
        }
    }
}

/// Lazily creates one breaker per dependency key.
///
/// Breakers live for the registry's lifetime and never expire. Distinct
/// keys get distinct locks, so breakers for different dependencies do not
/// contend.
pub struct BreakerRegistry {
    default_config: CircuitBreakerConfig,
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            default_config,
            breakers: Mutex::new(HashMap::new()),
        }
    }

    pub fn get_or_create(&self, dependency: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(breakers.entry(dependency.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::new(
                dependency.to_string(),
                self.default_config.clone(),
            ))
        }))
    }

    pub fn snapshots(&self) -> Vec<CircuitBreakerSnapshot> {
        self.breakers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .map(|b| b.snapshot())
            .collect()
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
