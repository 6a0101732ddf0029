//! Exponential-backoff retry loop.
//!
//! Cooperates with the circuit breaker through error classification: a
//! breaker-open error is non-retryable, so the loop stops immediately
//! instead of hammering an already-open breaker.

use crate::error::{Result, SystemError};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Configuration for the retry loop.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Overall deadline; checked before every sleep, so an expired deadline
    /// aborts the loop rather than sleeping through it.
    pub deadline: Option<Instant>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            multiplier: 2.0,
            max_delay: Duration::from_millis(30_000),
            deadline: None,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Delay before retry number `attempt` (1-based), grown geometrically
    /// and capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self.initial_delay.as_millis() as f64;
        let grown = base * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = grown.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Run `op` with exponential backoff between failed attempts.
///
/// Non-retryable errors re-raise immediately. Exhausted retries re-raise the
/// last error tagged with the number of retries spent. The sleep is a
/// non-blocking suspension; a configured deadline aborts before the next
/// sleep with a Timeout error.
pub async fn retry_with_backoff<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.retryable => return Err(e.with_retry_count(attempt)),
            Err(e) if attempt >= config.max_retries => {
                debug!(attempts = attempt + 1, error = %e, "retries exhausted");
                return Err(e.with_retry_count(attempt));
            }
            Err(e) => {
                attempt += 1;
                let delay = config.delay_for_attempt(attempt);
                if let Some(deadline) = config.deadline {
                    if Instant::now() + delay >= deadline {
                        return Err(SystemError::deadline_exceeded(
                            "retry aborted before backoff sleep",
                        )
                        .with_retry_count(attempt - 1));
                    }
                }
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying after backoff");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{classify, ErrorKind};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    fn fast_config(max_retries: u32) -> RetryConfig {
        RetryConfig::new()
            .with_max_retries(max_retries)
            .with_initial_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_backoff_growth_and_cap() {
        let config = RetryConfig::default();
        let delays: Vec<u64> = (1..=6)
            .map(|a| config.delay_for_attempt(a).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![1000, 2000, 4000, 8000, 16000, 30000]);
    }

    #[tokio::test]
    async fn test_success_returns_immediately() {
        let calls = AtomicU32::new(0);
        let result = retry_with_backoff(&fast_config(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(1u32) }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = Arc::clone(&calls);
        let result = retry_with_backoff(&fast_config(3), move || {
            let n = calls_in.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(classify("connection reset"))
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(&fast_config(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(classify("invalid request body")) }
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidInput);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_retry_count() {
        let result: Result<()> = retry_with_backoff(&fast_config(3), || async {
            Err(classify("network unreachable"))
        })
        .await;
        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Network);
        assert_eq!(err.retry_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observed_delays_match_schedule() {
        let observed = Arc::new(Mutex::new(Vec::new()));
        let observed_in = Arc::clone(&observed);
        let started = Instant::now();

        let config = RetryConfig::new().with_max_retries(5);
        let _: Result<()> = retry_with_backoff(&config, move || {
            observed_in.lock().unwrap().push(started.elapsed().as_millis() as u64);
            async { Err(classify("connection refused")) }
        })
        .await;

        // Attempt start offsets: cumulative sums of 1000,2000,4000,8000,16000
        let offsets = observed.lock().unwrap().clone();
        assert_eq!(offsets, vec![0, 1000, 3000, 7000, 15000, 31000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_aborts_before_sleep() {
        let config = RetryConfig::new()
            .with_max_retries(10)
            .with_deadline(Instant::now() + Duration::from_millis(500));
        let calls = AtomicU32::new(0);

        let result: Result<()> = retry_with_backoff(&config, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(classify("connection refused")) }
        })
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        // First backoff (1000ms) would overshoot the 500ms deadline, so only
        // the initial attempt ran and no sleep happened.
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_breaker_open_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_backoff(&fast_config(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SystemError::breaker_open("upstream")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
