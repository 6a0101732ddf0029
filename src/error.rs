//! 统一错误类型：将原始故障归入可操作的错误分类与严重级别。
//!
//! Unified error type for the resilience runtime.
//!
//! Every raw failure that enters the runtime (upstream transport errors,
//! serialization problems, cache-internal faults) is mapped onto a single
//! typed taxonomy ([`ErrorKind`] × [`Severity`] × `retryable`) so that the
//! retry loop, the circuit breaker, and the recovery dispatcher can make
//! decisions without string-matching downstream.
//!
//! ## Example
//!
//! ```rust
//! use ai_cache_rust::error::{classify, ErrorKind};
//!
//! let err = classify("connection reset by peer");
//! assert_eq!(err.kind, ErrorKind::Network);
//! assert!(err.retryable);
//! ```

use std::fmt;
use std::time::SystemTime;
use thiserror::Error;

/// Error classification for routing recovery decisions.
///
/// Closed set: the recovery policy table matches exhaustively on this enum,
/// so adding a variant forces every dispatch site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection-level failure reaching the upstream (DNS, reset, refused).
    Network,
    /// Upstream signalled rate limiting (HTTP 429 or equivalent).
    UpstreamRateLimit,
    /// The request itself is malformed; no amount of retrying helps.
    InvalidInput,
    /// The upstream accepted the request but failed while processing it.
    Processing,
    /// A fault inside the cache subsystem itself.
    CacheFault,
    /// Persistence / database failure.
    Storage,
    /// The call exceeded its deadline.
    Timeout,
    /// Could not be classified.
    Unknown,
}

impl ErrorKind {
    /// Returns the standard name (e.g., `"rate_limit"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::UpstreamRateLimit => "rate_limit",
            Self::InvalidInput => "invalid_input",
            Self::Processing => "processing",
            Self::CacheFault => "cache_fault",
            Self::Storage => "storage",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }

    /// Returns whether errors of this kind are retryable by default.
    ///
    /// Rate-limit errors are retryable but expected to be gated by the
    /// circuit breaker before the retry loop sees them again.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Network | Self::UpstreamRateLimit | Self::Timeout | Self::Storage
        )
    }

    /// Returns the default severity assigned during classification.
    #[inline]
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::Network | Self::Timeout => Severity::Medium,
            Self::UpstreamRateLimit => Severity::Medium,
            Self::InvalidInput => Severity::Low,
            Self::Processing => Severity::High,
            Self::CacheFault => Severity::Low,
            Self::Storage => Severity::High,
            Self::Unknown => Severity::Medium,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How much a failure should alarm an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Typed error carried through the resilience pipeline.
///
/// `retry_count` records how many retry attempts had been spent when the
/// error finally surfaced, so callers can log exhaustion accurately.
#[derive(Debug, Clone, Error)]
#[error("{kind} error ({severity}): {message}")]
pub struct SystemError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub retryable: bool,
    pub retry_count: u32,
    pub occurred_at: SystemTime,
    pub message: String,
}

impl SystemError {
    /// Create an error of the given kind with its default severity and
    /// retryability.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            retryable: kind.retryable(),
            retry_count: 0,
            occurred_at: SystemTime::now(),
            message: message.into(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    /// Non-retryable processing error raised when a circuit breaker
    /// short-circuits a call and no fallback was supplied.
    pub fn breaker_open(dependency: &str) -> Self {
        Self::new(
            ErrorKind::Processing,
            format!("circuit breaker open for '{}'", dependency),
        )
        .with_severity(Severity::High)
        .with_retryable(false)
    }

    /// Timeout error raised when a caller-supplied deadline expires inside
    /// the retry loop.
    pub fn deadline_exceeded(context: &str) -> Self {
        Self::new(ErrorKind::Timeout, format!("deadline exceeded: {}", context))
            .with_retryable(false)
    }

    /// Soft cache-internal fault; callers treat these as degradation, never
    /// as request failure.
    pub fn cache_fault(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CacheFault, message).with_retryable(false)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }
}

impl From<serde_json::Error> for SystemError {
    fn from(e: serde_json::Error) -> Self {
        SystemError::new(ErrorKind::Processing, format!("serialization error: {}", e))
            .with_retryable(false)
    }
}

/// Convenience result type used throughout the crate.
pub type Result<T> = std::result::Result<T, SystemError>;

/// Classify a raw error message into a [`SystemError`].
///
/// Substring heuristics assign the kind; explicit marker words override the
/// kind's default severity. Anything unrecognized lands on
/// `{Unknown, Medium}`. Matching is case-insensitive.
pub fn classify(message: &str) -> SystemError {
    let lower = message.to_lowercase();

    let kind = if lower.contains("timeout") || lower.contains("timed out") {
        ErrorKind::Timeout
    } else if lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("429")
    {
        ErrorKind::UpstreamRateLimit
    } else if lower.contains("network")
        || lower.contains("connection")
        || lower.contains("dns")
        || lower.contains("unreachable")
    {
        ErrorKind::Network
    } else if lower.contains("invalid")
        || lower.contains("validation")
        || lower.contains("malformed")
    {
        ErrorKind::InvalidInput
    } else if lower.contains("database") || lower.contains("storage") || lower.contains("sql") {
        ErrorKind::Storage
    } else if lower.contains("cache") {
        ErrorKind::CacheFault
    } else if lower.contains("processing") || lower.contains("internal server") {
        ErrorKind::Processing
    } else {
        ErrorKind::Unknown
    };

    let severity = if lower.contains("critical") || lower.contains("fatal") {
        Severity::Critical
    } else if lower.contains("urgent") || lower.contains("severe") {
        Severity::High
    } else {
        kind.default_severity()
    };

    SystemError::new(kind, message).with_severity(severity)
}
