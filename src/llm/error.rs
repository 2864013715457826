//! Model error types with retry classification.
//!
//! Distinguishes between transient errors (should retry) and permanent errors (should not retry).

use std::time::Duration;

/// Error from model API calls.
#[derive(Debug, Clone)]
pub struct LlmError {
    /// The kind of error
    pub kind: LlmErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message
    pub message: String,
    /// Suggested retry delay (from Retry-After header)
    pub retry_after: Option<Duration>,
}

impl LlmError {
    /// Create a rate limit error.
    pub fn rate_limited(message: String, retry_after: Option<Duration>) -> Self {
        Self {
            kind: LlmErrorKind::RateLimited,
            status_code: Some(429),
            message,
            retry_after,
        }
    }

    /// Create a server error.
    pub fn server_error(status_code: u16, message: String) -> Self {
        Self {
            kind: LlmErrorKind::ServerError,
            status_code: Some(status_code),
            message,
            retry_after: None,
        }
    }

    /// Create a client error (bad request, auth, unknown model).
    pub fn client_error(status_code: u16, message: String) -> Self {
        Self {
            kind: LlmErrorKind::ClientError,
            status_code: Some(status_code),
            message,
            retry_after: None,
        }
    }

    /// Create a network error.
    pub fn network_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::NetworkError,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    /// Create a parse error.
    pub fn parse_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::ParseError,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    /// Check if this error is transient and should be retried.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Classification of model errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Rate limited (429) - transient, should retry with backoff
    RateLimited,
    /// Server error (500, 502, 503, 504) - transient, should retry
    ServerError,
    /// Client error (400, 401, 403, 404) - permanent, should not retry
    ClientError,
    /// Network error (connection failed, timeout) - transient, should retry
    NetworkError,
    /// Response parsing error - permanent
    ParseError,
}

impl LlmErrorKind {
    /// Check if this error kind is transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmErrorKind::RateLimited | LlmErrorKind::ServerError | LlmErrorKind::NetworkError
        )
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmErrorKind::RateLimited => write!(f, "Rate limited"),
            LlmErrorKind::ServerError => write!(f, "Server error"),
            LlmErrorKind::ClientError => write!(f, "Client error"),
            LlmErrorKind::NetworkError => write!(f, "Network error"),
            LlmErrorKind::ParseError => write!(f, "Parse error"),
        }
    }
}

/// Configuration for retry behavior.
///
/// Delays grow as `min_delay * 2^attempt` and are clamped to
/// `[min_delay, max_delay]`.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first call
    pub max_attempts: u32,
    /// Smallest delay between attempts
    pub min_delay: Duration,
    /// Largest delay between attempts
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryConfig {
    /// No waiting between attempts (tests, offline tools).
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Whether `error` should be retried after `attempts` calls so far.
    pub fn should_retry(&self, error: &LlmError, attempts: u32) -> bool {
        error.is_transient() && attempts < self.max_attempts
    }

    /// Delay before the retry following attempt number `attempt` (0-based).
    pub fn delay_for(&self, error: &LlmError, attempt: u32) -> Duration {
        let base = error.retry_after.unwrap_or_else(|| {
            let multiplier = 2u32.saturating_pow(attempt);
            self.min_delay.saturating_mul(multiplier)
        });
        base.clamp(self.min_delay, self.max_delay.max(self.min_delay))
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        500 | 502 | 503 | 504 => LlmErrorKind::ServerError,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(LlmErrorKind::RateLimited.is_transient());
        assert!(LlmErrorKind::ServerError.is_transient());
        assert!(LlmErrorKind::NetworkError.is_transient());
        assert!(!LlmErrorKind::ClientError.is_transient());
        assert!(!LlmErrorKind::ParseError.is_transient());
    }

    #[test]
    fn test_http_status_classification() {
        assert_eq!(classify_http_status(429), LlmErrorKind::RateLimited);
        assert_eq!(classify_http_status(500), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(503), LlmErrorKind::ServerError);
        assert_eq!(classify_http_status(400), LlmErrorKind::ClientError);
        assert_eq!(classify_http_status(401), LlmErrorKind::ClientError);
        assert_eq!(classify_http_status(403), LlmErrorKind::ClientError);
    }

    #[test]
    fn test_backoff_is_bounded() {
        let retry = RetryConfig::default();
        let error = LlmError::server_error(503, "busy".to_string());

        assert_eq!(retry.delay_for(&error, 0), Duration::from_secs(1));
        assert_eq!(retry.delay_for(&error, 1), Duration::from_secs(2));
        assert_eq!(retry.delay_for(&error, 2), Duration::from_secs(4));
        assert_eq!(retry.delay_for(&error, 3), Duration::from_secs(8));
        assert_eq!(retry.delay_for(&error, 30), Duration::from_secs(8));
    }

    #[test]
    fn test_retry_after_is_clamped() {
        let retry = RetryConfig::default();
        let long = LlmError::rate_limited("slow down".to_string(), Some(Duration::from_secs(30)));
        let short = LlmError::rate_limited("slow down".to_string(), Some(Duration::ZERO));
        assert_eq!(retry.delay_for(&long, 0), Duration::from_secs(8));
        assert_eq!(retry.delay_for(&short, 0), Duration::from_secs(1));
    }

    #[test]
    fn test_should_retry_respects_bound_and_kind() {
        let retry = RetryConfig::default();
        let transient = LlmError::network_error("reset".to_string());
        let permanent = LlmError::client_error(401, "bad key".to_string());
        assert!(retry.should_retry(&transient, 1));
        assert!(retry.should_retry(&transient, 2));
        assert!(!retry.should_retry(&transient, 3));
        assert!(!retry.should_retry(&permanent, 1));
    }
}
