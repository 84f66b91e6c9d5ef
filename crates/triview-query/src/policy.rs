//! Error recovery policy
//!
//! Classifies raw service failures and decides whether a failure is retried
//! after a backoff or surfaced. The policy holds no state and never touches
//! the store or the selection.

use crate::config::RetryConfig;
use crate::error::QueryError;
use crate::service::ServiceError;
use std::time::Duration;

/// What to do with a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// Re-issue the request after the delay
    RetryAfter(Duration),
    /// Give up and return the classified error
    Surface(QueryError),
}

/// Classification and retry decisions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorRecoveryPolicy {
    config: RetryConfig,
}

impl ErrorRecoveryPolicy {
    /// Create policy from retry config
    #[inline]
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Retry config in use
    #[inline]
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Map a raw failure onto the error taxonomy
    ///
    /// 401 and 403 are auth, other 4xx validation, 5xx server. A status
    /// outside 4xx/5xx still reports a failure, so it is treated as server.
    #[must_use]
    pub fn classify(error: ServiceError) -> QueryError {
        match error {
            ServiceError::NoResponse { message } => QueryError::Network { message },
            ServiceError::Status { code, message } => match code {
                401 | 403 => QueryError::Auth {
                    message,
                    status: code,
                },
                400..=499 => QueryError::Validation {
                    message,
                    status: Some(code),
                },
                _ => QueryError::Server {
                    message,
                    status: code,
                },
            },
        }
    }

    /// Decide after failed attempt number `attempt` (1 for the first try)
    ///
    /// Network and server failures retry up to `max_retries` times with
    /// delay `base * 2^(attempt-1)`, capped at `max_delay`.
    #[must_use]
    pub fn decide(&self, error: &QueryError, attempt: u32) -> RecoveryDecision {
        if !error.is_retryable() || attempt == 0 || attempt > self.config.max_retries {
            return RecoveryDecision::Surface(error.clone());
        }
        RecoveryDecision::RetryAfter(self.backoff(attempt))
    }

    /// Delay before retry number `attempt`
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.config
            .base_delay()
            .saturating_mul(factor)
            .min(self.config.max_delay())
    }
}

impl From<ServiceError> for QueryError {
    fn from(error: ServiceError) -> Self {
        ErrorRecoveryPolicy::classify(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn policy() -> ErrorRecoveryPolicy {
        ErrorRecoveryPolicy::new(
            RetryConfig::new()
                .with_max_retries(3)
                .with_backoff(Duration::from_millis(100), Duration::from_millis(300)),
        )
    }

    #[test]
    fn classify_status_codes() {
        let cases = [
            (401, ErrorKind::Auth),
            (403, ErrorKind::Auth),
            (400, ErrorKind::Validation),
            (404, ErrorKind::Validation),
            (422, ErrorKind::Validation),
            (500, ErrorKind::Server),
            (503, ErrorKind::Server),
            (302, ErrorKind::Server),
        ];
        for (code, kind) in cases {
            let err = ErrorRecoveryPolicy::classify(ServiceError::status(code, "x"));
            assert_eq!(err.kind(), kind, "status {code}");
            assert_eq!(err.status(), Some(code));
        }
    }

    #[test]
    fn classify_no_response_as_network() {
        let err: QueryError = ServiceError::no_response("connection refused").into();
        assert_eq!(err.kind(), ErrorKind::Network);
        assert_eq!(err.message(), "connection refused");
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = policy();
        let err = QueryError::Network { message: "down".into() };

        assert_eq!(policy.decide(&err, 1), RecoveryDecision::RetryAfter(Duration::from_millis(100)));
        assert_eq!(policy.decide(&err, 2), RecoveryDecision::RetryAfter(Duration::from_millis(200)));
        assert_eq!(policy.decide(&err, 3), RecoveryDecision::RetryAfter(Duration::from_millis(300)));
        assert_eq!(policy.decide(&err, 4), RecoveryDecision::Surface(err.clone()));
    }

    #[test]
    fn validation_and_auth_surface_immediately() {
        let policy = policy();
        for err in [
            QueryError::invalid("unknown sort field"),
            QueryError::Auth {
                message: "forbidden".into(),
                status: 403,
            },
        ] {
            assert_eq!(policy.decide(&err, 1), RecoveryDecision::Surface(err.clone()));
        }
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let policy = ErrorRecoveryPolicy::new(RetryConfig::new().with_max_retries(u32::MAX));
        assert_eq!(policy.backoff(200), policy.config().max_delay());
    }
}
