//! Classified query errors

use std::fmt;

/// Error class, as used by the recovery policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response received
    Network,
    /// Request rejected as malformed (4xx other than auth)
    Validation,
    /// Backend fault (5xx)
    Server,
    /// Unauthenticated or unauthorized (401/403)
    Auth,
    /// Load abandoned by the caller before its result was applied
    Cancelled,
}

impl ErrorKind {
    /// Lowercase tag
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Validation => "validation",
            Self::Server => "server",
            Self::Auth => "auth",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failed load, classified
///
/// A failed load never mutates the store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// Service unreachable
    #[error("network error: {message}")]
    Network {
        /// Human-readable message
        message: String,
    },

    /// Malformed query, e.g. unknown sort field
    #[error("validation error: {message}")]
    Validation {
        /// Human-readable message
        message: String,
        /// Original status code; `None` when rejected locally
        status: Option<u16>,
    },

    /// Backend fault
    #[error("server error ({status}): {message}")]
    Server {
        /// Human-readable message
        message: String,
        /// Original status code
        status: u16,
    },

    /// Unauthenticated or unauthorized
    #[error("auth error ({status}): {message}")]
    Auth {
        /// Human-readable message
        message: String,
        /// Original status code
        status: u16,
    },

    /// Result discarded because the load was abandoned
    #[error("query {epoch} cancelled")]
    Cancelled {
        /// Epoch of the abandoned load
        epoch: u64,
    },
}

impl QueryError {
    /// Local validation failure
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            status: None,
        }
    }

    /// Error class
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Server { .. } => ErrorKind::Server,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    /// Original status code, if a response was received
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Validation { status, .. } => *status,
            Self::Server { status, .. } | Self::Auth { status, .. } => Some(*status),
            Self::Network { .. } | Self::Cancelled { .. } => None,
        }
    }

    /// Human-readable message
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Network { message }
            | Self::Validation { message, .. }
            | Self::Server { message, .. }
            | Self::Auth { message, .. } => message.clone(),
            Self::Cancelled { .. } => self.to_string(),
        }
    }

    /// Whether the class is eligible for automatic retry
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Server)
    }
}

/// Result type for query operations
pub type Result<T> = std::result::Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_status_follow_variant() {
        let err = QueryError::Auth {
            message: "expired token".into(),
            status: 401,
        };
        assert_eq!(err.kind(), ErrorKind::Auth);
        assert_eq!(err.status(), Some(401));
        assert!(!err.is_retryable());

        let local = QueryError::invalid("page size must be positive");
        assert_eq!(local.status(), None);
        assert_eq!(local.to_string(), "validation error: page size must be positive");
    }

    #[test]
    fn only_network_and_server_retry() {
        assert!(QueryError::Network { message: "down".into() }.is_retryable());
        assert!(QueryError::Server {
            message: "boom".into(),
            status: 503
        }
        .is_retryable());
        assert!(!QueryError::Cancelled { epoch: 3 }.is_retryable());
    }
}
