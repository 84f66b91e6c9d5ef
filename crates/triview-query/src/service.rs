//! Query service boundary
//!
//! The transport is not part of this crate. Anything that can answer a
//! [`PageRequest`] with a [`Page`] or a [`ServiceError`] can back a
//! [`crate::QueryCoordinator`].

use async_trait::async_trait;
use std::sync::Arc;
use triview_model::{Page, PageRequest};

/// Raw failure raised by a query service, before classification
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// No response was received
    #[error("no response: {message}")]
    NoResponse {
        /// Transport message
        message: String,
    },

    /// Response received with a failure status
    #[error("status {code}: {message}")]
    Status {
        /// Status code
        code: u16,
        /// Response message
        message: String,
    },
}

impl ServiceError {
    /// No-response failure
    #[must_use]
    pub fn no_response(message: impl Into<String>) -> Self {
        Self::NoResponse {
            message: message.into(),
        }
    }

    /// Status failure
    #[must_use]
    pub fn status(code: u16, message: impl Into<String>) -> Self {
        Self::Status {
            code,
            message: message.into(),
        }
    }
}

/// Paged entity source
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Fetch one page matching `request`
    async fn query(&self, request: PageRequest) -> Result<Page, ServiceError>;
}

#[async_trait]
impl<S: QueryService + ?Sized> QueryService for Arc<S> {
    async fn query(&self, request: PageRequest) -> Result<Page, ServiceError> {
        (**self).query(request).await
    }
}
