//! Retrying service decorator

use crate::policy::{ErrorRecoveryPolicy, RecoveryDecision};
use crate::service::{QueryService, ServiceError};
use async_trait::async_trait;
use triview_model::{Page, PageRequest};

/// Wraps a service and re-issues failed requests according to a policy
///
/// The raw error of the last attempt is returned unchanged, so callers
/// classify exactly once.
#[derive(Debug, Clone)]
pub struct RetryingService<S> {
    inner: S,
    policy: ErrorRecoveryPolicy,
}

impl<S: QueryService> RetryingService<S> {
    /// Wrap `inner` with `policy`
    #[inline]
    #[must_use]
    pub fn new(inner: S, policy: ErrorRecoveryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Wrapped service
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Policy in use
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &ErrorRecoveryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<S: QueryService> QueryService for RetryingService<S> {
    async fn query(&self, request: PageRequest) -> Result<Page, ServiceError> {
        let mut attempt = 1u32;
        loop {
            let error = match self.inner.query(request.clone()).await {
                Ok(page) => return Ok(page),
                Err(error) => error,
            };

            let classified = ErrorRecoveryPolicy::classify(error.clone());
            match self.policy.decide(&classified, attempt) {
                RecoveryDecision::RetryAfter(delay) => {
                    tracing::warn!(
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        kind = %classified.kind(),
                        error = %classified,
                        "retrying query"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RecoveryDecision::Surface(_) => return Err(error),
            }
        }
    }
}
