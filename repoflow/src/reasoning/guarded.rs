//! Deadline and retry wrapper for reasoning calls.

use super::retry::{with_retry, RetryConfig};
use super::{Reasoner, ReasoningRequest};
use crate::errors::RepoflowError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Wraps a reasoner with a per-call deadline and bounded retries.
///
/// An elapsed deadline becomes [`RepoflowError::Timeout`], which is retryable.
#[derive(Clone)]
pub struct GuardedReasoner {
    inner: Arc<dyn Reasoner>,
    deadline: Duration,
    retry: RetryConfig,
}

impl GuardedReasoner {
    /// Creates a guard with the given deadline and no retries.
    #[must_use]
    pub fn new(inner: Arc<dyn Reasoner>, deadline: Duration) -> Self {
        Self {
            inner,
            deadline,
            retry: RetryConfig::disabled(),
        }
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the per-call deadline.
    #[must_use]
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    async fn attempt(&self, request: &ReasoningRequest) -> Result<String, RepoflowError> {
        match tokio::time::timeout(self.deadline, self.inner.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(RepoflowError::Timeout {
                operation: format!("{} reasoning call", request.purpose),
                after_ms: u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }
}

impl std::fmt::Debug for GuardedReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardedReasoner")
            .field("deadline", &self.deadline)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Reasoner for GuardedReasoner {
    async fn complete(&self, request: &ReasoningRequest) -> Result<String, RepoflowError> {
        with_retry(&self.retry, &request.purpose, || self.attempt(request)).await
    }
}
