//! Scripted reasoning capabilities for tests.

use crate::errors::RepoflowError;
use crate::reasoning::{Reasoner, ReasoningRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Returns queued responses in order and records every request.
///
/// Once the queue is empty every call fails with a non-retryable reasoning
/// error.
#[derive(Debug, Default)]
pub struct ScriptedReasoner {
    responses: Mutex<VecDeque<Result<String, RepoflowError>>>,
    requests: Mutex<Vec<ReasoningRequest>>,
}

impl ScriptedReasoner {
    /// Creates a reasoner that replays `responses`.
    #[must_use]
    pub fn new(responses: Vec<Result<String, RepoflowError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Appends a successful response.
    pub fn push_ok(&self, response: impl Into<String>) {
        self.responses.lock().push_back(Ok(response.into()));
    }

    /// Requests received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<ReasoningRequest> {
        self.requests.lock().clone()
    }

    /// Purposes of the requests received so far.
    #[must_use]
    pub fn purposes(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.purpose.clone()).collect()
    }

    /// Number of calls made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Number of responses not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn complete(&self, request: &ReasoningRequest) -> Result<String, RepoflowError> {
        self.requests.lock().push(request.clone());
        self.responses.lock().pop_front().unwrap_or_else(|| {
            Err(RepoflowError::reasoning(format!(
                "no scripted response left for {}",
                request.purpose
            )))
        })
    }
}

/// Fails every call with a reasoning error.
#[derive(Debug, Clone)]
pub struct FailingReasoner {
    message: String,
    retryable: bool,
}

impl FailingReasoner {
    /// Creates a reasoner failing with a non-retryable `message`.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retryable: false,
        }
    }

    /// Makes the failures retryable.
    #[must_use]
    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }
}

#[async_trait]
impl Reasoner for FailingReasoner {
    async fn complete(&self, _request: &ReasoningRequest) -> Result<String, RepoflowError> {
        Err(RepoflowError::Reasoning {
            message: self.message.clone(),
            retryable: self.retryable,
        })
    }
}
