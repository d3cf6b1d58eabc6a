//! The external reasoning capability.
//!
//! The core treats the language model as an opaque capability: given role-tagged
//! messages it returns text. Structured responses are validated by
//! [`parse_structured`] before use and never trusted as executable.

mod guarded;
#[cfg(feature = "openai")]
mod openai;
mod parse;
mod retry;

pub use guarded::GuardedReasoner;
#[cfg(feature = "openai")]
pub use openai::OpenAiReasoner;
pub use parse::{extract_json, parse_structured};
pub use retry::{BackoffStrategy, JitterStrategy, RetryConfig, RetryDecision, RetryState};

use crate::errors::RepoflowError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the task.
    System,
    /// The request content.
    User,
    /// A prior model turn.
    Assistant,
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A request to the reasoning capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningRequest {
    /// Short label used in logs and timeout errors (e.g. "selector").
    pub purpose: String,
    /// Ordered messages.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Whether the response must be a JSON object.
    pub expect_json: bool,
}

impl ReasoningRequest {
    /// Creates a request with default temperature and free-text output.
    #[must_use]
    pub fn new(purpose: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            messages: Vec::new(),
            temperature: 0.7,
            expect_json: false,
        }
    }

    /// Appends a system message.
    #[must_use]
    pub fn system(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::system(content));
        self
    }

    /// Appends a user message.
    #[must_use]
    pub fn user(mut self, content: impl Into<String>) -> Self {
        self.messages.push(ChatMessage::user(content));
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Requires a JSON object response.
    #[must_use]
    pub fn expecting_json(mut self) -> Self {
        self.expect_json = true;
        self
    }

    /// Concatenated text of all user messages.
    #[must_use]
    pub fn user_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Trait for reasoning capabilities.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Sends a request and returns the raw response text.
    async fn complete(&self, request: &ReasoningRequest) -> Result<String, RepoflowError>;
}
