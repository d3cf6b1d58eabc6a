//! OpenAI-compatible chat-completions client.

use super::{ChatMessage, Reasoner, ReasoningRequest};
use crate::config::ReasonerConfig;
use crate::errors::RepoflowError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Reasoner backed by an OpenAI-compatible HTTP endpoint.
pub struct OpenAiReasoner {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    timeout_ms: u64,
}

impl OpenAiReasoner {
    /// Builds a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if the HTTP client cannot be constructed.
    pub fn new(config: &ReasonerConfig) -> Result<Self, RepoflowError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| RepoflowError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout_ms: u64::try_from(config.timeout().as_millis()).unwrap_or(u64::MAX),
        })
    }

    /// Returns the model name sent with each request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl std::fmt::Debug for OpenAiReasoner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiReasoner")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("has_api_key", &self.api_key.is_some())
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    #[serde(default)]
    content: Option<String>,
}

fn map_send_error(err: &reqwest::Error, purpose: &str, timeout_ms: u64) -> RepoflowError {
    if err.is_timeout() {
        RepoflowError::Timeout {
            operation: format!("{purpose} reasoning call"),
            after_ms: timeout_ms,
        }
    } else if err.is_connect() {
        RepoflowError::reasoning_retryable(err.to_string())
    } else {
        RepoflowError::reasoning(err.to_string())
    }
}

#[async_trait]
impl Reasoner for OpenAiReasoner {
    async fn complete(&self, request: &ReasoningRequest) -> Result<String, RepoflowError> {
        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            temperature: request.temperature,
            response_format: request
                .expect_json
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        tracing::debug!(purpose = %request.purpose, model = %self.model, "Sending reasoning request");
        let response = builder
            .send()
            .await
            .map_err(|e| map_send_error(&e, &request.purpose, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = format!("HTTP {status}: {text}");
            return Err(if status.as_u16() == 429 || status.is_server_error() {
                RepoflowError::reasoning_retryable(message)
            } else {
                RepoflowError::reasoning(message)
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| map_send_error(&e, &request.purpose, self.timeout_ms))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| RepoflowError::reasoning("response contained no choices"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let config = ReasonerConfig {
            base_url: "https://llm.example.com/v1/".into(),
            ..ReasonerConfig::default()
        };
        let reasoner = OpenAiReasoner::new(&config).unwrap();
        assert_eq!(reasoner.endpoint, "https://llm.example.com/v1/chat/completions");
        assert_eq!(reasoner.model(), config.model);
    }

    #[test]
    fn test_request_body_shape() {
        let request = ReasoningRequest::new("selector").system("s").user("u").expecting_json();
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: &request.messages,
            temperature: 0.1,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "u");
    }

    #[test]
    fn test_debug_hides_api_key() {
        let config = ReasonerConfig {
            api_key: Some("sk-secret".into()),
            ..ReasonerConfig::default()
        };
        let reasoner = OpenAiReasoner::new(&config).unwrap();
        let debug = format!("{reasoner:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("has_api_key: true"));
    }
}
