//! Configuration for the pipeline and its reasoning capability.

use crate::errors::RepoflowError;
use crate::reasoning::RetryConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Configuration for the external reasoning capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonerConfig {
    /// API key sent as a bearer token. Never serialized.
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Deadline for a single call in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    /// Retry policy for retryable failures.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout() -> f64 {
    120.0
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            timeout_seconds: default_timeout(),
            retry: RetryConfig::default(),
        }
    }
}

impl ReasonerConfig {
    /// Gets the per-call deadline as a Duration.
    ///
    /// Values that are not a positive, representable number of seconds fall
    /// back to the default deadline.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        match Duration::try_from_secs_f64(self.timeout_seconds) {
            Ok(timeout) if !timeout.is_zero() => timeout,
            _ => Duration::from_secs_f64(default_timeout()),
        }
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = seconds;
        self
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoflowConfig {
    /// Reasoning capability settings.
    #[serde(default)]
    pub reasoning: ReasonerConfig,
    /// Directory holding extracted repositories.
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

impl Default for RepoflowConfig {
    fn default() -> Self {
        Self {
            reasoning: ReasonerConfig::default(),
            uploads_dir: default_uploads_dir(),
        }
    }
}

impl RepoflowConfig {
    /// Creates a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if a numeric variable cannot be parsed.
    pub fn from_env() -> Result<Self, RepoflowError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if a numeric variable cannot be parsed, or if
    /// the timeout is not a positive, finite number of seconds.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RepoflowError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            config.reasoning.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            config.reasoning.base_url = url;
        }
        if let Some(model) = lookup("REPOFLOW_MODEL") {
            config.reasoning.model = model;
        }
        if let Some(raw) = lookup("REPOFLOW_TIMEOUT_SECS") {
            config.reasoning.timeout_seconds = parse_timeout("REPOFLOW_TIMEOUT_SECS", &raw)?;
        }
        if let Some(raw) = lookup("REPOFLOW_MAX_ATTEMPTS") {
            let attempts: usize = parse_var("REPOFLOW_MAX_ATTEMPTS", &raw)?;
            config.reasoning.retry = config.reasoning.retry.with_max_attempts(attempts);
        }
        if let Some(dir) = lookup("REPOFLOW_UPLOADS_DIR") {
            config.uploads_dir = PathBuf::from(dir);
        }

        Ok(config)
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T, RepoflowError>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| RepoflowError::Config(format!("{name}={raw:?} is invalid: {e}")))
}

fn parse_timeout(name: &str, raw: &str) -> Result<f64, RepoflowError> {
    let seconds: f64 = parse_var(name, raw)?;
    match Duration::try_from_secs_f64(seconds) {
        Ok(timeout) if !timeout.is_zero() => Ok(seconds),
        _ => Err(RepoflowError::Config(format!(
            "{name}={raw:?} must be a positive, finite number of seconds"
        ))),
    }
}
