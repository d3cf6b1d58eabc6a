//! Retry utilities with configurable backoff and jitter strategies.
//!
//! Only failures classified as retryable (timeouts, transient provider errors)
//! are retried. Malformed responses are surfaced on the first attempt.

use crate::errors::RepoflowError;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^attempt
    #[default]
    Exponential,
    /// delay = base * (attempt + 1)
    Linear,
    /// delay = base (constant)
    Constant,
}

/// Jitter strategy to prevent thundering herd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    #[default]
    Full,
    /// Half fixed, half random
    Equal,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts (including the initial one).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Base delay between retries in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff strategy.
    #[serde(default)]
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter_strategy: JitterStrategy,
}

fn default_max_attempts() -> usize {
    2
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_strategy: BackoffStrategy::Exponential,
            jitter_strategy: JitterStrategy::Full,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A config that never retries.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default().with_max_attempts(1)
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff_strategy = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }
}

/// State tracking for retry operations.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempt: usize,
}

impl RetryState {
    /// Creates a new retry state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the delay before the next attempt.
    #[must_use]
    pub fn calculate_delay(&self, config: &RetryConfig) -> Duration {
        let base = config.base_delay_ms;
        let max = config.max_delay_ms;
        let exponent = u32::try_from(self.attempt).unwrap_or(u32::MAX);

        let delay = match config.backoff_strategy {
            BackoffStrategy::Exponential => base.saturating_mul(2u64.saturating_pow(exponent)).min(max),
            BackoffStrategy::Linear => base.saturating_mul(u64::from(exponent) + 1).min(max),
            BackoffStrategy::Constant => base.min(max),
        };

        let jittered = match config.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }

    /// Returns true if no attempts remain.
    #[must_use]
    pub fn is_exhausted(&self, config: &RetryConfig) -> bool {
        self.attempt >= config.max_attempts
    }
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more retries, give up.
    GiveUp,
    /// Don't retry, the error is not retryable.
    NotRetryable,
}

impl RetryState {
    /// Records a failed attempt and decides whether to try again.
    pub fn decide(&mut self, config: &RetryConfig, err: &RepoflowError) -> RetryDecision {
        self.attempt += 1;
        if !err.is_retryable() {
            return RetryDecision::NotRetryable;
        }
        if self.is_exhausted(config) {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(self.calculate_delay(config))
    }
}

/// Executes an operation, retrying retryable failures.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, label: &str, mut operation: F) -> Result<T, RepoflowError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, RepoflowError>>,
{
    let mut state = RetryState::new();

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => match state.decide(config, &e) {
                RetryDecision::Retry(delay) => {
                    tracing::warn!(
                        purpose = %label,
                        attempt = state.attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Retrying reasoning call"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp | RetryDecision::NotRetryable => return Err(e),
            },
        }
    }
}
