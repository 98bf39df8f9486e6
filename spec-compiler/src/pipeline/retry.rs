//! Retry utilities with configurable backoff and jitter strategies.
//!
//! Used by the status publisher and the model backends. Only errors the
//! caller classifies as retryable are retried; everything else is returned
//! after the first attempt.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^retry
    #[default]
    Exponential,
    /// delay = base * (retry + 1)
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
    /// delay + random(0, delay / 10)
    Additive,
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts, including the initial one.
    pub max_attempts: usize,
    /// Base delay between retries in milliseconds.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds, applied before jitter.
    pub max_delay_ms: u64,
    /// Backoff strategy.
    pub backoff_strategy: BackoffStrategy,
    /// Jitter strategy.
    pub jitter_strategy: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
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

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
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

    /// Backoff delay before retry number `retry` (0-indexed), without jitter.
    #[must_use]
    pub fn base_delay_for(&self, retry: usize) -> Duration {
        let base = self.base_delay_ms;
        let max = self.max_delay_ms;
        let retry = u32::try_from(retry).unwrap_or(u32::MAX);

        let delay = match self.backoff_strategy {
            BackoffStrategy::Exponential => base.saturating_mul(2u64.saturating_pow(retry)),
            BackoffStrategy::Linear => base.saturating_mul(u64::from(retry) + 1),
            BackoffStrategy::Constant => base,
        };

        Duration::from_millis(delay.min(max))
    }
}

/// State tracking for one retried operation.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts made so far.
    pub attempts: usize,
}

impl RetryState {
    /// Creates a new retry state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no attempts remain.
    #[must_use]
    pub fn is_exhausted(&self, config: &RetryConfig) -> bool {
        self.attempts >= config.max_attempts
    }

    /// Calculates the jittered delay before the next attempt.
    #[must_use]
    pub fn calculate_delay(&self, config: &RetryConfig) -> Duration {
        let delay = config.base_delay_for(self.attempts.saturating_sub(1));
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);

        let jittered = match config.jitter_strategy {
            JitterStrategy::None => millis,
            JitterStrategy::Full => {
                if millis == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=millis)
                }
            }
            JitterStrategy::Equal => {
                let half = millis / 2;
                if half == 0 {
                    millis
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
            JitterStrategy::Additive => {
                let spread = millis / 10;
                if spread == 0 {
                    millis
                } else {
                    millis + rand::thread_rng().gen_range(0..=spread)
                }
            }
        };

        Duration::from_millis(jittered)
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

/// Decides what to do after a failed attempt.
#[must_use]
pub fn should_retry(state: &RetryState, config: &RetryConfig, retryable: bool) -> RetryDecision {
    if !retryable {
        return RetryDecision::NotRetryable;
    }
    if state.is_exhausted(config) {
        return RetryDecision::GiveUp;
    }
    RetryDecision::Retry(state.calculate_delay(config))
}

/// Result of [`retry_classified`]: the final result and how many attempts it took.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// Final result of the operation.
    pub result: Result<T, E>,
    /// Number of attempts made (at least 1).
    pub attempts: usize,
}

/// Executes an operation, retrying failures that `is_retryable` accepts.
///
/// The operation receives the 1-based attempt number.
pub async fn retry_classified<T, E, F, Fut, C>(
    config: &RetryConfig,
    operation_name: &str,
    is_retryable: C,
    mut operation: F,
) -> RetryOutcome<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let mut state = RetryState::new();

    loop {
        state.attempts += 1;
        let error = match operation(state.attempts).await {
            Ok(value) => {
                return RetryOutcome {
                    result: Ok(value),
                    attempts: state.attempts,
                }
            }
            Err(e) => e,
        };

        match should_retry(&state, config, is_retryable(&error)) {
            RetryDecision::Retry(delay) => {
                tracing::warn!(
                    operation = operation_name,
                    attempt = state.attempts,
                    max_attempts = config.max_attempts,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %error,
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
            }
            RetryDecision::GiveUp => {
                tracing::debug!(
                    operation = operation_name,
                    attempts = state.attempts,
                    error = %error,
                    "Retries exhausted"
                );
                return RetryOutcome {
                    result: Err(error),
                    attempts: state.attempts,
                };
            }
            RetryDecision::NotRetryable => {
                tracing::debug!(
                    operation = operation_name,
                    attempts = state.attempts,
                    error = %error,
                    "Error is not retryable"
                );
                return RetryOutcome {
                    result: Err(error),
                    attempts: state.attempts,
                };
            }
        }
    }
}
