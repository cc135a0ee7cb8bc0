//! Backoff schedule and retry decisions for API calls.
//!
//! The policy looks at the outcome of each attempt (a transport error or a
//! response) and decides whether another attempt should be made and how long
//! to wait first. Every retry re-enters the full timeout-guarded exchange.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use reqwest::StatusCode;
use tracing::warn;

use crate::error::ApiError;
use crate::response::RawResponse;

/// Upper bound for `max_retries`, whatever the configuration says.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Backoff and retry budget.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Whether failed exchanges are retried at all
    pub enabled: bool,
    /// Maximum number of retries after the first attempt (capped at 10)
    pub max_retries: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Ceiling for any single delay
    pub max_delay: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Upper bound of the random delay added to each wait
    pub max_jitter: Duration,
    /// Response statuses that trigger a retry
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            max_jitter: Duration::from_millis(250),
            retry_on_status: vec![429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// Create a config with retries turned off.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Replace the retry budget.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Replace the first delay.
    #[must_use]
    pub const fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Replace the delay cap.
    #[must_use]
    pub const fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Use exact delays, without randomization.
    #[must_use]
    pub const fn without_jitter(mut self) -> Self {
        self.max_jitter = Duration::ZERO;
        self
    }

    /// Create a new retry config retrying on the given statuses.
    #[must_use]
    pub fn with_retry_on_status(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
        self.retry_on_status = statuses.into_iter().collect();
        self
    }

    /// Total number of attempts this configuration allows.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        if self.enabled {
            self.max_retries.min(MAX_RETRIES_LIMIT) + 1
        } else {
            1
        }
    }
}

/// Result of one attempt, as seen by the policy.
#[derive(Debug, Clone, Copy)]
pub enum Outcome<'a> {
    /// The exchange completed with a response
    Response(&'a RawResponse),
    /// The exchange failed
    Error(&'a ApiError),
}

/// Whether to try again, and after how long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    /// Retry the exchange
    pub retry: bool,
    /// Wait before the next attempt
    pub delay: Duration,
}

impl RetryDecision {
    const STOP: Self = Self {
        retry: false,
        delay: Duration::ZERO,
    };
}

/// Retry policy for executing exchanges with automatic retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    /// Policy driven by `config`.
    #[must_use]
    pub const fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Policy with [`RetryConfig::default`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Calculate the delay before retry number `attempt + 1`.
    ///
    /// Exponential in `attempt`, plus jitter, never above `max_delay`.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay.as_millis() as f64
            * self.config.multiplier.powi(attempt as i32);

        let jitter_ms = self.config.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(1..=jitter_ms)
        } else {
            0
        };

        let delay_ms = (base_delay + jitter as f64).min(self.config.max_delay.as_millis() as f64);
        Duration::from_millis(delay_ms as u64)
    }

    /// Check if a status code is configured as retryable.
    #[must_use]
    pub fn is_retryable_status(&self, status: StatusCode) -> bool {
        self.config.retry_on_status.contains(&status.as_u16())
    }

    /// Decide whether the attempt numbered `attempt` (zero-based) should be retried.
    #[must_use]
    pub fn should_retry(&self, attempt: u32, outcome: Outcome<'_>) -> RetryDecision {
        if attempt + 1 >= self.config.max_attempts() {
            return RetryDecision::STOP;
        }
        let retryable = match outcome {
            Outcome::Response(response) => self.is_retryable_status(response.status()),
            Outcome::Error(error) => error.is_retryable(),
        };
        if !retryable {
            return RetryDecision::STOP;
        }
        RetryDecision {
            retry: true,
            delay: self.delay_for_attempt(attempt),
        }
    }

    /// Execute an exchange with retries.
    ///
    /// The final outcome is returned as-is: the last response (whatever its
    /// status) or the last error.
    ///
    /// # Errors
    ///
    /// Returns the last error if every attempt failed.
    pub async fn execute<F, Fut>(&self, mut operation: F) -> Result<RawResponse, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RawResponse, ApiError>>,
    {
        let mut attempt = 0;
        loop {
            let result = operation().await;
            let decision = match &result {
                Ok(response) => self.should_retry(attempt, Outcome::Response(response)),
                Err(error) => self.should_retry(attempt, Outcome::Error(error)),
            };
            if !decision.retry {
                return result;
            }
            match &result {
                Ok(response) => warn!(
                    attempt = attempt + 1,
                    status = response.status().as_u16(),
                    delay_ms = decision.delay.as_millis() as u64,
                    "Retrying request after retryable status"
                ),
                Err(error) => warn!(
                    attempt = attempt + 1,
                    error = %error,
                    delay_ms = decision.delay.as_millis() as u64,
                    "Retrying request after failed exchange"
                ),
            }
            tokio::time::sleep(decision.delay).await;
            attempt += 1;
        }
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &RetryConfig {
        &self.config
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::with_defaults()
    }
}
