//! Per-attempt timeout enforcement.
//!
//! The guard races an exchange against a deadline. When the deadline wins,
//! the exchange future is dropped, which cancels the in-flight request, and a
//! distinct [`ApiError::Timeout`] is raised. The timer is dropped with the
//! guard's future on every path, so nothing fires after the call returns.

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use crate::error::{ApiError, TransportError};

/// Default deadline for a single exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Wraps a transport call with a deadline.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard {
    duration: Duration,
}

impl TimeoutGuard {
    /// Creates a new guard with the given duration
    #[must_use]
    pub const fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Creates a new guard from milliseconds
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// The configured deadline.
    #[must_use]
    pub const fn duration(&self) -> Duration {
        self.duration
    }

    /// Run `exchange`, failing with a timeout if it does not finish in time.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Timeout`] when the deadline elapses and
    /// [`ApiError::Transport`] when the exchange itself fails.
    pub async fn guard<F, T>(&self, exchange: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, TransportError>>,
    {
        match timeout(self.duration, exchange).await {
            Ok(result) => result.map_err(ApiError::from),
            Err(_) => {
                warn!(timeout_ms = self.duration.as_millis() as u64, "Exchange timed out");
                Err(ApiError::Timeout {
                    duration: self.duration,
                })
            }
        }
    }
}

impl Default for TimeoutGuard {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}
