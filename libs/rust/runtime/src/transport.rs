//! Transport abstraction.
//!
//! A [`Transport`] performs exactly one HTTP exchange. The [`Fetcher`] pairs a
//! transport with the timeout guard; it is the handle middleware receives when
//! it needs to issue requests of its own.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ApiError, TransportError};
use crate::request::RequestInit;
use crate::response::RawResponse;
use crate::timeout::TimeoutGuard;

/// Performs a single HTTP exchange.
///
/// Implementations must be cancel-safe: the timeout guard drops the returned
/// future when the deadline elapses.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `init` to `url` and buffer the response.
    async fn send(&self, url: &str, init: &RequestInit) -> Result<RawResponse, TransportError>;
}

/// Timeout-guarded access to a transport.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    guard: TimeoutGuard,
}

impl Fetcher {
    /// Creates a new fetcher.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, guard: TimeoutGuard) -> Self {
        Self { transport, guard }
    }

    /// Perform one exchange under the timeout guard.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Timeout`] or [`ApiError::Transport`].
    pub async fn fetch(&self, url: &str, init: &RequestInit) -> Result<RawResponse, ApiError> {
        self.guard.guard(self.transport.send(url, init)).await
    }

    /// The timeout guard in use.
    #[must_use]
    pub const fn timeout(&self) -> TimeoutGuard {
        self.guard
    }
}

impl fmt::Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher")
            .field("timeout", &self.guard.duration())
            .finish_non_exhaustive()
    }
}
