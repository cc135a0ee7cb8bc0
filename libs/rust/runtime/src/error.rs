//! Error types for request execution.
//!
//! Every failure surfaced by [`RequestExecutor`](crate::RequestExecutor) is an
//! [`ApiError`]. Errors are classified as retryable or not, which is what the
//! retry policy consults before attempting another exchange.

use std::fmt;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use thiserror::Error;

use crate::response::RawResponse;

/// Message used when an error response could not be interpreted further.
pub const GENERIC_RESPONSE_ERROR: &str = "Response returned an error code";

/// Failure of a single HTTP exchange, as reported by a [`Transport`](crate::Transport).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// The reqwest client failed (DNS, TLS, connection reset, body read).
    #[error("HTTP exchange failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A custom transport could not complete the exchange.
    #[error("Connection failed: {0}")]
    Connection(String),
}

impl TransportError {
    /// Create a connection error with the given message.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }
}

/// Common error type for API requests.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ApiError {
    /// A required request parameter was absent; raised before any network activity.
    #[error("Required parameter {field} was null or undefined")]
    RequiredParameter {
        /// Name of the first missing parameter
        field: String,
    },

    /// The per-attempt deadline elapsed.
    #[error("The request was timed out after {duration:?}")]
    Timeout {
        /// The configured deadline
        duration: Duration,
    },

    /// The exchange failed and no middleware supplied a substitute response.
    #[error("The request failed and the interceptors did not return an alternative response: {source}")]
    Transport {
        /// Underlying transport failure
        #[source]
        source: TransportError,
    },

    /// A non-2xx response, interpreted by the configured error parser.
    #[error(transparent)]
    Status(#[from] ResponseError),

    /// The request description could not be encoded.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A middleware hook failed.
    #[error("Middleware error: {0}")]
    Middleware(String),
}

impl ApiError {
    /// Check if this error is retryable.
    ///
    /// Only transport-level failures are: timeouts and failed exchanges.
    /// Status errors are judged by the retry policy on the raw status code,
    /// before they are ever turned into an `ApiError`.
    ///
    /// # Examples
    ///
    /// ```
    /// use identity_runtime::ApiError;
    /// use std::time::Duration;
    ///
    /// let err = ApiError::Timeout { duration: Duration::from_secs(10) };
    /// assert!(err.is_retryable());
    ///
    /// let err = ApiError::required_parameter("id");
    /// assert!(!err.is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Transport { .. })
    }

    /// Returns true if this error is a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// HTTP status of a parsed error response, if any.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Status(err) => Some(err.status),
            _ => None,
        }
    }

    /// Create a required parameter error for the given field.
    #[must_use]
    pub fn required_parameter(field: impl Into<String>) -> Self {
        Self::RequiredParameter {
            field: field.into(),
        }
    }

    /// Create an invalid request error with the given message.
    #[must_use]
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a middleware error with the given message.
    #[must_use]
    pub fn middleware(msg: impl Into<String>) -> Self {
        Self::Middleware(msg.into())
    }
}

impl From<TransportError> for ApiError {
    fn from(source: TransportError) -> Self {
        Self::Transport { source }
    }
}

/// A non-2xx response turned into an error.
#[derive(Debug, Clone)]
pub struct ResponseError {
    /// HTTP status code
    pub status: StatusCode,
    /// Reason phrase
    pub status_text: String,
    /// Response headers
    pub headers: HeaderMap,
    /// Raw body text
    pub body: String,
    /// Human-readable message
    pub message: String,
    /// Short error name reported by the server (e.g. `Bad Request`)
    pub error: Option<String>,
    /// Machine-readable error code reported by the server
    pub error_code: Option<String>,
}

impl ResponseError {
    /// Build the generic error for a response whose body could not be interpreted.
    #[must_use]
    pub fn generic(response: &RawResponse) -> Self {
        Self {
            status: response.status(),
            status_text: response.status_text().to_string(),
            headers: response.headers().clone(),
            body: response.text_lossy(),
            message: GENERIC_RESPONSE_ERROR.to_string(),
            error: None,
            error_code: None,
        }
    }
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (status {})", self.message, self.status.as_u16())?;
        if let Some(ref code) = self.error_code {
            write!(f, " [{code}]")?;
        }
        Ok(())
    }
}

impl std::error::Error for ResponseError {}

/// Turns a non-2xx response into a typed error.
///
/// Invoked by the executor only for responses outside 200-299.
pub trait ErrorParser: Send + Sync {
    /// Parse the raw response into an error.
    fn parse(&self, response: &RawResponse) -> ResponseError;
}

/// Error parser that reports every failure with the generic message.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorParser;

impl ErrorParser for DefaultErrorParser {
    fn parse(&self, response: &RawResponse) -> ResponseError {
        ResponseError::generic(response)
    }
}
