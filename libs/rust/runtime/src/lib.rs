//! Request-execution runtime shared by identity-platform API clients.
//!
//! This crate provides the pipeline every generated endpoint goes through:
//! - Error types with retryability classification
//! - Request descriptions (path, method, headers, query, body)
//! - Pluggable transports with a reqwest-backed default
//! - Per-attempt timeout enforcement with cancellation
//! - Retry policies with exponential backoff
//! - Middleware chains (pre-request, post-response, on-error)
//! - The request executor tying all of the above together
//! - Tracing subscriber setup

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod middleware;
pub mod params;
pub mod request;
pub mod response;
pub mod retry;
pub mod timeout;
pub mod tracing_config;
pub mod transport;

pub use config::{ConfigError, Configuration};
pub use error::{ApiError, DefaultErrorParser, ErrorParser, ResponseError, TransportError};
pub use executor::{InitOverride, InitOverrideContext, RequestExecutor};
pub use http::{HttpConfig, ReqwestTransport, build_http_client};
pub use middleware::{
    BearerTokenMiddleware, CLIENT_TELEMETRY_HEADER, ClientInfo, ErrorContext, Middleware,
    MiddlewareChain, RequestContext, ResponseContext, StaticTokenProvider, TelemetryMiddleware,
    TokenProvider,
};
pub use params::validate_required_request_params;
pub use request::{
    CollectionFormat, FetchParams, QueryParams, QueryValue, RequestBody, RequestDescription,
    RequestInit, RequestOptions, RequestOverrides,
};
pub use response::{ApiResponse, RawResponse};
pub use retry::{Outcome, RetryConfig, RetryDecision, RetryPolicy};
pub use timeout::{DEFAULT_TIMEOUT, TimeoutGuard};
pub use tracing_config::{TracingConfig, init_tracing};
pub use transport::{Fetcher, Transport};

/// Re-exported HTTP primitives used throughout the public API.
pub use reqwest::{Method, StatusCode, header};
