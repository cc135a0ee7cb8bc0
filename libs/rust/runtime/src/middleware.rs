//! Middleware chain.
//!
//! A middleware can rewrite the outgoing request (`pre`), rewrite a response
//! (`post`), or recover from a failed exchange (`on_error`). Each hook returns
//! `Ok(None)` to leave things as they are or `Ok(Some(_))` to substitute a
//! replacement for the rest of the chain. Hooks run sequentially in
//! registration order.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::header::{AUTHORIZATION, HeaderName, HeaderValue};
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;
use crate::request::{FetchParams, RequestInit};
use crate::response::RawResponse;
use crate::transport::Fetcher;

/// Header carrying base64url-encoded client information.
pub const CLIENT_TELEMETRY_HEADER: &str = "client-telemetry";

/// Context for the pre-request phase.
#[derive(Debug)]
pub struct RequestContext<'a> {
    /// Timeout-guarded transport handle
    pub fetch: &'a Fetcher,
    /// Current URL
    pub url: &'a str,
    /// Current request options
    pub init: &'a RequestInit,
}

/// Context for the post-response phase.
#[derive(Debug)]
pub struct ResponseContext<'a> {
    /// Timeout-guarded transport handle
    pub fetch: &'a Fetcher,
    /// URL that was requested
    pub url: &'a str,
    /// Options that were sent
    pub init: &'a RequestInit,
    /// Copy of the current response
    pub response: RawResponse,
}

/// Context for the error phase.
#[derive(Debug)]
pub struct ErrorContext<'a> {
    /// Timeout-guarded transport handle
    pub fetch: &'a Fetcher,
    /// URL that was requested
    pub url: &'a str,
    /// Options that were sent
    pub init: &'a RequestInit,
    /// The failure after retries were exhausted
    pub error: &'a ApiError,
    /// Copy of the recovery response supplied by an earlier hook, if any
    pub response: Option<RawResponse>,
}

/// Request lifecycle interceptor.
///
/// All hooks are optional; the defaults change nothing.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Rewrite the URL and options before the exchange.
    async fn pre(&self, _context: RequestContext<'_>) -> Result<Option<FetchParams>, ApiError> {
        Ok(None)
    }

    /// Rewrite a response before it reaches the caller.
    async fn post(&self, _context: ResponseContext<'_>) -> Result<Option<RawResponse>, ApiError> {
        Ok(None)
    }

    /// Supply a response in place of a failed exchange.
    async fn on_error(&self, _context: ErrorContext<'_>) -> Result<Option<RawResponse>, ApiError> {
        Ok(None)
    }
}

/// Ordered list of middleware.
#[derive(Clone, Default)]
pub struct MiddlewareChain {
    middleware: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Creates a chain from middleware in registration order.
    #[must_use]
    pub fn new(middleware: Vec<Arc<dyn Middleware>>) -> Self {
        Self { middleware }
    }

    /// Number of registered middleware.
    #[must_use]
    pub fn len(&self) -> usize {
        self.middleware.len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middleware.is_empty()
    }

    /// Run every `pre` hook; each sees the params produced by the previous one.
    ///
    /// # Errors
    ///
    /// Propagates the first hook failure.
    pub async fn run_pre(&self, fetch: &Fetcher, mut params: FetchParams) -> Result<FetchParams, ApiError> {
        for middleware in &self.middleware {
            let replacement = middleware
                .pre(RequestContext {
                    fetch,
                    url: &params.url,
                    init: &params.init,
                })
                .await?;
            if let Some(replacement) = replacement {
                params = replacement;
            }
        }
        Ok(params)
    }

    /// Run every `post` hook on a copy of the current response.
    ///
    /// # Errors
    ///
    /// Propagates the first hook failure.
    pub async fn run_post(
        &self,
        fetch: &Fetcher,
        params: &FetchParams,
        mut response: RawResponse,
    ) -> Result<RawResponse, ApiError> {
        for middleware in &self.middleware {
            let replacement = middleware
                .post(ResponseContext {
                    fetch,
                    url: &params.url,
                    init: &params.init,
                    response: response.clone(),
                })
                .await?;
            if let Some(replacement) = replacement {
                response = replacement;
            }
        }
        Ok(response)
    }

    /// Run every `on_error` hook; each sees the recovery supplied so far and
    /// the last supplied response wins.
    ///
    /// # Errors
    ///
    /// Propagates the first hook failure.
    pub async fn run_on_error(
        &self,
        fetch: &Fetcher,
        params: &FetchParams,
        error: &ApiError,
    ) -> Result<Option<RawResponse>, ApiError> {
        let mut response = None;
        for middleware in &self.middleware {
            let replacement = middleware
                .on_error(ErrorContext {
                    fetch,
                    url: &params.url,
                    init: &params.init,
                    error,
                    response: response.clone(),
                })
                .await?;
            if replacement.is_some() {
                debug!("Middleware supplied a recovery response");
                response = replacement;
            }
        }
        Ok(response)
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareChain")
            .field("len", &self.middleware.len())
            .finish()
    }
}

/// Client name, version and environment reported with every request.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client library name
    pub name: String,
    /// Client library version
    pub version: String,
    /// Runtime environment details
    pub env: BTreeMap<String, String>,
}

impl Default for ClientInfo {
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert("os".to_string(), std::env::consts::OS.to_string());
        env.insert("arch".to_string(), std::env::consts::ARCH.to_string());
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            env,
        }
    }
}

/// Adds the client telemetry header to every request.
#[derive(Debug, Clone, Default)]
pub struct TelemetryMiddleware {
    client_info: ClientInfo,
}

impl TelemetryMiddleware {
    /// Creates a telemetry middleware reporting `client_info`.
    #[must_use]
    pub const fn new(client_info: ClientInfo) -> Self {
        Self { client_info }
    }

    /// Encoded header value; `None` when the client name is empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the client info cannot be serialized.
    pub fn header_value(&self) -> Result<Option<HeaderValue>, ApiError> {
        if self.client_info.name.is_empty() {
            return Ok(None);
        }
        let json = serde_json::to_vec(&self.client_info)?;
        let encoded = URL_SAFE_NO_PAD.encode(json);
        HeaderValue::from_str(&encoded)
            .map(Some)
            .map_err(|e| ApiError::middleware(format!("telemetry header: {e}")))
    }
}

#[async_trait]
impl Middleware for TelemetryMiddleware {
    async fn pre(&self, context: RequestContext<'_>) -> Result<Option<FetchParams>, ApiError> {
        let Some(value) = self.header_value()? else {
            return Ok(None);
        };
        let mut init = context.init.clone();
        init.headers
            .insert(HeaderName::from_static(CLIENT_TELEMETRY_HEADER), value);
        Ok(Some(FetchParams {
            url: context.url.to_string(),
            init,
        }))
    }
}

/// Supplies access tokens for the bearer token middleware.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a currently valid access token.
    async fn access_token(&self) -> Result<String, ApiError>;
}

/// A fixed, pre-obtained access token.
#[derive(Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Creates a provider that always returns `token`.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticTokenProvider")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn access_token(&self) -> Result<String, ApiError> {
        Ok(self.token.clone())
    }
}

/// Adds `Authorization: Bearer <token>` to every request.
#[derive(Clone)]
pub struct BearerTokenMiddleware {
    provider: Arc<dyn TokenProvider>,
}

impl BearerTokenMiddleware {
    /// Creates a middleware drawing tokens from `provider`.
    #[must_use]
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self { provider }
    }
}

impl fmt::Debug for BearerTokenMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerTokenMiddleware").finish_non_exhaustive()
    }
}

#[async_trait]
impl Middleware for BearerTokenMiddleware {
    async fn pre(&self, context: RequestContext<'_>) -> Result<Option<FetchParams>, ApiError> {
        let token = self.provider.access_token().await?;
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| ApiError::middleware(format!("authorization header: {e}")))?;
        value.set_sensitive(true);

        let mut init = context.init.clone();
        init.headers.insert(AUTHORIZATION, value);
        Ok(Some(FetchParams {
            url: context.url.to_string(),
            init,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::timeout::TimeoutGuard;
    use crate::transport::Transport;
    use reqwest::header::HeaderMap;
    use reqwest::{Method, StatusCode};

    struct NeverTransport;

    #[async_trait]
    impl Transport for NeverTransport {
        async fn send(&self, _url: &str, _init: &RequestInit) -> Result<RawResponse, TransportError> {
            Err(TransportError::connection("unused"))
        }
    }

    struct RewriteUrl(&'static str);

    #[async_trait]
    impl Middleware for RewriteUrl {
        async fn pre(&self, context: RequestContext<'_>) -> Result<Option<FetchParams>, ApiError> {
            Ok(Some(FetchParams {
                url: format!("{}{}", context.url, self.0),
                init: context.init.clone(),
            }))
        }
    }

    struct Passive;

    #[async_trait]
    impl Middleware for Passive {}

    struct Recover(StatusCode);

    #[async_trait]
    impl Middleware for Recover {
        async fn on_error(&self, _context: ErrorContext<'_>) -> Result<Option<RawResponse>, ApiError> {
            Ok(Some(RawResponse::new(self.0, HeaderMap::new(), vec![])))
        }
    }

    #[derive(Default)]
    struct SeenRecovery(std::sync::Mutex<Vec<Option<StatusCode>>>);

    #[async_trait]
    impl Middleware for SeenRecovery {
        async fn on_error(&self, context: ErrorContext<'_>) -> Result<Option<RawResponse>, ApiError> {
            let status = context.response.as_ref().map(RawResponse::status);
            if let Ok(mut seen) = self.0.lock() {
                seen.push(status);
            }
            Ok(None)
        }
    }

    fn fetcher() -> Fetcher {
        Fetcher::new(Arc::new(NeverTransport), TimeoutGuard::default())
    }

    fn params() -> FetchParams {
        FetchParams {
            url: "https://tenant.example.com".to_string(),
            init: RequestInit {
                method: Method::GET,
                headers: HeaderMap::new(),
                body: None,
            },
        }
    }

    #[tokio::test]
    async fn test_pre_folds_in_registration_order() {
        let chain = MiddlewareChain::new(vec![
            Arc::new(RewriteUrl("/a")),
            Arc::new(Passive),
            Arc::new(RewriteUrl("/b")),
        ]);
        let params = chain.run_pre(&fetcher(), params()).await.unwrap();
        assert_eq!(params.url, "https://tenant.example.com/a/b");
    }

    #[tokio::test]
    async fn test_on_error_without_recovery_returns_none() {
        let chain = MiddlewareChain::new(vec![Arc::new(Passive)]);
        let error = ApiError::from(TransportError::connection("reset"));
        let recovered = chain.run_on_error(&fetcher(), &params(), &error).await.unwrap();
        assert!(recovered.is_none());
    }

    #[tokio::test]
    async fn test_on_error_later_recovery_wins() {
        let seen = Arc::new(SeenRecovery::default());
        let chain = MiddlewareChain::new(vec![
            seen.clone(),
            Arc::new(Recover(StatusCode::OK)),
            seen.clone(),
            Arc::new(Recover(StatusCode::ACCEPTED)),
            seen.clone(),
        ]);
        let error = ApiError::from(TransportError::connection("reset"));
        let recovered = chain.run_on_error(&fetcher(), &params(), &error).await.unwrap();

        assert_eq!(recovered.unwrap().status(), StatusCode::ACCEPTED);
        assert_eq!(
            *seen.0.lock().unwrap(),
            vec![None, Some(StatusCode::OK), Some(StatusCode::ACCEPTED)]
        );
    }

    #[tokio::test]
    async fn test_telemetry_header_is_base64url_json() {
        let chain = MiddlewareChain::new(vec![Arc::new(TelemetryMiddleware::default())]);
        let params = chain.run_pre(&fetcher(), params()).await.unwrap();

        let header = params.init.headers[CLIENT_TELEMETRY_HEADER].to_str().unwrap();
        let decoded = URL_SAFE_NO_PAD.decode(header).unwrap();
        let info: serde_json::Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(info["name"], env!("CARGO_PKG_NAME"));
        assert_eq!(info["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_telemetry_skipped_without_name() {
        let middleware = TelemetryMiddleware::new(ClientInfo {
            name: String::new(),
            version: "1".to_string(),
            env: BTreeMap::new(),
        });
        assert!(middleware.header_value().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bearer_token_header() {
        let chain = MiddlewareChain::new(vec![Arc::new(BearerTokenMiddleware::new(Arc::new(
            StaticTokenProvider::new("abc.def"),
        )))]);
        let params = chain.run_pre(&fetcher(), params()).await.unwrap();
        assert_eq!(params.init.headers[AUTHORIZATION], "Bearer abc.def");
        assert!(params.init.headers[AUTHORIZATION].is_sensitive());
    }

    #[test]
    fn test_static_token_debug_is_redacted() {
        let provider = StaticTokenProvider::new("secret-token");
        assert!(!format!("{provider:?}").contains("secret-token"));
    }
}
