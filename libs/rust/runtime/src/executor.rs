//! Request executor.
//!
//! Drives a [`RequestDescription`] through header merging, option overrides,
//! the middleware chain, the timeout guard and the retry policy, then turns
//! non-2xx responses into typed errors.

use std::fmt;
use std::sync::Arc;

use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::config::{ConfigError, Configuration};
use crate::error::{ApiError, ErrorParser};
use crate::http::ReqwestTransport;
use crate::middleware::MiddlewareChain;
use crate::request::{FetchParams, RequestDescription, RequestOptions, RequestOverrides};
use crate::response::{ApiResponse, RawResponse};
use crate::retry::RetryPolicy;
use crate::timeout::TimeoutGuard;
use crate::transport::Fetcher;

/// What a dynamic override sees.
#[derive(Debug, Clone, Copy)]
pub struct InitOverrideContext<'a> {
    /// Fully built options, defaults and description already applied
    pub proposed: &'a RequestOptions,
    /// The description the options were built from
    pub description: &'a RequestDescription,
}

type OverrideFn = dyn Fn(InitOverrideContext<'_>) -> RequestOptions + Send + Sync;

/// Per-call adjustment of the request options.
#[derive(Clone)]
pub enum InitOverride {
    /// Fields that replace the proposed ones
    Static(RequestOverrides),
    /// Function returning the options to use
    Dynamic(Arc<OverrideFn>),
}

impl InitOverride {
    /// Wrap a function as a dynamic override.
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(InitOverrideContext<'_>) -> RequestOptions + Send + Sync + 'static,
    {
        Self::Dynamic(Arc::new(f))
    }

    fn apply(&self, proposed: RequestOptions, description: &RequestDescription) -> RequestOptions {
        match self {
            Self::Static(overrides) => overrides.apply(proposed),
            Self::Dynamic(f) => f(InitOverrideContext {
                proposed: &proposed,
                description,
            }),
        }
    }
}

impl From<RequestOverrides> for InitOverride {
    fn from(overrides: RequestOverrides) -> Self {
        Self::Static(overrides)
    }
}

impl fmt::Debug for InitOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(overrides) => f.debug_tuple("Static").field(overrides).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Executes request descriptions against a configured API.
///
/// The executor is immutable after construction and safe to share between
/// concurrent requests.
pub struct RequestExecutor {
    base_url: String,
    headers: HeaderMap,
    fetcher: Fetcher,
    retry: RetryPolicy,
    chain: MiddlewareChain,
    error_parser: Arc<dyn ErrorParser>,
}

impl RequestExecutor {
    /// Build an executor, creating the default transport when none is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the default HTTP
    /// client cannot be built.
    pub fn new(config: Configuration) -> Result<Self, ConfigError> {
        config.validate()?;

        let transport = match config.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&config.http)?),
        };

        Ok(Self {
            base_url: config.base_url,
            headers: config.headers,
            fetcher: Fetcher::new(transport, TimeoutGuard::new(config.timeout)),
            retry: RetryPolicy::new(config.retry),
            chain: MiddlewareChain::new(config.middleware),
            error_parser: config.error_parser,
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Timeout-guarded transport handle.
    #[must_use]
    pub const fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    /// Execute a request and return the raw 2xx response.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Timeout`] or [`ApiError::Transport`] when the
    /// exchange failed and no middleware recovered, [`ApiError::Status`] for a
    /// non-2xx final response, or any error raised while building the request
    /// or inside a middleware hook.
    #[instrument(
        name = "execute",
        skip_all,
        fields(
            method = %description.method(),
            path = description.path(),
            request_id = %Uuid::new_v4(),
        )
    )]
    pub async fn execute(
        &self,
        description: &RequestDescription,
        init_override: Option<&InitOverride>,
    ) -> Result<RawResponse, ApiError> {
        let proposed = RequestOptions {
            method: description.method().clone(),
            headers: description.merge_headers(&self.headers)?,
            body: description.body().cloned(),
        };
        let options = match init_override {
            Some(init_override) => init_override.apply(proposed, description),
            None => proposed,
        };

        let params = FetchParams {
            url: description.url(&self.base_url),
            init: options.into_init()?,
        };
        let params = self.chain.run_pre(&self.fetcher, params).await?;

        let fetcher = &self.fetcher;
        let exchange = &params;
        let response = match self
            .retry
            .execute(move || fetcher.fetch(&exchange.url, &exchange.init))
            .await
        {
            Ok(response) => response,
            Err(error) => match self.chain.run_on_error(&self.fetcher, &params, &error).await? {
                Some(response) => response,
                None => {
                    debug!(error = %error, "Request failed");
                    return Err(error);
                }
            },
        };

        let response = self.chain.run_post(&self.fetcher, &params, response).await?;

        if response.is_success() {
            debug!(status = response.status().as_u16(), "Request succeeded");
            Ok(response)
        } else {
            let error = self.error_parser.parse(&response);
            debug!(status = response.status().as_u16(), error = %error, "Request returned an error status");
            Err(ApiError::Status(error))
        }
    }

    /// Execute and decode a JSON body.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute); additionally fails if the body does not
    /// decode as `T`.
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        description: &RequestDescription,
        init_override: Option<&InitOverride>,
    ) -> Result<ApiResponse<T>, ApiError> {
        let raw = self.execute(description, init_override).await?;
        ApiResponse::from_json(raw)
    }

    /// Execute and return the body as text.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn execute_text(
        &self,
        description: &RequestDescription,
        init_override: Option<&InitOverride>,
    ) -> Result<ApiResponse<String>, ApiError> {
        let raw = self.execute(description, init_override).await?;
        Ok(ApiResponse::from_text(raw))
    }

    /// Execute and return the body as raw bytes.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn execute_bytes(
        &self,
        description: &RequestDescription,
        init_override: Option<&InitOverride>,
    ) -> Result<ApiResponse<Vec<u8>>, ApiError> {
        let raw = self.execute(description, init_override).await?;
        Ok(ApiResponse::from_bytes(raw))
    }

    /// Execute and discard the body.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn execute_void(
        &self,
        description: &RequestDescription,
        init_override: Option<&InitOverride>,
    ) -> Result<ApiResponse<()>, ApiError> {
        let raw = self.execute(description, init_override).await?;
        Ok(ApiResponse::from_void(raw))
    }
}

impl fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestExecutor")
            .field("base_url", &self.base_url)
            .field("fetcher", &self.fetcher)
            .field("retry", self.retry.config())
            .field("middleware", &self.chain)
            .finish_non_exhaustive()
    }
}
