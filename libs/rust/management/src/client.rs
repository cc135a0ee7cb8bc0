//! Management API client wiring.
//!
//! Builds one [`RequestExecutor`] per client with telemetry and bearer-token
//! middleware and the management error parser installed. Managers share the
//! executor.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use identity_runtime::header::HeaderMap;
use identity_runtime::{
    BearerTokenMiddleware, ClientInfo, ConfigError, Configuration, DEFAULT_TIMEOUT, HttpConfig,
    Middleware, RequestExecutor, RetryConfig, StaticTokenProvider, TelemetryMiddleware,
    TokenProvider, Transport,
};
use tracing::debug;

use crate::error::ManagementErrorParser;
use crate::logs::LogsManager;

/// Client information reported by this crate.
#[must_use]
pub fn default_client_info() -> ClientInfo {
    let mut env = BTreeMap::new();
    env.insert("os".to_string(), std::env::consts::OS.to_string());
    env.insert("arch".to_string(), std::env::consts::ARCH.to_string());
    ClientInfo {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        env,
    }
}

/// Options for [`ManagementClient`].
#[derive(Clone)]
pub struct ManagementClientOptions {
    /// Tenant domain, e.g. `tenant.example.com`
    pub domain: String,
    /// Source of management API access tokens
    pub token_provider: Arc<dyn TokenProvider>,
    /// Overrides `https://{domain}/api/v2`
    pub base_url: Option<String>,
    /// Headers sent with every request
    pub headers: HeaderMap,
    /// Deadline for each exchange attempt (default: 10s)
    pub timeout: Duration,
    /// Retry settings
    pub retry: RetryConfig,
    /// Telemetry payload; `None` disables the telemetry header
    pub client_info: Option<ClientInfo>,
    /// Middleware appended after the built-in ones
    pub middleware: Vec<Arc<dyn Middleware>>,
    /// Custom transport
    pub transport: Option<Arc<dyn Transport>>,
    /// Settings for the default transport
    pub http: HttpConfig,
}

impl ManagementClientOptions {
    /// Create options for `domain` drawing tokens from `token_provider`.
    #[must_use]
    pub fn new(domain: impl Into<String>, token_provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            domain: domain.into(),
            token_provider,
            base_url: None,
            headers: HeaderMap::new(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            client_info: Some(default_client_info()),
            middleware: Vec::new(),
            transport: None,
            http: HttpConfig::default(),
        }
    }

    /// Create options for `domain` with a pre-obtained access token.
    #[must_use]
    pub fn with_token(domain: impl Into<String>, token: impl Into<String>) -> Self {
        Self::new(domain, Arc::new(StaticTokenProvider::new(token)))
    }

    /// Create new options with an explicit base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Create new options with default headers.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Create new options with a custom timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create new options with custom retry settings.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Create new options with a different telemetry payload.
    #[must_use]
    pub fn with_client_info(mut self, client_info: ClientInfo) -> Self {
        self.client_info = Some(client_info);
        self
    }

    /// Create new options without the telemetry header.
    #[must_use]
    pub fn without_telemetry(mut self) -> Self {
        self.client_info = None;
        self
    }

    /// Create new options with a middleware appended.
    #[must_use]
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Create new options with a custom transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Base URL requests are sent to.
    #[must_use]
    pub fn base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| {
            format!("https://{}/api/v2", self.domain.trim_end_matches('/'))
        })
    }

    /// Runtime configuration for these options.
    ///
    /// # Errors
    ///
    /// Returns an error when neither a domain nor a base URL is set, or when
    /// the resulting configuration is invalid.
    pub fn to_configuration(&self) -> Result<Configuration, ConfigError> {
        if self.base_url.is_none() && self.domain.trim().is_empty() {
            return Err(ConfigError::MissingRequired("domain".to_string()));
        }

        let mut config = Configuration::new(self.base_url())
            .with_headers(self.headers.clone())
            .with_timeout(self.timeout)
            .with_retry(self.retry.clone())
            .with_http(self.http.clone())
            .with_error_parser(Arc::new(ManagementErrorParser));

        if let Some(ref client_info) = self.client_info {
            config = config.with_middleware(Arc::new(TelemetryMiddleware::new(client_info.clone())));
        }
        config = config.with_middleware(Arc::new(BearerTokenMiddleware::new(Arc::clone(
            &self.token_provider,
        ))));
        for middleware in &self.middleware {
            config = config.with_middleware(Arc::clone(middleware));
        }
        if let Some(ref transport) = self.transport {
            config = config.with_transport(Arc::clone(transport));
        }

        config.validate()?;
        Ok(config)
    }
}

impl fmt::Debug for ManagementClientOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagementClientOptions")
            .field("domain", &self.domain)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("client_info", &self.client_info)
            .field("middleware", &self.middleware.len())
            .finish_non_exhaustive()
    }
}

/// Management API client.
#[derive(Debug, Clone)]
pub struct ManagementClient {
    executor: Arc<RequestExecutor>,
}

impl ManagementClient {
    /// Build a client from `options`.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid options or if the HTTP client cannot be built.
    pub fn new(options: ManagementClientOptions) -> Result<Self, ConfigError> {
        let config = options.to_configuration()?;
        let executor = RequestExecutor::new(config)?;
        debug!(base_url = %executor.base_url(), "Management client ready");

        Ok(Self {
            executor: Arc::new(executor),
        })
    }

    /// Underlying executor.
    #[must_use]
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Log event endpoints.
    #[must_use]
    pub fn logs(&self) -> LogsManager {
        LogsManager::new(Arc::clone(&self.executor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_from_domain() {
        let options = ManagementClientOptions::with_token("tenant.example.com", "token");
        assert_eq!(options.base_url(), "https://tenant.example.com/api/v2");

        let options = options.with_base_url("http://127.0.0.1:8080/api/v2");
        assert_eq!(options.base_url(), "http://127.0.0.1:8080/api/v2");
    }

    #[test]
    fn test_builtin_middleware_registered() {
        let options = ManagementClientOptions::with_token("tenant.example.com", "token");
        assert_eq!(options.to_configuration().unwrap().middleware.len(), 2);

        let options = options.without_telemetry();
        assert_eq!(options.to_configuration().unwrap().middleware.len(), 1);
    }

    #[test]
    fn test_empty_domain_rejected() {
        let options = ManagementClientOptions::with_token("", "token");
        assert!(matches!(
            ManagementClient::new(options),
            Err(ConfigError::MissingRequired(ref field)) if field == "domain"
        ));
    }

    #[test]
    fn test_default_client_info_names_this_crate() {
        let info = default_client_info();
        assert_eq!(info.name, "identity-management");
        assert!(info.env.contains_key("os"));
    }

    #[test]
    fn test_debug_hides_token_provider() {
        let options = ManagementClientOptions::with_token("tenant.example.com", "very-secret-token");
        assert!(!format!("{options:?}").contains("very-secret-token"));
    }
}
