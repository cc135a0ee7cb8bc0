//! Executor configuration with validation.
//!
//! A [`Configuration`] is owned by the executor and shared read-only by all
//! of its requests. Tunables can also be loaded from environment variables.

use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::HeaderMap;
use thiserror::Error;
use url::Url;

use crate::error::{DefaultErrorParser, ErrorParser};
use crate::http::HttpConfig;
use crate::middleware::Middleware;
use crate::retry::RetryConfig;
use crate::timeout::DEFAULT_TIMEOUT;
use crate::transport::Transport;

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Configuration errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Field holding the URL
        field: String,
        /// Parser message
        reason: String,
    },

    /// Invalid timeout value
    #[error("Invalid timeout: must be greater than 0")]
    InvalidTimeout,

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parser message
        reason: String,
    },

    /// The default HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Request executor configuration.
#[derive(Clone)]
pub struct Configuration {
    /// Base URL every request path is appended to (required)
    pub base_url: String,
    /// Headers sent with every request
    pub headers: HeaderMap,
    /// Deadline for each exchange attempt (default: 10s)
    pub timeout: Duration,
    /// Retry settings
    pub retry: RetryConfig,
    /// Middleware in registration order
    pub middleware: Vec<Arc<dyn Middleware>>,
    /// Transport; a reqwest transport built from `http` when unset
    pub transport: Option<Arc<dyn Transport>>,
    /// Settings for the default transport
    pub http: HttpConfig,
    /// Parser for non-2xx responses
    pub error_parser: Arc<dyn ErrorParser>,
}

impl Configuration {
    /// Create a configuration for `base_url` with defaults for everything else.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            headers: HeaderMap::new(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            middleware: Vec::new(),
            transport: None,
            http: HttpConfig::default(),
            error_parser: Arc::new(DefaultErrorParser),
        }
    }

    /// Loads tunables from environment variables with validation.
    ///
    /// Reads `IDENTITY_API_BASE_URL` (required), `IDENTITY_API_TIMEOUT_MS`,
    /// `IDENTITY_API_RETRY_ENABLED` and `IDENTITY_API_MAX_RETRIES`, after
    /// loading a `.env` file when one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is missing, unparsable or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is missing, unparsable or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup("IDENTITY_API_BASE_URL")
            .ok_or_else(|| ConfigError::MissingRequired("IDENTITY_API_BASE_URL".to_string()))?;
        let defaults = RetryConfig::default();
        let retry = RetryConfig {
            enabled: parse_var(&lookup, "IDENTITY_API_RETRY_ENABLED", defaults.enabled)?,
            max_retries: parse_var(&lookup, "IDENTITY_API_MAX_RETRIES", defaults.max_retries)?,
            ..defaults
        };

        let timeout_ms = parse_var(&lookup, "IDENTITY_API_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?;
        let config = Self::new(base_url)
            .with_timeout(Duration::from_millis(timeout_ms))
            .with_retry(retry);

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty or unparsable base URL or a zero timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::MissingRequired("base_url".to_string()));
        }
        Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidUrl {
            field: "base_url".to_string(),
            reason: e.to_string(),
        })?;
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    /// Create a new config with a default header.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Create a new config with custom timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create a new config with custom retry settings.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Create a new config with a middleware appended to the chain.
    #[must_use]
    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Create a new config with a custom transport.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Create a new config with custom settings for the default transport.
    #[must_use]
    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Create a new config with a custom error parser.
    #[must_use]
    pub fn with_error_parser(mut self, parser: Arc<dyn ErrorParser>) -> Self {
        self.error_parser = parser;
        self
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("base_url", &self.base_url)
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("middleware", &self.middleware.len())
            .field("custom_transport", &self.transport.is_some())
            .field("http", &self.http)
            .finish_non_exhaustive()
    }
}

/// Parse an environment variable with a default value.
fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    lookup(name).map_or(Ok(default), |val| {
        val.parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = Configuration::new("https://tenant.example.com/api/v2");
        assert_eq!(config.timeout, Duration::from_millis(10_000));
        assert!(config.retry.enabled);
        assert!(config.middleware.is_empty());
        assert!(config.transport.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_base_url() {
        let config = Configuration::new("  ");
        assert!(matches!(config.validate(), Err(ConfigError::MissingRequired(_))));
    }

    #[test]
    fn test_config_validation_invalid_base_url() {
        let config = Configuration::new("not a url");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUrl { .. })));
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let config = Configuration::new("https://tenant.example.com").with_timeout(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = Configuration::from_lookup(|name| {
            (name == "IDENTITY_API_BASE_URL").then(|| "https://tenant.example.com/api/v2".to_string())
        })
        .unwrap();

        assert_eq!(config.base_url, "https://tenant.example.com/api/v2");
        assert_eq!(config.timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert!(config.retry.enabled);
        assert_eq!(config.retry.max_retries, RetryConfig::default().max_retries);
    }

    #[test]
    fn test_from_lookup_reads_tunables() {
        let vars = HashMap::from([
            ("IDENTITY_API_BASE_URL", "https://tenant.example.com/api/v2"),
            ("IDENTITY_API_TIMEOUT_MS", "2500"),
            ("IDENTITY_API_RETRY_ENABLED", "false"),
            ("IDENTITY_API_MAX_RETRIES", "7"),
        ]);
        let config = Configuration::from_lookup(|name| vars.get(name).map(ToString::to_string)).unwrap();

        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert!(!config.retry.enabled);
        assert_eq!(config.retry.max_retries, 7);
    }

    #[test]
    fn test_from_lookup_rejects_non_numeric_timeout() {
        let vars = HashMap::from([
            ("IDENTITY_API_BASE_URL", "https://tenant.example.com/api/v2"),
            ("IDENTITY_API_TIMEOUT_MS", "ten seconds"),
        ]);
        let err = Configuration::from_lookup(|name| vars.get(name).map(ToString::to_string)).unwrap_err();

        assert!(matches!(err, ConfigError::ParseError { ref name, .. } if name == "IDENTITY_API_TIMEOUT_MS"));
    }

    #[test]
    fn test_from_lookup_requires_base_url() {
        let err = Configuration::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(ref name) if name == "IDENTITY_API_BASE_URL"));
    }

    #[test]
    fn test_from_lookup_rejects_zero_timeout() {
        let vars = HashMap::from([
            ("IDENTITY_API_BASE_URL", "https://tenant.example.com/api/v2"),
            ("IDENTITY_API_TIMEOUT_MS", "0"),
        ]);
        let err = Configuration::from_lookup(|name| vars.get(name).map(ToString::to_string)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTimeout));
    }

    #[test]
    fn test_debug_hides_trait_objects() {
        let config = Configuration::new("https://tenant.example.com");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("tenant.example.com"));
        assert!(rendered.contains("custom_transport: false"));
    }
}
