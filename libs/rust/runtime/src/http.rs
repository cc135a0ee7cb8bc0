//! Default reqwest-backed transport.
//!
//! One reqwest client per executor; the same builder serves the key-set
//! fetcher.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};

use crate::error::TransportError;
use crate::request::RequestInit;
use crate::response::RawResponse;
use crate::transport::Transport;

/// Connection settings for the default transport.
///
/// No client-wide request timeout is set; each attempt is bounded by the
/// [`TimeoutGuard`](crate::TimeoutGuard).
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// TCP and TLS connect deadline (10s)
    pub connect_timeout: Duration,
    /// How long an unused pooled connection is kept (90s)
    pub idle_timeout: Duration,
    /// Upper bound on pooled idle connections per host (10)
    pub max_idle_per_host: usize,
    /// `User-Agent` header value
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(90),
            max_idle_per_host: 10,
            user_agent: concat!("identity-runtime/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    /// Replace the connect deadline.
    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Replace the `User-Agent` value.
    #[must_use]
    pub fn with_user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    /// Tune connection reuse.
    #[must_use]
    pub const fn with_pool(mut self, idle_timeout: Duration, max_idle_per_host: usize) -> Self {
        self.idle_timeout = idle_timeout;
        self.max_idle_per_host = max_idle_per_host;
        self
    }
}

/// Construct the pooled rustls client used by [`ReqwestTransport`] and the
/// key-set fetcher.
///
/// # Errors
///
/// Fails when reqwest cannot set up the client, typically a TLS backend error.
///
/// # Examples
///
/// ```
/// use identity_runtime::{HttpConfig, build_http_client};
/// use std::time::Duration;
///
/// let settings = HttpConfig::default().with_connect_timeout(Duration::from_secs(5));
/// assert!(build_http_client(&settings).is_ok());
/// ```
pub fn build_http_client(settings: &HttpConfig) -> Result<Client, reqwest::Error> {
    ClientBuilder::new()
        .use_rustls_tls()
        .user_agent(settings.user_agent.as_str())
        .connect_timeout(settings.connect_timeout)
        .pool_idle_timeout(settings.idle_timeout)
        .pool_max_idle_per_host(settings.max_idle_per_host)
        .build()
}

/// [`Transport`] backed by a pooled reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Build a transport from the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying client cannot be built.
    pub fn new(config: &HttpConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::from_client(build_http_client(config)?))
    }

    /// Wrap an existing client.
    #[must_use]
    pub const fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, url: &str, init: &RequestInit) -> Result<RawResponse, TransportError> {
        let mut request = self
            .client
            .request(init.method.clone(), url)
            .headers(init.headers.clone());
        if let Some(ref body) = init.body {
            request = request.body(body.clone());
        }

        let response = request.send().await?;
        let (status, headers) = (response.status(), response.headers().clone());
        let bytes = response.bytes().await?;

        Ok(RawResponse::new(status, headers, bytes.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_identify_this_crate() {
        let settings = HttpConfig::default();
        assert_eq!(settings.connect_timeout, Duration::from_secs(10));
        assert_eq!(settings.idle_timeout, Duration::from_secs(90));
        assert_eq!(settings.max_idle_per_host, 10);
        assert!(settings.user_agent.starts_with("identity-runtime/"));
    }

    #[test]
    fn test_builders_replace_fields() {
        let settings = HttpConfig::default()
            .with_connect_timeout(Duration::from_secs(3))
            .with_pool(Duration::from_secs(30), 2)
            .with_user_agent("custom/1.0");

        assert_eq!(settings.connect_timeout, Duration::from_secs(3));
        assert_eq!(settings.idle_timeout, Duration::from_secs(30));
        assert_eq!(settings.max_idle_per_host, 2);
        assert_eq!(settings.user_agent, "custom/1.0");
    }

    #[test]
    fn test_transport_builds_from_defaults() {
        assert!(ReqwestTransport::new(&HttpConfig::default()).is_ok());
    }
}
