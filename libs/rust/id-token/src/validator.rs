//! ID token validator.
//!
//! Verifies the signature with the algorithm family chosen at construction
//! and then runs the ordered claim checks.

use std::sync::Arc;
use std::time::Duration;

use identity_runtime::HttpConfig;
use jsonwebtoken::Algorithm;
use tracing::{debug, instrument};
use url::Url;

use crate::claims::IdTokenClaims;
use crate::error::IdTokenError;
use crate::expectations::{ClaimExpectations, DEFAULT_CLOCK_TOLERANCE};
use crate::jwks::{DEFAULT_JWKS_CACHE_TTL, DEFAULT_JWKS_REFRESH_COOLDOWN, JwkCache, JwkCacheConfig};
use crate::signature::{SignatureVerifier, is_symmetric};
use crate::token::{Token, Validated};

/// Validator configuration.
#[derive(Clone)]
pub struct IdTokenValidatorConfig {
    /// Tenant domain, e.g. `tenant.example.com`
    pub domain: String,
    /// Client id the token must be issued to
    pub client_id: String,
    /// Client secret, required for HS-family algorithms
    pub client_secret: Option<String>,
    /// Expected signing algorithm (default: RS256)
    pub signing_algorithm: Algorithm,
    /// Leeway for time-based claims (default: 60s)
    pub clock_tolerance: Duration,
    /// Key-set URL; derived from the domain when unset
    pub jwks_uri: Option<String>,
    /// Lifetime of a fetched key set (default: 600s)
    pub jwks_cache_ttl: Duration,
    /// Minimum interval between refreshes for unknown key ids (default: 30s)
    pub jwks_refresh_cooldown: Duration,
    /// Settings for the key-set HTTP client
    pub http: HttpConfig,
}

impl IdTokenValidatorConfig {
    /// Create a configuration with defaults for everything but the tenant.
    #[must_use]
    pub fn new(domain: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            client_id: client_id.into(),
            client_secret: None,
            signing_algorithm: Algorithm::RS256,
            clock_tolerance: DEFAULT_CLOCK_TOLERANCE,
            jwks_uri: None,
            jwks_cache_ttl: DEFAULT_JWKS_CACHE_TTL,
            jwks_refresh_cooldown: DEFAULT_JWKS_REFRESH_COOLDOWN,
            http: HttpConfig::default(),
        }
    }

    /// Create a new config with a client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Create a new config with a different signing algorithm.
    #[must_use]
    pub const fn with_signing_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.signing_algorithm = algorithm;
        self
    }

    /// Create a new config with a custom clock tolerance.
    #[must_use]
    pub const fn with_clock_tolerance(mut self, tolerance: Duration) -> Self {
        self.clock_tolerance = tolerance;
        self
    }

    /// Create a new config with an explicit key-set URL.
    #[must_use]
    pub fn with_jwks_uri(mut self, uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(uri.into());
        self
    }

    /// Create a new config with custom key-set cache timings.
    #[must_use]
    pub const fn with_jwks_cache(mut self, ttl: Duration, refresh_cooldown: Duration) -> Self {
        self.jwks_cache_ttl = ttl;
        self.jwks_refresh_cooldown = refresh_cooldown;
        self
    }

    /// Create a new config with custom HTTP settings.
    #[must_use]
    pub fn with_http(mut self, http: HttpConfig) -> Self {
        self.http = http;
        self
    }

    /// Expected issuer, `https://{domain}/`.
    #[must_use]
    pub fn issuer(&self) -> String {
        format!("https://{}/", self.domain.trim_end_matches('/'))
    }

    /// Key-set URL: the override, or `https://{domain}/.well-known/jwks.json`.
    #[must_use]
    pub fn jwks_uri(&self) -> String {
        self.jwks_uri.clone().unwrap_or_else(|| {
            format!("https://{}/.well-known/jwks.json", self.domain.trim_end_matches('/'))
        })
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty domain or client id, or an unparsable
    /// key-set URL.
    pub fn validate(&self) -> Result<(), IdTokenError> {
        if self.domain.trim().is_empty() {
            return Err(IdTokenError::InvalidConfiguration {
                reason: "domain is required".to_string(),
            });
        }
        if self.client_id.trim().is_empty() {
            return Err(IdTokenError::InvalidConfiguration {
                reason: "client_id is required".to_string(),
            });
        }
        Url::parse(&self.jwks_uri()).map_err(|e| IdTokenError::InvalidConfiguration {
            reason: format!("invalid JWKS URI: {e}"),
        })?;
        Ok(())
    }
}

impl std::fmt::Debug for IdTokenValidatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdTokenValidatorConfig")
            .field("domain", &self.domain)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("signing_algorithm", &self.signing_algorithm)
            .field("clock_tolerance", &self.clock_tolerance)
            .field("jwks_uri", &self.jwks_uri)
            .finish_non_exhaustive()
    }
}

/// Per-call expectations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOptions {
    /// Nonce sent with the authorization request
    pub nonce: Option<String>,
    /// Maximum time since the end-user authenticated
    pub max_age: Option<Duration>,
    /// Organization the token must be issued for
    pub organization: Option<String>,
}

impl ValidationOptions {
    /// Require a nonce.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Bound the authentication time.
    #[must_use]
    pub const fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Require an organization.
    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }
}

/// Validates ID tokens for one client.
#[derive(Debug)]
pub struct IdTokenValidator {
    issuer: String,
    client_id: String,
    clock_tolerance: Duration,
    verifier: SignatureVerifier,
}

impl IdTokenValidator {
    /// Build a validator, choosing the key source from the algorithm.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid configuration, an HS-family algorithm
    /// without a client secret, or an unsupported algorithm.
    pub fn new(config: IdTokenValidatorConfig) -> Result<Self, IdTokenError> {
        config.validate()?;

        let algorithm = config.signing_algorithm;
        let verifier = if is_symmetric(algorithm) {
            let secret = config
                .client_secret
                .as_deref()
                .filter(|secret| !secret.is_empty())
                .ok_or(IdTokenError::MissingSecret { algorithm })?;
            SignatureVerifier::symmetric(algorithm, secret.as_bytes())?
        } else {
            let cache = JwkCache::new(JwkCacheConfig {
                jwks_uri: config.jwks_uri(),
                ttl: config.jwks_cache_ttl,
                refresh_cooldown: config.jwks_refresh_cooldown,
                http: config.http.clone(),
            })?;
            SignatureVerifier::remote(algorithm, Arc::new(cache))?
        };

        Ok(Self {
            issuer: config.issuer(),
            client_id: config.client_id,
            clock_tolerance: config.clock_tolerance,
            verifier,
        })
    }

    /// Expected issuer.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Signature verifier in use.
    #[must_use]
    pub const fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    /// Validate `token` against the wall clock.
    ///
    /// # Errors
    ///
    /// Returns the first failing signature or claim check.
    pub async fn validate(&self, token: &str, options: &ValidationOptions) -> Result<IdTokenClaims, IdTokenError> {
        self.validate_at(token, options, chrono::Utc::now().timestamp()).await
    }

    /// Validate `token` as of `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns the first failing signature or claim check.
    pub async fn validate_at(
        &self,
        token: &str,
        options: &ValidationOptions,
        now: i64,
    ) -> Result<IdTokenClaims, IdTokenError> {
        self.validate_token_at(token, options, now)
            .await
            .map(Token::into_claims)
    }

    /// Validate `token` as of `now`, keeping it in its validated state.
    ///
    /// # Errors
    ///
    /// Returns the first failing signature or claim check.
    #[instrument(skip_all, fields(algorithm = ?self.verifier.algorithm()))]
    pub async fn validate_token_at(
        &self,
        token: &str,
        options: &ValidationOptions,
        now: i64,
    ) -> Result<Token<Validated>, IdTokenError> {
        let expectations = self.expectations(options);

        let result: Result<Token<Validated>, IdTokenError> = async {
            let unverified = Token::parse(token)?;
            let verified = unverified.verify(&self.verifier).await?;
            verified.validate_claims(&expectations, now)
        }
        .await;

        if let Err(ref error) = result {
            debug!(claim = ?error.claim().map(|claim| claim.key()), error = %error, "ID token rejected");
        }
        result
    }

    fn expectations(&self, options: &ValidationOptions) -> ClaimExpectations {
        ClaimExpectations {
            issuer: self.issuer.clone(),
            client_id: self.client_id.clone(),
            clock_tolerance: self.clock_tolerance,
            nonce: options.nonce.clone(),
            max_age: options.max_age,
            organization: options.organization.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = IdTokenValidatorConfig::new("tenant.example.com", "client-a");
        assert_eq!(config.signing_algorithm, Algorithm::RS256);
        assert_eq!(config.clock_tolerance, Duration::from_secs(60));
        assert_eq!(config.issuer(), "https://tenant.example.com/");
        assert_eq!(config.jwks_uri(), "https://tenant.example.com/.well-known/jwks.json");
    }

    #[test]
    fn test_jwks_uri_override() {
        let config = IdTokenValidatorConfig::new("tenant.example.com", "client-a")
            .with_jwks_uri("http://127.0.0.1:9999/keys");
        assert_eq!(config.jwks_uri(), "http://127.0.0.1:9999/keys");
    }

    #[test]
    fn test_symmetric_requires_secret() {
        let config = IdTokenValidatorConfig::new("tenant.example.com", "client-a")
            .with_signing_algorithm(Algorithm::HS256);
        let err = IdTokenValidator::new(config).unwrap_err();
        assert_eq!(
            err,
            IdTokenError::MissingSecret {
                algorithm: Algorithm::HS256
            }
        );
    }

    #[test]
    fn test_unsupported_algorithm() {
        let config = IdTokenValidatorConfig::new("tenant.example.com", "client-a")
            .with_signing_algorithm(Algorithm::EdDSA);
        assert!(matches!(
            IdTokenValidator::new(config),
            Err(IdTokenError::UnsupportedAlgorithm { .. })
        ));
    }

    #[test]
    fn test_empty_domain_rejected() {
        let config = IdTokenValidatorConfig::new("", "client-a");
        assert!(matches!(
            IdTokenValidator::new(config),
            Err(IdTokenError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_secret_redacted_in_debug() {
        let config = IdTokenValidatorConfig::new("tenant.example.com", "client-a").with_client_secret("s3cr3t");
        assert!(!format!("{config:?}").contains("s3cr3t"));
    }
}
