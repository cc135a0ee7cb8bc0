//! Remote key-set cache with single-flight refresh.
//!
//! Implements a JWKS cache that:
//! - Serves lookups from an atomically swapped snapshot without locking
//! - Refreshes on expiry or on an unknown key id, at most once per cooldown
//! - Prevents thundering herd on refresh using the single-flight pattern

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use identity_runtime::{Fetcher, HttpConfig, Method, ReqwestTransport, RequestInit, TimeoutGuard};
use identity_runtime::header::{ACCEPT, HeaderMap, HeaderValue};
use jsonwebtoken::DecodingKey;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::error::IdTokenError;

/// Default lifetime of a fetched key set.
pub const DEFAULT_JWKS_CACHE_TTL: Duration = Duration::from_secs(600);

/// Default minimum interval between refreshes triggered by unknown key ids.
pub const DEFAULT_JWKS_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

/// Deadline for a single key-set fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON Web Key structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (RSA, EC)
    pub kty: String,
    /// Key ID
    #[serde(default)]
    pub kid: Option<String>,
    /// Key use (sig, enc)
    #[serde(rename = "use", default)]
    pub key_use: Option<String>,
    /// Algorithm
    #[serde(default)]
    pub alg: Option<String>,
    /// RSA modulus
    #[serde(default)]
    pub n: Option<String>,
    /// RSA exponent
    #[serde(default)]
    pub e: Option<String>,
    /// EC x coordinate
    #[serde(default)]
    pub x: Option<String>,
    /// EC y coordinate
    #[serde(default)]
    pub y: Option<String>,
    /// EC curve
    #[serde(default)]
    pub crv: Option<String>,
}

/// JSON Web Key Set structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    /// List of keys
    pub keys: Vec<Jwk>,
}

/// Usable keys from one fetch.
struct KeySet {
    by_kid: HashMap<String, DecodingKey>,
    unnamed: Vec<DecodingKey>,
    fetched_at: Instant,
}

impl KeySet {
    fn from_jwks(jwks: &Jwks) -> Self {
        let mut by_kid = HashMap::new();
        let mut unnamed = Vec::new();
        for jwk in &jwks.keys {
            let Some(key) = jwk_to_decoding_key(jwk) else {
                continue;
            };
            match jwk.kid {
                Some(ref kid) => {
                    by_kid.insert(kid.clone(), key);
                }
                None => unnamed.push(key),
            }
        }
        Self {
            by_kid,
            unnamed,
            fetched_at: Instant::now(),
        }
    }

    fn len(&self) -> usize {
        self.by_kid.len() + self.unnamed.len()
    }

    /// Resolve a key; a token without `kid` matches only a single-key set.
    fn find(&self, kid: Option<&str>) -> Option<DecodingKey> {
        match kid {
            Some(kid) => self.by_kid.get(kid).cloned(),
            None if self.len() == 1 => self
                .by_kid
                .values()
                .chain(self.unnamed.iter())
                .next()
                .cloned(),
            None => None,
        }
    }
}

/// Type alias for the inflight future.
type InflightFuture = Shared<BoxFuture<'static, Result<Arc<KeySet>, IdTokenError>>>;

/// JWKS cache settings.
#[derive(Debug, Clone)]
pub struct JwkCacheConfig {
    /// Key-set URL
    pub jwks_uri: String,
    /// Lifetime of a fetched key set (default: 600s)
    pub ttl: Duration,
    /// Minimum interval between refreshes for unknown key ids (default: 30s)
    pub refresh_cooldown: Duration,
    /// Settings for the HTTP client
    pub http: HttpConfig,
}

impl JwkCacheConfig {
    /// Create settings for `jwks_uri` with default timings.
    #[must_use]
    pub fn new(jwks_uri: impl Into<String>) -> Self {
        Self {
            jwks_uri: jwks_uri.into(),
            ttl: DEFAULT_JWKS_CACHE_TTL,
            refresh_cooldown: DEFAULT_JWKS_REFRESH_COOLDOWN,
            http: HttpConfig::default(),
        }
    }
}

/// JWK cache with lock-free reads and single-flight refresh.
pub struct JwkCache {
    jwks_uri: String,
    ttl: Duration,
    refresh_cooldown: Duration,
    fetcher: Fetcher,
    snapshot: Arc<ArcSwapOption<KeySet>>,
    inflight: Mutex<Option<InflightFuture>>,
}

impl JwkCache {
    /// Creates a new JWK cache. No request is made until a key is needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: JwkCacheConfig) -> Result<Self, IdTokenError> {
        let transport = ReqwestTransport::new(&config.http)
            .map_err(|e| IdTokenError::key_set(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            jwks_uri: config.jwks_uri,
            ttl: config.ttl,
            refresh_cooldown: config.refresh_cooldown,
            fetcher: Fetcher::new(Arc::new(transport), TimeoutGuard::new(FETCH_TIMEOUT)),
            snapshot: Arc::new(ArcSwapOption::empty()),
            inflight: Mutex::new(None),
        })
    }

    /// Key-set URL.
    #[must_use]
    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// Gets a decoding key by key ID, refreshing the key set when needed.
    ///
    /// # Errors
    ///
    /// Returns [`IdTokenError::KeyNotFound`] if no usable key matches, or
    /// [`IdTokenError::KeySet`] if the key set could not be fetched.
    #[instrument(skip(self))]
    pub async fn get_key(&self, kid: Option<&str>) -> Result<DecodingKey, IdTokenError> {
        let not_found = || IdTokenError::KeyNotFound {
            kid: kid.unwrap_or("(none)").to_string(),
        };

        if let Some(set) = self.snapshot.load_full() {
            let age = set.fetched_at.elapsed();
            if age < self.ttl {
                if let Some(key) = set.find(kid) {
                    return Ok(key);
                }
                if age < self.refresh_cooldown {
                    debug!("Unknown key id within refresh cooldown");
                    return Err(not_found());
                }
            }
        }

        let set = self.refresh_single_flight().await?;
        set.find(kid).ok_or_else(not_found)
    }

    /// Checks if the cached key set is missing or expired.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        self.snapshot
            .load_full()
            .is_none_or(|set| set.fetched_at.elapsed() >= self.ttl)
    }

    /// Number of usable keys in the current snapshot.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.snapshot.load_full().map_or(0, |set| set.len())
    }

    /// Discards the snapshot and fetches the key set again.
    ///
    /// # Errors
    ///
    /// Returns an error if the key set could not be fetched.
    pub async fn force_refresh(&self) -> Result<(), IdTokenError> {
        self.snapshot.store(None);
        self.refresh_single_flight().await.map(|_| ())
    }

    /// Refreshes the key set using the single-flight pattern.
    ///
    /// Only one HTTP request will be made even if multiple concurrent
    /// callers request a refresh simultaneously.
    async fn refresh_single_flight(&self) -> Result<Arc<KeySet>, IdTokenError> {
        let mut inflight_guard = self.inflight.lock().await;

        if let Some(fut) = inflight_guard.as_ref().filter(|fut| fut.peek().is_none()) {
            let fut = fut.clone();
            drop(inflight_guard);
            return fut.await;
        }

        let url = self.jwks_uri.clone();
        let fetcher = self.fetcher.clone();
        let snapshot = Arc::clone(&self.snapshot);

        let fut: BoxFuture<'static, Result<Arc<KeySet>, IdTokenError>> = Box::pin(async move {
            info!(url = %url, "Fetching JWKS");

            let jwks = fetch_jwks(&fetcher, &url).await?;
            let set = Arc::new(KeySet::from_jwks(&jwks));
            snapshot.store(Some(Arc::clone(&set)));

            info!(keys = set.len(), "JWKS cache updated");
            Ok(set)
        });

        let shared_fut = fut.shared();
        *inflight_guard = Some(shared_fut.clone());
        drop(inflight_guard);

        let result = shared_fut.await;
        self.inflight.lock().await.take();
        result
    }
}

impl std::fmt::Debug for JwkCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwkCache")
            .field("jwks_uri", &self.jwks_uri)
            .field("ttl", &self.ttl)
            .field("refresh_cooldown", &self.refresh_cooldown)
            .field("keys", &self.key_count())
            .finish_non_exhaustive()
    }
}

async fn fetch_jwks(fetcher: &Fetcher, url: &str) -> Result<Jwks, IdTokenError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    let init = RequestInit {
        method: Method::GET,
        headers,
        body: None,
    };

    let response = fetcher
        .fetch(url, &init)
        .await
        .map_err(|e| IdTokenError::key_set(format!("Failed to fetch JWKS: {e}")))?;

    if !response.is_success() {
        return Err(IdTokenError::key_set(format!(
            "JWKS fetch failed with status: {}",
            response.status()
        )));
    }

    response
        .json_body()
        .map_err(|e| IdTokenError::key_set(format!("Failed to parse JWKS: {e}")))
}

/// Converts a JWK to a `DecodingKey`, rejecting weak or non-signing keys.
fn jwk_to_decoding_key(jwk: &Jwk) -> Option<DecodingKey> {
    let kid = jwk.kid.as_deref().unwrap_or("(none)");
    if jwk.key_use.as_deref() == Some("enc") {
        debug!(kid = %kid, "Skipping encryption key");
        return None;
    }

    match jwk.kty.as_str() {
        "RSA" => {
            let n = jwk.n.as_ref()?;
            let e = jwk.e.as_ref()?;

            // 2048-bit modulus is 342 base64url characters
            if n.len() < 340 {
                warn!(kid = %kid, "RSA key too small, rejecting");
                return None;
            }

            DecodingKey::from_rsa_components(n, e).ok()
        }
        "EC" => {
            let x = jwk.x.as_ref()?;
            let y = jwk.y.as_ref()?;
            let crv = jwk.crv.as_deref().unwrap_or("P-256");

            if !matches!(crv, "P-256" | "P-384" | "P-521") {
                warn!(kid = %kid, crv = %crv, "Weak EC curve, rejecting");
                return None;
            }

            DecodingKey::from_ec_components(x, y).ok()
        }
        _ => {
            warn!(kty = %jwk.kty, "Unsupported key type");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODULUS: &str = "xMnv3ILtFYlhnSr9IYnnDZStzIoPwpwTeYiKyBTwwYKlA6EuoB2PWmk-HzQ9z2DYrEaRk5beVp3Yn2N9GOSFj9M06bugBj1ctIFOUHQAZdE6ciOmp6NSrfRALGeg8ZxnhevqOwNoMorTyXUFEEQDnINeB5Ty4jDxq4S8caIftpAP0mDU3GNmZfkaoHxP6PaoDXYy0A40Xqst7s8FJAv1_XULUbOJGaudTKkq9jKsyfnPhwmTVfdzR14yHWYqoDfz4Sf8THqBO2GJCNmRJzTJPIWSmnNx1z2CfCF2kVZa5tnTumMK9Y4hJ1iR2AyVIEGd9ZV4CPHOfxQ_dweS12socw";

    fn rsa(kid: Option<&str>, key_use: Option<&str>, n: &str) -> Jwk {
        Jwk {
            kty: "RSA".to_string(),
            kid: kid.map(str::to_string),
            key_use: key_use.map(str::to_string),
            alg: Some("RS256".to_string()),
            n: Some(n.to_string()),
            e: Some("AQAB".to_string()),
            x: None,
            y: None,
            crv: None,
        }
    }

    #[test]
    fn test_rsa_key_accepted() {
        assert!(jwk_to_decoding_key(&rsa(Some("a"), Some("sig"), MODULUS)).is_some());
    }

    #[test]
    fn test_small_rsa_key_rejected() {
        assert!(jwk_to_decoding_key(&rsa(Some("a"), None, &MODULUS[..200])).is_none());
    }

    #[test]
    fn test_encryption_key_skipped() {
        assert!(jwk_to_decoding_key(&rsa(Some("a"), Some("enc"), MODULUS)).is_none());
    }

    #[test]
    fn test_weak_curve_rejected() {
        let jwk = Jwk {
            kty: "EC".to_string(),
            kid: Some("ec".to_string()),
            key_use: None,
            alg: None,
            n: None,
            e: None,
            x: Some("AAAA".to_string()),
            y: Some("AAAA".to_string()),
            crv: Some("secp256k1".to_string()),
        };
        assert!(jwk_to_decoding_key(&jwk).is_none());
    }

    #[test]
    fn test_unsupported_key_type() {
        let mut jwk = rsa(Some("a"), None, MODULUS);
        jwk.kty = "oct".to_string();
        assert!(jwk_to_decoding_key(&jwk).is_none());
    }

    #[test]
    fn test_kidless_lookup_requires_single_key() {
        let single = KeySet::from_jwks(&Jwks {
            keys: vec![rsa(Some("a"), None, MODULUS)],
        });
        assert!(single.find(None).is_some());
        assert!(single.find(Some("a")).is_some());
        assert!(single.find(Some("b")).is_none());

        let double = KeySet::from_jwks(&Jwks {
            keys: vec![rsa(Some("a"), None, MODULUS), rsa(None, None, MODULUS)],
        });
        assert_eq!(double.len(), 2);
        assert!(double.find(None).is_none());
    }

    #[test]
    fn test_new_cache_is_stale() {
        let cache = JwkCache::new(JwkCacheConfig::new("https://tenant.example.com/.well-known/jwks.json")).unwrap();
        assert!(cache.is_stale());
        assert_eq!(cache.key_count(), 0);
    }
}
