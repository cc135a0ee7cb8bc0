//! Signature verification keyed by algorithm family.

use std::sync::Arc;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde_json::{Map, Value};

use crate::error::IdTokenError;
use crate::jwks::JwkCache;

/// Whether `algorithm` is an HMAC algorithm.
#[must_use]
pub const fn is_symmetric(algorithm: Algorithm) -> bool {
    matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}

/// Whether `algorithm` verifies against keys published in a JWKS.
#[must_use]
pub const fn is_asymmetric(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
            | Algorithm::ES256
            | Algorithm::ES384
    )
}

/// Source of verification keys, fixed when the validator is built.
pub enum SignatureVerifier {
    /// Shared client secret (HS family)
    Symmetric {
        /// Expected algorithm
        algorithm: Algorithm,
        /// Key derived from the secret
        key: DecodingKey,
    },
    /// Keys published by the domain (RS, PS and ES families)
    RemoteKeySet {
        /// Expected algorithm
        algorithm: Algorithm,
        /// Key-set cache
        keys: Arc<JwkCache>,
    },
}

impl SignatureVerifier {
    /// Verify HS-family signatures with `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`IdTokenError::UnsupportedAlgorithm`] for a non-HMAC algorithm.
    pub fn symmetric(algorithm: Algorithm, secret: &[u8]) -> Result<Self, IdTokenError> {
        if !is_symmetric(algorithm) {
            return Err(IdTokenError::UnsupportedAlgorithm { algorithm });
        }
        Ok(Self::Symmetric {
            algorithm,
            key: DecodingKey::from_secret(secret),
        })
    }

    /// Verify asymmetric signatures with keys from `keys`.
    ///
    /// # Errors
    ///
    /// Returns [`IdTokenError::UnsupportedAlgorithm`] for an algorithm that
    /// is not backed by a published key set.
    pub fn remote(algorithm: Algorithm, keys: Arc<JwkCache>) -> Result<Self, IdTokenError> {
        if !is_asymmetric(algorithm) {
            return Err(IdTokenError::UnsupportedAlgorithm { algorithm });
        }
        Ok(Self::RemoteKeySet { algorithm, keys })
    }

    /// Configured algorithm.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        match self {
            Self::Symmetric { algorithm, .. } | Self::RemoteKeySet { algorithm, .. } => *algorithm,
        }
    }

    /// Resolve the key for a token with the given header.
    pub(crate) async fn key_for(&self, kid: Option<&str>) -> Result<DecodingKey, IdTokenError> {
        match self {
            Self::Symmetric { key, .. } => Ok(key.clone()),
            Self::RemoteKeySet { keys, .. } => keys.get_key(kid).await,
        }
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Symmetric { algorithm, .. } => f
                .debug_struct("Symmetric")
                .field("algorithm", algorithm)
                .finish_non_exhaustive(),
            Self::RemoteKeySet { algorithm, keys } => f
                .debug_struct("RemoteKeySet")
                .field("algorithm", algorithm)
                .field("keys", keys)
                .finish(),
        }
    }
}

/// Check the signature of `raw` and return its payload.
///
/// Only the signature is checked here; every claim is left to the ordered
/// claim checks.
pub(crate) fn decode_payload(
    raw: &str,
    key: &DecodingKey,
    algorithm: Algorithm,
) -> Result<Map<String, Value>, IdTokenError> {
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Map<String, Value>>(raw, key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidSignature => IdTokenError::SignatureInvalid,
            _ => IdTokenError::malformed(format!("Signature validation failed: {e}")),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_algorithm_families() {
        assert!(is_symmetric(Algorithm::HS384));
        assert!(!is_symmetric(Algorithm::RS256));
        assert!(is_asymmetric(Algorithm::RS256));
        assert!(is_asymmetric(Algorithm::ES256));
        assert!(!is_asymmetric(Algorithm::EdDSA));
    }

    #[test]
    fn test_symmetric_rejects_rsa_algorithm() {
        let err = SignatureVerifier::symmetric(Algorithm::RS256, b"secret").unwrap_err();
        assert_eq!(
            err,
            IdTokenError::UnsupportedAlgorithm {
                algorithm: Algorithm::RS256
            }
        );
    }

    #[test]
    fn test_decode_payload_with_wrong_secret() {
        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::new(Algorithm::HS256),
            &serde_json::json!({"sub": "1"}),
            &jsonwebtoken::EncodingKey::from_secret(b"right"),
        )
        .unwrap();

        let payload = decode_payload(&token, &DecodingKey::from_secret(b"right"), Algorithm::HS256).unwrap();
        assert_eq!(payload["sub"], "1");

        let err = decode_payload(&token, &DecodingKey::from_secret(b"wrong"), Algorithm::HS256).unwrap_err();
        assert_eq!(err, IdTokenError::SignatureInvalid);
    }
}
