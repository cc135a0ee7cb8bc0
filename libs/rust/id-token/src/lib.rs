//! ID token validation for identity-platform clients.
//!
//! Tokens are verified in two stages:
//! - Signature, with the client secret (HS256/384/512) or keys fetched from
//!   the domain's JWKS endpoint (RS, PS and ES families)
//! - Claims, checked in a fixed order with a clock tolerance for `exp` and
//!   `auth_time`
//!
//! The header algorithm must equal the configured one; a mismatch fails
//! before any key is resolved.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod claims;
pub mod error;
pub mod expectations;
pub mod jwks;
pub mod signature;
pub mod token;
pub mod validator;

pub use claims::{Audience, Claim, IdTokenClaims, Requirement};
pub use error::IdTokenError;
pub use expectations::{ClaimExpectations, DEFAULT_CLOCK_TOLERANCE};
pub use jwks::{
    DEFAULT_JWKS_CACHE_TTL, DEFAULT_JWKS_REFRESH_COOLDOWN, Jwk, JwkCache, JwkCacheConfig, Jwks,
};
pub use signature::SignatureVerifier;
pub use token::{SignatureVerified, Token, TokenState, Unverified, Validated};
pub use validator::{IdTokenValidator, IdTokenValidatorConfig, ValidationOptions};

/// Re-exported so callers can name algorithms without a direct dependency.
pub use jsonwebtoken::Algorithm;
