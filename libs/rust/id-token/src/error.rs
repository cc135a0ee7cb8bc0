//! ID token validation errors.
//!
//! Every failure names the check that rejected the token. Errors are `Clone`
//! so that a single key-set refresh can hand the same result to every waiter.

use jsonwebtoken::Algorithm;
use thiserror::Error;

use crate::claims::{Claim, Requirement};

/// Non-exhaustive error enum for forward compatibility
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdTokenError {
    /// The validator configuration is unusable
    #[error("Invalid ID token validator configuration: {reason}")]
    InvalidConfiguration {
        /// What is wrong
        reason: String,
    },

    /// The token is not a well-formed compact JWT
    #[error("ID token could not be decoded: {reason}")]
    TokenMalformed {
        /// Description of the malformation
        reason: String,
    },

    /// The token header names a different algorithm than the one configured
    #[error("Signature algorithm of \"{found:?}\" is not supported. Expected the ID token to be signed with \"{expected:?}\"")]
    AlgorithmMismatch {
        /// Configured algorithm
        expected: Algorithm,
        /// Algorithm in the token header
        found: Algorithm,
    },

    /// The configured algorithm cannot be used for ID tokens
    #[error("Signing algorithm {algorithm:?} is not supported for ID tokens")]
    UnsupportedAlgorithm {
        /// Configured algorithm
        algorithm: Algorithm,
    },

    /// A symmetric algorithm was configured without a client secret
    #[error("A client secret is required to verify {algorithm:?} signatures")]
    MissingSecret {
        /// Configured algorithm
        algorithm: Algorithm,
    },

    /// The signature does not verify
    #[error("Invalid ID token signature")]
    SignatureInvalid,

    /// No key in the remote key set matches the token
    #[error("No signing key found for key id {kid}")]
    KeyNotFound {
        /// Key id from the token header, or `(none)`
        kid: String,
    },

    /// The remote key set could not be fetched or parsed
    #[error("Signing keys could not be loaded: {reason}")]
    KeySet {
        /// Description of the failure
        reason: String,
    },

    /// A claim is absent or has the wrong type
    #[error("{claim} claim must be a {requirement} present in the ID token{}", .claim.condition())]
    ClaimMissing {
        /// Offending claim
        claim: Claim,
        /// Expected shape
        requirement: Requirement,
    },

    /// A claim has an unexpected value
    #[error("{claim} claim mismatch in the ID token; expected \"{expected}\", found \"{found}\"")]
    ClaimMismatch {
        /// Offending claim
        claim: Claim,
        /// Expected value
        expected: String,
        /// Value in the token
        found: String,
    },

    /// The audience array does not contain the client id
    #[error("Audience (aud) claim mismatch in the ID token; expected \"{expected}\" but was not one of \"{}\"", .found.join(", "))]
    AudienceNotIncluded {
        /// Client id
        expected: String,
        /// Audience entries in the token
        found: Vec<String>,
    },

    /// The token is past its expiration time plus tolerance
    #[error("Expiration Time (exp) claim error in the ID token; current time ({now}) is after expiration time ({expires_at})")]
    Expired {
        /// Evaluation time (Unix seconds)
        now: i64,
        /// Expiration time plus clock tolerance
        expires_at: i64,
    },

    /// The last authentication is older than the allowed max age
    #[error("Authentication Time (auth_time) claim in the ID token indicates that too much time has passed since the last end-user authentication. Current time ({now}) is after last auth at ({valid_until})")]
    AuthTimeExceeded {
        /// Evaluation time (Unix seconds)
        now: i64,
        /// `auth_time + max_age + tolerance`
        valid_until: i64,
    },
}

impl IdTokenError {
    /// Create a malformed-token error.
    #[must_use]
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::TokenMalformed {
            reason: reason.into(),
        }
    }

    /// Create a key-set error.
    #[must_use]
    pub fn key_set(reason: impl Into<String>) -> Self {
        Self::KeySet {
            reason: reason.into(),
        }
    }

    /// The claim this error is about, for claim-check failures.
    #[must_use]
    pub const fn claim(&self) -> Option<Claim> {
        match self {
            Self::ClaimMissing { claim, .. } | Self::ClaimMismatch { claim, .. } => Some(*claim),
            Self::AudienceNotIncluded { .. } => Some(Claim::Audience),
            Self::Expired { .. } => Some(Claim::Expiration),
            Self::AuthTimeExceeded { .. } => Some(Claim::AuthTime),
            _ => None,
        }
    }
}
