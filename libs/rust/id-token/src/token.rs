//! Type-state ID token.
//!
//! A token moves from [`Unverified`] to [`SignatureVerified`] to [`Validated`];
//! claims are only reachable on a `Token<Validated>`.

use jsonwebtoken::{Algorithm, Header, decode_header};
use serde_json::{Map, Value};

use crate::claims::IdTokenClaims;
use crate::error::IdTokenError;
use crate::expectations::ClaimExpectations;
use crate::signature::{SignatureVerifier, decode_payload};

// ----------------------------------------------------------------------------
// Validation stages
// ----------------------------------------------------------------------------

mod sealed {
    pub trait Stage {}
}

/// Validation stage of a [`Token`]; implemented only by this crate.
pub trait TokenState: sealed::Stage {
    /// Stage label used in logs.
    fn label() -> &'static str;
}

/// Parsed header only, nothing verified
#[derive(Debug)]
pub struct Unverified;
impl sealed::Stage for Unverified {}
impl TokenState for Unverified {
    fn label() -> &'static str {
        "Unverified"
    }
}

/// Signature verified, claims not yet checked
#[derive(Debug)]
pub struct SignatureVerified {
    payload: Map<String, Value>,
}
impl sealed::Stage for SignatureVerified {}
impl TokenState for SignatureVerified {
    fn label() -> &'static str {
        "SignatureVerified"
    }
}

/// Signature verified and every claim check passed
#[derive(Debug)]
pub struct Validated {
    claims: IdTokenClaims,
}
impl sealed::Stage for Validated {}
impl TokenState for Validated {
    fn label() -> &'static str {
        "Validated"
    }
}

// ----------------------------------------------------------------------------
// Token
// ----------------------------------------------------------------------------

/// ID token in validation state `S`.
#[derive(Debug)]
pub struct Token<S: TokenState> {
    raw: String,
    header: Header,
    state: S,
}

impl Token<Unverified> {
    /// Parse the header of a compact JWT.
    ///
    /// # Errors
    ///
    /// Returns [`IdTokenError::TokenMalformed`] if the token is not a
    /// three-part compact JWT with a decodable header.
    pub fn parse(raw: &str) -> Result<Self, IdTokenError> {
        if raw.split('.').count() != 3 {
            return Err(IdTokenError::malformed("ID token must have three parts"));
        }
        let header =
            decode_header(raw).map_err(|e| IdTokenError::malformed(format!("Invalid header: {e}")))?;

        Ok(Self {
            raw: raw.to_string(),
            header,
            state: Unverified,
        })
    }

    /// Key ID from the header.
    #[must_use]
    pub fn kid(&self) -> Option<&str> {
        self.header.kid.as_deref()
    }

    /// Algorithm from the header.
    #[must_use]
    pub const fn algorithm(&self) -> Algorithm {
        self.header.alg
    }

    /// Verify the header algorithm and the signature.
    ///
    /// # Errors
    ///
    /// Returns [`IdTokenError::AlgorithmMismatch`] before any key lookup when
    /// the header names a different algorithm, then any key or signature
    /// failure.
    pub async fn verify(self, verifier: &SignatureVerifier) -> Result<Token<SignatureVerified>, IdTokenError> {
        let expected = verifier.algorithm();
        if self.header.alg != expected {
            return Err(IdTokenError::AlgorithmMismatch {
                expected,
                found: self.header.alg,
            });
        }

        let key = verifier.key_for(self.kid()).await?;
        let payload = decode_payload(&self.raw, &key, expected)?;

        Ok(Token {
            raw: self.raw,
            header: self.header,
            state: SignatureVerified { payload },
        })
    }
}

impl Token<SignatureVerified> {
    /// Run the claim checks as of `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns the first failing claim check.
    pub fn validate_claims(
        self,
        expectations: &ClaimExpectations,
        now: i64,
    ) -> Result<Token<Validated>, IdTokenError> {
        expectations.check(&self.state.payload, now)?;
        let claims = IdTokenClaims::from_payload(self.state.payload)
            .map_err(|e| IdTokenError::malformed(format!("Invalid claim set: {e}")))?;

        Ok(Token {
            raw: self.raw,
            header: self.header,
            state: Validated { claims },
        })
    }

    /// Read-only view of the unchecked payload.
    #[must_use]
    pub const fn peek_payload(&self) -> &Map<String, Value> {
        &self.state.payload
    }
}

impl Token<Validated> {
    /// Checked claims.
    #[must_use]
    pub const fn claims(&self) -> &IdTokenClaims {
        &self.state.claims
    }

    /// Take the claims.
    #[must_use]
    pub fn into_claims(self) -> IdTokenClaims {
        self.state.claims
    }

    /// `sub` claim.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.state.claims.sub
    }

    /// `iss` claim.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.state.claims.iss
    }

    /// Compact serialization as received.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }
}

impl<S: TokenState> Token<S> {
    /// Label of the current stage.
    #[must_use]
    pub fn stage(&self) -> &'static str {
        S::label()
    }

    /// Decoded JOSE header
    #[must_use]
    pub const fn header(&self) -> &Header {
        &self.header
    }
}
