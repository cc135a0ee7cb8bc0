//! Ordered claim checks.
//!
//! Checks run in a fixed order and stop at the first failure:
//! `iss`, `sub`, `aud`, `org_id`, `exp`, `iat`, `nonce`, `azp`, `auth_time`.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::claims::{Claim, Requirement, number_as_seconds};
use crate::error::IdTokenError;

/// Default leeway for time-based claims.
pub const DEFAULT_CLOCK_TOLERANCE: Duration = Duration::from_secs(60);

/// Values a signature-verified payload is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimExpectations {
    /// Expected `iss`, `https://{domain}/`
    pub issuer: String,
    /// Expected audience and authorized party
    pub client_id: String,
    /// Leeway applied to `exp` and `auth_time`
    pub clock_tolerance: Duration,
    /// Expected `nonce`
    pub nonce: Option<String>,
    /// Maximum time since the end-user authenticated
    pub max_age: Option<Duration>,
    /// Expected `org_id`
    pub organization: Option<String>,
}

impl ClaimExpectations {
    /// Create expectations with no optional checks.
    #[must_use]
    pub fn new(issuer: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            client_id: client_id.into(),
            clock_tolerance: DEFAULT_CLOCK_TOLERANCE,
            nonce: None,
            max_age: None,
            organization: None,
        }
    }

    /// Create expectations with a custom clock tolerance.
    #[must_use]
    pub const fn with_clock_tolerance(mut self, tolerance: Duration) -> Self {
        self.clock_tolerance = tolerance;
        self
    }

    /// Create expectations that require `nonce`.
    #[must_use]
    pub fn with_nonce(mut self, nonce: impl Into<String>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    /// Create expectations that bound `auth_time`.
    #[must_use]
    pub const fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Create expectations that require `org_id`.
    #[must_use]
    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    /// Run every check against `payload` as of `now` (Unix seconds).
    ///
    /// # Errors
    ///
    /// Returns the first failing check.
    pub fn check(&self, payload: &Map<String, Value>, now: i64) -> Result<(), IdTokenError> {
        let tolerance = seconds(self.clock_tolerance);

        let issuer = require_string(payload, Claim::Issuer)?;
        expect_equal(Claim::Issuer, &self.issuer, issuer)?;

        require_string(payload, Claim::Subject)?;

        let audiences = require_audience(payload)?;
        match audiences {
            Audiences::One(aud) => expect_equal(Claim::Audience, &self.client_id, aud)?,
            Audiences::Many(ref auds) => {
                if !auds.iter().any(|aud| *aud == self.client_id) {
                    return Err(IdTokenError::AudienceNotIncluded {
                        expected: self.client_id.clone(),
                        found: auds.iter().map(|aud| (*aud).to_string()).collect(),
                    });
                }
            }
        }

        if let Some(ref organization) = self.organization {
            let org_id = require_string(payload, Claim::Organization)?;
            expect_equal(Claim::Organization, organization, org_id)?;
        }

        let exp = require_number(payload, Claim::Expiration)?;
        let expires_at = exp.saturating_add(tolerance);
        if now > expires_at {
            return Err(IdTokenError::Expired { now, expires_at });
        }

        require_number(payload, Claim::IssuedAt)?;

        if let Some(ref nonce) = self.nonce {
            let found = require_string(payload, Claim::Nonce)?;
            expect_equal(Claim::Nonce, nonce, found)?;
        }

        if let Audiences::Many(ref auds) = audiences {
            if auds.len() > 1 {
                let azp = require_string(payload, Claim::AuthorizedParty)?;
                expect_equal(Claim::AuthorizedParty, &self.client_id, azp)?;
            }
        }

        if let Some(max_age) = self.max_age {
            let auth_time = require_number(payload, Claim::AuthTime)?;
            let valid_until = auth_time
                .saturating_add(seconds(max_age))
                .saturating_add(tolerance);
            if now > valid_until {
                return Err(IdTokenError::AuthTimeExceeded { now, valid_until });
            }
        }

        Ok(())
    }
}

enum Audiences<'a> {
    One(&'a str),
    Many(Vec<&'a str>),
}

fn seconds(duration: Duration) -> i64 {
    i64::try_from(duration.as_secs()).unwrap_or(i64::MAX)
}

fn require_string(payload: &Map<String, Value>, claim: Claim) -> Result<&str, IdTokenError> {
    payload
        .get(claim.key())
        .and_then(Value::as_str)
        .ok_or(IdTokenError::ClaimMissing {
            claim,
            requirement: Requirement::String,
        })
}

fn require_number(payload: &Map<String, Value>, claim: Claim) -> Result<i64, IdTokenError> {
    payload
        .get(claim.key())
        .and_then(number_as_seconds)
        .ok_or(IdTokenError::ClaimMissing {
            claim,
            requirement: Requirement::Number,
        })
}

fn require_audience(payload: &Map<String, Value>) -> Result<Audiences<'_>, IdTokenError> {
    let missing = IdTokenError::ClaimMissing {
        claim: Claim::Audience,
        requirement: Requirement::StringOrArray,
    };
    match payload.get(Claim::Audience.key()) {
        Some(Value::String(aud)) => Ok(Audiences::One(aud)),
        Some(Value::Array(values)) => values
            .iter()
            .map(Value::as_str)
            .collect::<Option<Vec<_>>>()
            .map(Audiences::Many)
            .ok_or(missing),
        _ => Err(missing),
    }
}

fn expect_equal(claim: Claim, expected: &str, found: &str) -> Result<(), IdTokenError> {
    if expected == found {
        Ok(())
    } else {
        Err(IdTokenError::ClaimMismatch {
            claim,
            expected: expected.to_string(),
            found: found.to_string(),
        })
    }
}
