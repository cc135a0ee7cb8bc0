//! ID token claim names and the typed claim set.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A claim checked during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Claim {
    /// `iss`
    Issuer,
    /// `sub`
    Subject,
    /// `aud`
    Audience,
    /// `org_id`
    Organization,
    /// `exp`
    Expiration,
    /// `iat`
    IssuedAt,
    /// `nonce`
    Nonce,
    /// `azp`
    AuthorizedParty,
    /// `auth_time`
    AuthTime,
}

impl Claim {
    /// Key of the claim in the token payload.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Issuer => "iss",
            Self::Subject => "sub",
            Self::Audience => "aud",
            Self::Organization => "org_id",
            Self::Expiration => "exp",
            Self::IssuedAt => "iat",
            Self::Nonce => "nonce",
            Self::AuthorizedParty => "azp",
            Self::AuthTime => "auth_time",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Issuer => "Issuer",
            Self::Subject => "Subject",
            Self::Audience => "Audience",
            Self::Organization => "Organization Id",
            Self::Expiration => "Expiration Time",
            Self::IssuedAt => "Issued At",
            Self::Nonce => "Nonce",
            Self::AuthorizedParty => "Authorized Party",
            Self::AuthTime => "Authentication Time",
        }
    }

    /// Condition under which a conditionally required claim is required.
    #[must_use]
    pub const fn condition(self) -> &'static str {
        match self {
            Self::AuthorizedParty => " when Audience (aud) claim has multiple values",
            Self::AuthTime => " when Max Age (max_age) is specified",
            _ => "",
        }
    }
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.key())
    }
}

/// Shape a claim must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// JSON string
    String,
    /// JSON number
    Number,
    /// JSON string or array of strings
    StringOrArray,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Number => "number",
            Self::StringOrArray => "string or array of strings",
        })
    }
}

/// The `aud` claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    /// A single audience
    One(String),
    /// Several audiences
    Many(Vec<String>),
}

impl Audience {
    /// Whether `client_id` is one of the audiences.
    #[must_use]
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Self::One(aud) => aud == client_id,
            Self::Many(auds) => auds.iter().any(|aud| aud == client_id),
        }
    }

    /// Audiences as a slice-backed iterator.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        let auds: &[String] = match self {
            Self::One(aud) => std::slice::from_ref(aud),
            Self::Many(auds) => auds,
        };
        auds.iter().map(String::as_str)
    }
}

/// Claims of a validated ID token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    /// Issuer
    pub iss: String,
    /// Subject
    pub sub: String,
    /// Audience
    pub aud: Audience,
    /// Expiration time (Unix seconds)
    #[serde(deserialize_with = "timestamp")]
    pub exp: i64,
    /// Issued-at time (Unix seconds)
    #[serde(deserialize_with = "timestamp")]
    pub iat: i64,
    /// Nonce echoed from the authorization request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    /// Authorized party
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azp: Option<String>,
    /// Organization id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,
    /// Time of the end-user authentication (Unix seconds)
    #[serde(default, deserialize_with = "optional_timestamp", skip_serializing_if = "Option::is_none")]
    pub auth_time: Option<i64>,
    /// Every other claim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IdTokenClaims {
    /// Build the typed claims from a checked payload.
    ///
    /// Optional claims whose value has an unexpected type are left untyped in
    /// [`extra`](Self::extra); only the always-checked claims must have their
    /// expected shape.
    ///
    /// # Errors
    ///
    /// Returns an error if `iss`, `sub`, `aud`, `exp` or `iat` is missing or
    /// mistyped.
    pub fn from_payload(mut payload: Map<String, Value>) -> Result<Self, serde_json::Error> {
        let mut untyped = Map::new();
        for key in OPTIONAL_CLAIMS {
            let mistyped = payload
                .get(key)
                .is_some_and(|value| !value.is_null() && !fits_optional(key, value));
            if mistyped {
                if let Some(value) = payload.remove(key) {
                    untyped.insert(key.to_string(), value);
                }
            }
        }

        let mut claims: Self = serde_json::from_value(Value::Object(payload))?;
        claims.extra.extend(untyped);
        Ok(claims)
    }

    /// Look up any claim by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

const OPTIONAL_CLAIMS: [&str; 4] = ["nonce", "azp", "org_id", "auth_time"];

fn fits_optional(key: &str, value: &Value) -> bool {
    if key == "auth_time" {
        number_as_seconds(value).is_some()
    } else {
        value.is_string()
    }
}

/// Read a JSON number as whole Unix seconds.
pub(crate) fn number_as_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(float_seconds)),
        _ => None,
    }
}

#[allow(clippy::cast_possible_truncation)]
fn float_seconds(value: f64) -> i64 {
    value.floor() as i64
}

fn timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    number_as_seconds(&value).ok_or_else(|| serde::de::Error::custom("expected a numeric timestamp"))
}

fn optional_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(value) => number_as_seconds(&value)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("expected a numeric timestamp")),
    }
}
