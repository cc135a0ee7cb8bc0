//! Required-parameter validation.
//!
//! Generated endpoints call this before building a request so that a missing
//! path or body parameter fails fast, without any network activity.

use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

/// Check that none of `required` is missing or null in `params`.
///
/// `params` is inspected through its serialized JSON form, so optional fields
/// that serialize to `null` or are skipped both count as missing.
///
/// # Errors
///
/// Returns [`ApiError::RequiredParameter`] naming the first missing key, or a
/// serialization error if `params` is not representable as JSON.
///
/// # Examples
///
/// ```
/// use identity_runtime::{ApiError, validate_required_request_params};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct GetLog { id: Option<String> }
///
/// let err = validate_required_request_params(&GetLog { id: None }, &["id"]).unwrap_err();
/// assert!(matches!(err, ApiError::RequiredParameter { ref field } if field == "id"));
/// ```
pub fn validate_required_request_params<T: Serialize + ?Sized>(
    params: &T,
    required: &[&str],
) -> Result<(), ApiError> {
    let value = serde_json::to_value(params)?;
    for field in required {
        let missing = match &value {
            Value::Object(map) => map.get(*field).is_none_or(Value::is_null),
            _ => true,
        };
        if missing {
            return Err(ApiError::required_parameter(*field));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Default)]
    struct UpdateUser {
        id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        connection: Option<String>,
        blocked: Option<bool>,
    }

    #[test]
    fn test_all_present() {
        let params = UpdateUser {
            id: Some("user-1".to_string()),
            connection: Some("db".to_string()),
            blocked: Some(false),
        };
        assert!(validate_required_request_params(&params, &["id", "connection", "blocked"]).is_ok());
    }

    #[test]
    fn test_first_missing_key_is_reported() {
        let params = UpdateUser {
            id: Some("user-1".to_string()),
            ..UpdateUser::default()
        };
        let err = validate_required_request_params(&params, &["id", "connection", "blocked"]).unwrap_err();
        assert!(matches!(err, ApiError::RequiredParameter { ref field } if field == "connection"));
    }

    #[test]
    fn test_null_counts_as_missing() {
        let params = serde_json::json!({"id": null});
        let err = validate_required_request_params(&params, &["id"]).unwrap_err();
        assert_eq!(err.to_string(), "Required parameter id was null or undefined");
    }

    #[test]
    fn test_falsy_values_are_present() {
        let params = serde_json::json!({"page": 0, "q": "", "include_totals": false});
        assert!(validate_required_request_params(&params, &["page", "q", "include_totals"]).is_ok());
    }

    #[test]
    fn test_nothing_required() {
        assert!(validate_required_request_params(&(), &[]).is_ok());
    }
}
