//! Management API error bodies.

use identity_runtime::{ErrorParser, RawResponse, ResponseError};
use serde::Deserialize;

/// Error body returned by the management API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementErrorBody {
    /// Echo of the HTTP status
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Short error name, e.g. `Bad Request`
    #[serde(default)]
    pub error: Option<String>,
    /// Human-readable description
    #[serde(default)]
    pub message: Option<String>,
    /// Machine-readable code, e.g. `inexistent_user`
    #[serde(default)]
    pub error_code: Option<String>,
}

/// Fills [`ResponseError`] from a management API error body.
///
/// Bodies that are not JSON objects produce the generic error.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManagementErrorParser;

impl ErrorParser for ManagementErrorParser {
    fn parse(&self, response: &RawResponse) -> ResponseError {
        let mut error = ResponseError::generic(response);
        let Ok(body) = serde_json::from_slice::<ManagementErrorBody>(response.body()) else {
            return error;
        };

        if let Some(message) = body.message.filter(|m| !m.is_empty()) {
            error.message = message;
        }
        error.error = body.error;
        error.error_code = body.error_code;
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use identity_runtime::StatusCode;
    use identity_runtime::header::HeaderMap;

    fn response(status: StatusCode, body: &str) -> RawResponse {
        RawResponse::new(status, HeaderMap::new(), body.as_bytes().to_vec())
    }

    #[test]
    fn test_json_body_fills_error() {
        let body = r#"{"statusCode":404,"error":"Not Found","message":"The user does not exist.","errorCode":"inexistent_user"}"#;
        let err = ManagementErrorParser.parse(&response(StatusCode::NOT_FOUND, body));

        assert_eq!(err.status, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "The user does not exist.");
        assert_eq!(err.error.as_deref(), Some("Not Found"));
        assert_eq!(err.error_code.as_deref(), Some("inexistent_user"));
        assert_eq!(err.body, body);
    }

    #[test]
    fn test_non_json_body_is_generic() {
        let err = ManagementErrorParser.parse(&response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"));
        let generic = ResponseError::generic(&response(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"));

        assert_eq!(err.message, generic.message);
        assert!(err.error.is_none());
        assert!(err.error_code.is_none());
        assert_eq!(err.body, "<html>bad gateway</html>");
    }

    #[test]
    fn test_missing_message_keeps_generic_message() {
        let err = ManagementErrorParser.parse(&response(StatusCode::TOO_MANY_REQUESTS, r#"{"error":"Too Many Requests"}"#));
        let generic = ResponseError::generic(&response(StatusCode::TOO_MANY_REQUESTS, ""));

        assert_eq!(err.message, generic.message);
        assert_eq!(err.error.as_deref(), Some("Too Many Requests"));
    }
}
