//! Response types.
//!
//! [`RawResponse`] is what a transport hands back: status, headers and a fully
//! buffered body. It is cheap enough to clone for each middleware stage.
//! [`ApiResponse`] is the decoded envelope returned to callers; it can only be
//! built by this crate, and only from a 2xx response.

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// A completed HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl RawResponse {
    /// Create a response; the status text defaults to the canonical reason phrase.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        }
    }

    /// Override the status text.
    #[must_use]
    pub fn with_status_text(mut self, status_text: impl Into<String>) -> Self {
        self.status_text = status_text.into();
        self
    }

    /// Build a response with a JSON body and `content-type: application/json`.
    ///
    /// # Errors
    ///
    /// Returns an error if `body` cannot be serialized.
    pub fn json<T: serde::Serialize>(status: StatusCode, body: &T) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        Ok(Self::new(status, headers, serde_json::to_vec(body)?))
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase.
    #[must_use]
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw body bytes.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Whether the status is within 200-299.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid JSON for `T`.
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// A decoded successful response.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    data: T,
    status: StatusCode,
    status_text: String,
    headers: HeaderMap,
}

impl<T> ApiResponse<T> {
    fn from_parts(raw: RawResponse, data: T) -> Self {
        debug_assert!(raw.is_success());
        Self {
            data,
            status: raw.status,
            status_text: raw.status_text,
            headers: raw.headers,
        }
    }

    /// Decoded body.
    #[must_use]
    pub const fn data(&self) -> &T {
        &self.data
    }

    /// Consume the envelope, keeping the body.
    #[must_use]
    pub fn into_data(self) -> T {
        self.data
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase.
    #[must_use]
    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl<T: DeserializeOwned> ApiResponse<T> {
    pub(crate) fn from_json(raw: RawResponse) -> Result<Self, ApiError> {
        let data = raw.json_body()?;
        Ok(Self::from_parts(raw, data))
    }
}

impl ApiResponse<String> {
    pub(crate) fn from_text(raw: RawResponse) -> Self {
        let text = raw.text_lossy();
        Self::from_parts(raw, text)
    }
}

impl ApiResponse<Vec<u8>> {
    pub(crate) fn from_bytes(mut raw: RawResponse) -> Self {
        let body = std::mem::take(&mut raw.body);
        Self::from_parts(raw, body)
    }
}

impl ApiResponse<()> {
    pub(crate) fn from_void(raw: RawResponse) -> Self {
        Self::from_parts(raw, ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Log {
        id: String,
    }

    #[test]
    fn test_raw_response_status_text_defaults_to_reason() {
        let raw = RawResponse::new(StatusCode::TOO_MANY_REQUESTS, HeaderMap::new(), vec![]);
        assert_eq!(raw.status_text(), "Too Many Requests");
        assert!(!raw.is_success());

        let raw = raw.with_status_text("Slow down");
        assert_eq!(raw.status_text(), "Slow down");
    }

    #[test]
    fn test_json_envelope() {
        let raw = RawResponse::json(StatusCode::OK, &serde_json::json!({"id": "5"})).unwrap();
        let response = ApiResponse::<Log>::from_json(raw).unwrap();
        assert_eq!(response.data().id, "5");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "application/json");
    }

    #[test]
    fn test_json_envelope_rejects_bad_body() {
        let raw = RawResponse::new(StatusCode::OK, HeaderMap::new(), b"not json".to_vec());
        let result = ApiResponse::<Log>::from_json(raw);
        assert!(matches!(result, Err(ApiError::Serialization(_))));
    }

    #[test]
    fn test_text_bytes_and_void_envelopes() {
        let raw = RawResponse::new(StatusCode::OK, HeaderMap::new(), b"hello".to_vec());
        assert_eq!(ApiResponse::from_text(raw.clone()).into_data(), "hello");
        assert_eq!(ApiResponse::from_bytes(raw.clone()).into_data(), b"hello".to_vec());

        let raw = RawResponse::new(StatusCode::NO_CONTENT, HeaderMap::new(), vec![]);
        let response = ApiResponse::from_void(raw);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
