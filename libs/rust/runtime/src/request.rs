//! Request descriptions and their wire-level forms.
//!
//! A generated endpoint describes what it wants with a [`RequestDescription`].
//! The executor turns it into [`RequestOptions`] (method, merged headers,
//! unserialized body), lets the caller override those, and finally produces
//! the [`FetchParams`] that middleware and transports see.

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;

use crate::error::ApiError;

/// How array-valued query parameters are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionFormat {
    /// `key=a,b`
    #[default]
    Csv,
    /// `key=a b`
    Ssv,
    /// `key=a\tb`
    Tsv,
    /// `key=a|b`
    Pipes,
    /// `key=a&key=b`
    Multi,
}

impl CollectionFormat {
    /// Separator used to join values, `None` for repeated keys.
    #[must_use]
    pub const fn separator(self) -> Option<&'static str> {
        match self {
            Self::Csv => Some(","),
            Self::Ssv => Some(" "),
            Self::Tsv => Some("\t"),
            Self::Pipes => Some("|"),
            Self::Multi => None,
        }
    }
}

/// A single query parameter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    /// Scalar value
    Single(String),
    /// Array value with its encoding
    Many(Vec<String>, CollectionFormat),
}

/// Ordered query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    params: Vec<(String, QueryValue)>,
}

impl QueryParams {
    /// Create an empty parameter list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a scalar parameter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.params
            .push((key.into(), QueryValue::Single(value.to_string())));
        self
    }

    /// Add a scalar parameter when present; absent values are not sent.
    #[must_use]
    pub fn with_opt<V: ToString>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }

    /// Add an array parameter; empty arrays are not sent.
    #[must_use]
    pub fn with_many<I, V>(mut self, key: impl Into<String>, values: I, format: CollectionFormat) -> Self
    where
        I: IntoIterator<Item = V>,
        V: ToString,
    {
        let values: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
        if !values.is_empty() {
            self.params.push((key.into(), QueryValue::Many(values, format)));
        }
        self
    }

    /// Whether no parameters are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Number of parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Encode as `a=1&b=2` with percent-encoded keys and values.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.params.len());
        for (key, value) in &self.params {
            let key = urlencoding::encode(key);
            match value {
                QueryValue::Single(v) => parts.push(format!("{key}={}", urlencoding::encode(v))),
                QueryValue::Many(values, format) => match format.separator() {
                    Some(sep) => {
                        let joined = values.join(sep);
                        parts.push(format!("{key}={}", urlencoding::encode(&joined)));
                    }
                    None => {
                        for v in values {
                            parts.push(format!("{key}={}", urlencoding::encode(v)));
                        }
                    }
                },
            }
        }
        parts.join("&")
    }
}

/// Request body before serialization.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized to JSON text
    Json(serde_json::Value),
    /// Sent as-is
    Binary(Vec<u8>),
    /// Sent as `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
}

impl RequestBody {
    /// Build a JSON body from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` cannot be represented as JSON.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ApiError> {
        Ok(Self::Json(serde_json::to_value(value)?))
    }

    const fn default_content_type(&self) -> &'static str {
        match self {
            Self::Json(_) => "application/json",
            Self::Binary(_) => "application/octet-stream",
            Self::Form(_) => "application/x-www-form-urlencoded",
        }
    }

    fn into_bytes(self) -> Result<Vec<u8>, ApiError> {
        match self {
            Self::Json(value) => Ok(serde_json::to_vec(&value)?),
            Self::Binary(bytes) => Ok(bytes),
            Self::Form(pairs) => Ok(url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs)
                .finish()
                .into_bytes()),
        }
    }
}

/// Everything a generated endpoint knows about a request.
///
/// Built with the consuming `with_*` methods; read-only afterwards.
#[derive(Debug, Clone)]
pub struct RequestDescription {
    method: Method,
    path: String,
    headers: Vec<(String, Option<String>)>,
    query: QueryParams,
    body: Option<RequestBody>,
}

impl RequestDescription {
    /// Describe a request to `path` (relative to the base URL).
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            query: QueryParams::default(),
            body: None,
        }
    }

    /// Replace the `{name}` placeholder in the path with the percent-encoded value.
    #[must_use]
    pub fn with_path_param(mut self, name: &str, value: impl AsRef<str>) -> Self {
        let placeholder = format!("{{{name}}}");
        self.path = self
            .path
            .replace(&placeholder, &urlencoding::encode(value.as_ref()));
        self
    }

    /// Set a header, overriding any default of the same name.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), Some(value.into())));
        self
    }

    /// Set a header when present; `None` removes any default of that name.
    #[must_use]
    pub fn with_optional_header(mut self, name: impl Into<String>, value: Option<String>) -> Self {
        self.headers.push((name.into(), value));
        self
    }

    /// Set the query parameters.
    #[must_use]
    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Path after placeholder interpolation.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters.
    #[must_use]
    pub const fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Per-request headers in the order they were set.
    #[must_use]
    pub fn headers(&self) -> &[(String, Option<String>)] {
        &self.headers
    }

    /// Body, if any.
    #[must_use]
    pub const fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Full URL: base URL, path, and a query string only when parameters exist.
    #[must_use]
    pub fn url(&self, base_url: &str) -> String {
        let mut url = format!("{base_url}{}", self.path);
        if !self.query.is_empty() {
            url.push('?');
            url.push_str(&self.query.to_query_string());
        }
        url
    }

    /// Merge `defaults` with the per-request headers.
    ///
    /// Later entries win; an entry without a value deletes the key.
    ///
    /// # Errors
    ///
    /// Returns an error if a header name or value is not valid HTTP.
    pub fn merge_headers(&self, defaults: &HeaderMap) -> Result<HeaderMap, ApiError> {
        let mut headers = defaults.clone();
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ApiError::invalid_request(format!("header name {name:?}: {e}")))?;
            match value {
                Some(value) => {
                    let value = HeaderValue::from_str(value).map_err(|e| {
                        ApiError::invalid_request(format!("header value for {name}: {e}"))
                    })?;
                    headers.insert(name, value);
                }
                None => {
                    headers.remove(&name);
                }
            }
        }
        Ok(headers)
    }
}

/// Proposed request options, before the body is serialized.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    /// HTTP method
    pub method: Method,
    /// Merged headers
    pub headers: HeaderMap,
    /// Unserialized body
    pub body: Option<RequestBody>,
}

impl RequestOptions {
    /// Serialize the body into wire-level options.
    ///
    /// A default content type matching the body kind is added when the
    /// headers do not already carry one.
    ///
    /// # Errors
    ///
    /// Returns an error if a JSON body cannot be serialized.
    pub fn into_init(self) -> Result<RequestInit, ApiError> {
        let mut headers = self.headers;
        let body = match self.body {
            Some(body) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static(body.default_content_type()),
                    );
                }
                Some(body.into_bytes()?)
            }
            None => None,
        };
        Ok(RequestInit {
            method: self.method,
            headers,
            body,
        })
    }
}

/// Static overrides applied on top of the proposed options.
///
/// Each field that is set replaces the proposed value wholesale.
#[derive(Debug, Clone, Default)]
pub struct RequestOverrides {
    /// Replacement method
    pub method: Option<Method>,
    /// Replacement headers
    pub headers: Option<HeaderMap>,
    /// Replacement body
    pub body: Option<RequestBody>,
}

impl RequestOverrides {
    /// Apply these overrides to `options`.
    #[must_use]
    pub fn apply(&self, mut options: RequestOptions) -> RequestOptions {
        if let Some(ref method) = self.method {
            options.method = method.clone();
        }
        if let Some(ref headers) = self.headers {
            options.headers = headers.clone();
        }
        if let Some(ref body) = self.body {
            options.body = Some(body.clone());
        }
        options
    }
}

/// Wire-level request options handed to middleware and transports.
#[derive(Debug, Clone)]
pub struct RequestInit {
    /// HTTP method
    pub method: Method,
    /// Headers to send
    pub headers: HeaderMap,
    /// Serialized body
    pub body: Option<Vec<u8>>,
}

/// URL plus wire-level options.
#[derive(Debug, Clone)]
pub struct FetchParams {
    /// Absolute URL
    pub url: String,
    /// Options
    pub init: RequestInit,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://tenant.example.com/api/v2";

    #[test]
    fn test_url_without_query_has_no_question_mark() {
        let description = RequestDescription::new(Method::GET, "/logs/5");
        assert_eq!(description.url(BASE), "https://tenant.example.com/api/v2/logs/5");
    }

    #[test]
    fn test_url_with_query() {
        let description = RequestDescription::new(Method::GET, "/logs")
            .with_query(QueryParams::new().with("page", 2).with("q", "type:s ok"));
        assert_eq!(
            description.url(BASE),
            "https://tenant.example.com/api/v2/logs?page=2&q=type%3As%20ok"
        );
    }

    #[test]
    fn test_absent_optional_values_are_skipped() {
        let query = QueryParams::new()
            .with_opt("page", None::<u32>)
            .with_many("fields", Vec::<String>::new(), CollectionFormat::Csv);
        assert!(query.is_empty());
        let description = RequestDescription::new(Method::GET, "/logs").with_query(query);
        assert!(!description.url(BASE).contains('?'));
    }

    #[test]
    fn test_collection_formats() {
        let values = ["a", "b"];
        let encode = |format| {
            QueryParams::new()
                .with_many("k", values, format)
                .to_query_string()
        };
        assert_eq!(encode(CollectionFormat::Csv), "k=a%2Cb");
        assert_eq!(encode(CollectionFormat::Ssv), "k=a%20b");
        assert_eq!(encode(CollectionFormat::Tsv), "k=a%09b");
        assert_eq!(encode(CollectionFormat::Pipes), "k=a%7Cb");
        assert_eq!(encode(CollectionFormat::Multi), "k=a&k=b");
    }

    #[test]
    fn test_path_params_are_encoded() {
        let description =
            RequestDescription::new(Method::GET, "/users/{id}/logs").with_path_param("id", "auth0|abc def");
        assert_eq!(description.path(), "/users/auth0%7Cabc%20def/logs");
    }

    #[test]
    fn test_merge_headers_override_and_prune() {
        let mut defaults = HeaderMap::new();
        defaults.insert("x-default", HeaderValue::from_static("1"));
        defaults.insert("x-removed", HeaderValue::from_static("1"));

        let description = RequestDescription::new(Method::GET, "/")
            .with_header("x-default", "2")
            .with_optional_header("x-removed", None)
            .with_optional_header("x-never-set", None)
            .with_header("x-extra", "3");

        let headers = description.merge_headers(&defaults).unwrap();
        assert_eq!(headers["x-default"], "2");
        assert_eq!(headers["x-extra"], "3");
        assert!(!headers.contains_key("x-removed"));
        assert!(!headers.contains_key("x-never-set"));
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_merge_headers_rejects_invalid_name() {
        let description = RequestDescription::new(Method::GET, "/").with_header("bad header", "x");
        let result = description.merge_headers(&HeaderMap::new());
        assert!(matches!(result, Err(ApiError::InvalidRequest(_))));
    }

    #[test]
    fn test_json_body_serialized_with_content_type() {
        let options = RequestOptions {
            method: Method::POST,
            headers: HeaderMap::new(),
            body: Some(RequestBody::Json(serde_json::json!({"name": "x"}))),
        };
        let init = options.into_init().unwrap();
        assert_eq!(init.body.unwrap(), br#"{"name":"x"}"#.to_vec());
        assert_eq!(init.headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_binary_and_form_bodies_pass_through() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
        let init = RequestOptions {
            method: Method::PUT,
            headers,
            body: Some(RequestBody::Binary(vec![0, 159, 146, 150])),
        }
        .into_init()
        .unwrap();
        assert_eq!(init.body.unwrap(), vec![0, 159, 146, 150]);
        assert_eq!(init.headers[CONTENT_TYPE], "image/png");

        let init = RequestOptions {
            method: Method::POST,
            headers: HeaderMap::new(),
            body: Some(RequestBody::Form(vec![
                ("grant_type".to_string(), "client_credentials".to_string()),
                ("audience".to_string(), "https://api/".to_string()),
            ])),
        }
        .into_init()
        .unwrap();
        assert_eq!(
            String::from_utf8(init.body.unwrap()).unwrap(),
            "grant_type=client_credentials&audience=https%3A%2F%2Fapi%2F"
        );
        assert_eq!(init.headers[CONTENT_TYPE], "application/x-www-form-urlencoded");
    }

    #[test]
    fn test_overrides_replace_only_set_fields() {
        let options = RequestOptions {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        };
        let overrides = RequestOverrides {
            method: Some(Method::DELETE),
            ..RequestOverrides::default()
        };
        let options = overrides.apply(options);
        assert_eq!(options.method, Method::DELETE);
        assert!(options.body.is_none());
    }
}
