//! Log event endpoints.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use identity_runtime::{
    ApiError, ApiResponse, InitOverride, Method, QueryParams, RequestDescription, RequestExecutor,
    validate_required_request_params,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A tenant log event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    /// Unique log event id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_id: Option<String>,
    /// When the event occurred
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    /// Event type code, e.g. `s` or `fp`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Event description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Connection name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<String>,
    /// Connection id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    /// Client id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Client name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    /// Originating IP address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// User id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// User name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// Event-specific details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Fields not modelled above
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One page of logs with totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogsPage {
    /// Index of the first returned log
    pub start: u64,
    /// Page size
    pub limit: u64,
    /// Number of logs returned
    pub length: u64,
    /// Total number of logs, when available
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// The logs
    pub logs: Vec<Log>,
}

/// Response of [`LogsManager::get_all`]: a bare list, or a page when totals
/// were requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListLogsResponse {
    /// Logs without totals
    Logs(Vec<Log>),
    /// Logs with totals
    Page(LogsPage),
}

impl ListLogsResponse {
    /// The returned logs, whatever the shape.
    #[must_use]
    pub fn logs(&self) -> &[Log] {
        match self {
            Self::Logs(logs) => logs,
            Self::Page(page) => &page.logs,
        }
    }
}

/// Parameters of [`LogsManager::get`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GetLogRequest {
    /// Log event id (required)
    pub id: Option<String>,
}

impl GetLogRequest {
    /// Request the log event `id`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }
}

/// Parameters of [`LogsManager::get_all`]; unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GetLogsRequest {
    /// Page index
    pub page: Option<u32>,
    /// Entries per page
    pub per_page: Option<u32>,
    /// Sort expression, e.g. `date:-1`
    pub sort: Option<String>,
    /// Comma-separated fields to include or exclude
    pub fields: Option<String>,
    /// Whether `fields` lists fields to include
    pub include_fields: Option<bool>,
    /// Whether to return a page with totals
    pub include_totals: Option<bool>,
    /// Log id to start from (checkpoint pagination)
    pub from: Option<String>,
    /// Number of entries to take (checkpoint pagination)
    pub take: Option<u32>,
    /// Search query
    pub q: Option<String>,
}

impl GetLogsRequest {
    fn query(&self) -> QueryParams {
        QueryParams::new()
            .with_opt("page", self.page)
            .with_opt("per_page", self.per_page)
            .with_opt("sort", self.sort.as_deref())
            .with_opt("fields", self.fields.as_deref())
            .with_opt("include_fields", self.include_fields)
            .with_opt("include_totals", self.include_totals)
            .with_opt("from", self.from.as_deref())
            .with_opt("take", self.take)
            .with_opt("q", self.q.as_deref())
    }
}

/// Log event endpoints.
#[derive(Debug, Clone)]
pub struct LogsManager {
    executor: Arc<RequestExecutor>,
}

impl LogsManager {
    pub(crate) const fn new(executor: Arc<RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Retrieve one log event.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::RequiredParameter`] without any network activity
    /// when `id` is missing, otherwise any execution error.
    pub async fn get(
        &self,
        request: &GetLogRequest,
        init_override: Option<&InitOverride>,
    ) -> Result<ApiResponse<Log>, ApiError> {
        validate_required_request_params(request, &["id"])?;
        let id = request
            .id
            .as_deref()
            .ok_or_else(|| ApiError::required_parameter("id"))?;

        let description = RequestDescription::new(Method::GET, "/logs/{id}").with_path_param("id", id);
        self.executor.execute_json(&description, init_override).await
    }

    /// Search log events.
    ///
    /// # Errors
    ///
    /// Returns any execution error.
    pub async fn get_all(
        &self,
        request: &GetLogsRequest,
        init_override: Option<&InitOverride>,
    ) -> Result<ApiResponse<ListLogsResponse>, ApiError> {
        let description = RequestDescription::new(Method::GET, "/logs").with_query(request.query());
        self.executor.execute_json(&description, init_override).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_query_fields_are_not_sent() {
        assert!(GetLogsRequest::default().query().is_empty());
    }

    #[test]
    fn test_query_encoding() {
        let request = GetLogsRequest {
            per_page: Some(50),
            include_totals: Some(true),
            q: Some("type:s AND user_id:\"auth0|1\"".to_string()),
            ..GetLogsRequest::default()
        };
        assert_eq!(
            request.query().to_query_string(),
            "per_page=50&include_totals=true&q=type%3As%20AND%20user_id%3A%22auth0%7C1%22"
        );
    }

    #[test]
    fn test_log_keeps_unmodelled_fields() {
        let log: Log = serde_json::from_value(serde_json::json!({
            "log_id": "90020230",
            "date": "2023-11-14T22:13:20.000Z",
            "type": "s",
            "hostname": "tenant.example.com",
        }))
        .unwrap();

        assert_eq!(log.log_id.as_deref(), Some("90020230"));
        assert_eq!(log.event_type.as_deref(), Some("s"));
        assert_eq!(log.extra["hostname"], "tenant.example.com");
    }

    #[test]
    fn test_list_response_shapes() {
        let bare: ListLogsResponse = serde_json::from_str(r#"[{"log_id":"1"}]"#).unwrap();
        assert!(matches!(bare, ListLogsResponse::Logs(_)));

        let page: ListLogsResponse =
            serde_json::from_str(r#"{"start":0,"limit":50,"length":1,"total":1,"logs":[{"log_id":"1"}]}"#)
                .unwrap();
        assert!(matches!(page, ListLogsResponse::Page(_)));
        assert_eq!(page.logs()[0].log_id.as_deref(), Some("1"));
    }
}
