//! Mock implementations for testing.
//!
//! This module provides a scripted [`Transport`] and a [`Middleware`] that
//! journals every hook it sees.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use identity_runtime::header::{HeaderMap, HeaderName, HeaderValue};
use identity_runtime::{
    ApiError, ErrorContext, FetchParams, Middleware, RawResponse, RequestContext, RequestInit,
    ResponseContext, StatusCode, Transport, TransportError,
};
use serde_json::Value;

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum Step {
    /// Respond with a status and JSON body
    Respond(u16, Value),
    /// Fail the exchange with a connection error
    Fail(&'static str),
    /// Wait, then perform the inner step
    Delayed(Duration, Box<Step>),
}

impl Step {
    /// `200 OK` with a JSON body.
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self::Respond(200, body)
    }

    /// A status with an empty JSON object body.
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self::Respond(status, Value::Object(serde_json::Map::new()))
    }

    /// Delay this step.
    #[must_use]
    pub fn after(self, delay: Duration) -> Self {
        Self::Delayed(delay, Box::new(self))
    }
}

/// A request the transport received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Absolute URL
    pub url: String,
    /// Wire-level options
    pub init: RequestInit,
}

/// Transport that plays back a script, then repeats a fallback step.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
    completed: AtomicUsize,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedTransport {
    /// Play `script` in order, then `fallback` for every later call.
    #[must_use]
    pub fn new(script: impl IntoIterator<Item = Step>, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        })
    }

    /// Perform `step` on every call.
    #[must_use]
    pub fn always(step: Step) -> Arc<Self> {
        Self::new([], step)
    }

    /// Number of exchanges attempted so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of exchanges that ran to completion, delays included.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Requests received so far, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    fn next_step(&self) -> Step {
        self.script
            .lock()
            .expect("script lock")
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, url: &str, init: &RequestInit) -> Result<RawResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().expect("requests lock").push(RecordedRequest {
            url: url.to_string(),
            init: init.clone(),
        });

        let mut step = self.next_step();
        loop {
            match step {
                Step::Delayed(delay, next) => {
                    tokio::time::sleep(delay).await;
                    step = *next;
                }
                Step::Respond(status, body) => {
                    self.completed.fetch_add(1, Ordering::SeqCst);
                    let status = StatusCode::from_u16(status).expect("scripted status is valid");
                    return Ok(RawResponse::json(status, &body).expect("scripted body serializes"));
                }
                Step::Fail(reason) => {
                    self.completed.fetch_add(1, Ordering::SeqCst);
                    return Err(TransportError::connection(reason));
                }
            }
        }
    }
}

/// Shared, ordered log of middleware hook invocations.
pub type Journal = Arc<Mutex<Vec<String>>>;

/// Create an empty journal.
#[must_use]
pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// Read a journal's entries.
#[must_use]
pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().expect("journal lock").clone()
}

/// Middleware that journals `name:pre`, `name:post:<status>` and `name:error`.
#[derive(Debug)]
pub struct RecordingMiddleware {
    name: String,
    journal: Journal,
    header: Option<(HeaderName, HeaderValue)>,
    recover_with: Option<u16>,
    post_status: Option<u16>,
}

impl RecordingMiddleware {
    /// Create a middleware that only records.
    #[must_use]
    pub fn new(name: impl Into<String>, journal: &Journal) -> Self {
        Self {
            name: name.into(),
            journal: Arc::clone(journal),
            header: None,
            recover_with: None,
            post_status: None,
        }
    }

    /// Also set a header in the pre phase.
    #[must_use]
    pub fn with_header(mut self, name: &'static str, value: &'static str) -> Self {
        self.header = Some((HeaderName::from_static(name), HeaderValue::from_static(value)));
        self
    }

    /// Also recover failed exchanges with an empty response of `status`.
    #[must_use]
    pub const fn with_recovery(mut self, status: u16) -> Self {
        self.recover_with = Some(status);
        self
    }

    /// Also replace every response with an empty one of `status`.
    #[must_use]
    pub const fn with_post_status(mut self, status: u16) -> Self {
        self.post_status = Some(status);
        self
    }

    fn record(&self, event: String) {
        self.journal.lock().expect("journal lock").push(event);
    }
}

fn empty_response(status: u16) -> RawResponse {
    let status = StatusCode::from_u16(status).expect("status is valid");
    RawResponse::new(status, HeaderMap::new(), Vec::new())
}

#[async_trait]
impl Middleware for RecordingMiddleware {
    async fn pre(&self, context: RequestContext<'_>) -> Result<Option<FetchParams>, ApiError> {
        self.record(format!("{}:pre", self.name));
        Ok(self.header.as_ref().map(|(name, value)| {
            let mut init = context.init.clone();
            init.headers.insert(name.clone(), value.clone());
            FetchParams {
                url: context.url.to_string(),
                init,
            }
        }))
    }

    async fn post(&self, context: ResponseContext<'_>) -> Result<Option<RawResponse>, ApiError> {
        self.record(format!("{}:post:{}", self.name, context.response.status().as_u16()));
        Ok(self.post_status.map(empty_response))
    }

    async fn on_error(&self, _context: ErrorContext<'_>) -> Result<Option<RawResponse>, ApiError> {
        self.record(format!("{}:error", self.name));
        Ok(self.recover_with.map(empty_response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use identity_runtime::Method;

    fn init() -> RequestInit {
        RequestInit {
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn test_script_then_fallback() {
        let transport = ScriptedTransport::new([Step::status(503)], Step::ok(serde_json::json!({"ok": true})));

        let first = transport.send("https://a.example", &init()).await.unwrap();
        let second = transport.send("https://b.example", &init()).await.unwrap();
        let third = transport.send("https://c.example", &init()).await.unwrap();

        assert_eq!(first.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(second.status(), StatusCode::OK);
        assert_eq!(third.status(), StatusCode::OK);
        assert_eq!(transport.calls(), 3);
        assert_eq!(transport.requests()[1].url, "https://b.example");
    }

    #[tokio::test]
    async fn test_fail_step() {
        let transport = ScriptedTransport::always(Step::Fail("reset"));
        assert!(transport.send("https://a.example", &init()).await.is_err());
    }
}
