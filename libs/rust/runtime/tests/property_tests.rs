//! Property-based tests for the request-execution pipeline.
//!
//! Tests validate:
//! - Property 1: URLs without query parameters never end in `?`
//! - Property 2: Later header entries win and `None` removes the key
//! - Property 3: Retry attempts match the configured budget
//! - Property 4: Only non-2xx responses reach the error parser

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use identity_runtime::header::HeaderMap;
use identity_runtime::{
    Configuration, ErrorParser, Method, QueryParams, RawResponse, RequestDescription,
    RequestExecutor, ResponseError, RetryConfig,
};
use proptest::prelude::*;
use test_utils::mocks::{ScriptedTransport, Step};
use test_utils::{
    error_status_strategy, header_overrides_strategy, max_retries_strategy, path_strategy,
    success_status_strategy,
};

const BASE: &str = "https://tenant.example.com/api/v2";

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

#[derive(Default)]
struct CountingParser {
    calls: AtomicUsize,
}

impl ErrorParser for CountingParser {
    fn parse(&self, response: &RawResponse) -> ResponseError {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ResponseError::generic(response)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 1: URL Without Query Has No Question Mark
    #[test]
    fn prop_url_without_query_has_no_question_mark(path in path_strategy()) {
        let url = RequestDescription::new(Method::GET, path.clone()).url(BASE);
        prop_assert!(!url.contains('?'));
        prop_assert_eq!(url, format!("{BASE}{path}"));
    }

    /// Property 1b: Empty Query Builders Are Still Empty
    #[test]
    fn prop_absent_query_values_add_nothing(path in path_strategy(), key in "[a-z]{1,8}") {
        let query = QueryParams::new()
            .with_opt(key.clone(), None::<String>)
            .with_many(key, Vec::<String>::new(), identity_runtime::CollectionFormat::Csv);
        let url = RequestDescription::new(Method::GET, path).with_query(query).url(BASE);
        prop_assert!(!url.contains('?'));
    }

    /// Property 2: Header Merge Honours The Last Entry
    #[test]
    fn prop_header_merge_last_entry_wins(entries in header_overrides_strategy()) {
        let description = entries.iter().fold(
            RequestDescription::new(Method::GET, "/"),
            |description, (name, value)| description.with_optional_header(name.clone(), value.clone()),
        );
        let merged = description.merge_headers(&HeaderMap::new()).unwrap();

        for (name, _) in &entries {
            let last = entries.iter().rev().find(|(n, _)| n == name).and_then(|(_, v)| v.clone());
            match last {
                Some(value) => prop_assert_eq!(merged[name.as_str()].to_str().unwrap(), value.as_str()),
                None => prop_assert!(!merged.contains_key(name.as_str())),
            }
        }
    }

    /// Property 3: Persistent Failures Use Exactly The Attempt Budget
    #[test]
    fn prop_attempts_match_retry_budget(max_retries in max_retries_strategy(), enabled in any::<bool>()) {
        let transport = ScriptedTransport::always(Step::Fail("connection reset"));
        let mut retry = RetryConfig::default()
            .with_max_retries(max_retries)
            .with_initial_delay(Duration::from_millis(1))
            .without_jitter();
        retry.enabled = enabled;
        let config = Configuration::new(BASE)
            .with_transport(Arc::clone(&transport) as _)
            .with_retry(retry);
        let executor = RequestExecutor::new(config).unwrap();

        let result = paused_runtime().block_on(executor.execute(&RequestDescription::new(Method::GET, "/logs"), None));

        prop_assert!(result.is_err());
        let expected = if enabled { max_retries as usize + 1 } else { 1 };
        prop_assert_eq!(transport.calls(), expected);
    }

    /// Property 4: Error Parser Sees Only Non-2xx Responses
    #[test]
    fn prop_error_parser_only_for_non_success(
        success in success_status_strategy(),
        failure in error_status_strategy(),
    ) {
        for (status, expected_calls) in [(success, 0), (failure, 1)] {
            let parser = Arc::new(CountingParser::default());
            let transport = ScriptedTransport::always(Step::status(status));
            let config = Configuration::new(BASE)
                .with_transport(Arc::clone(&transport) as _)
                .with_error_parser(Arc::clone(&parser) as _)
                .with_retry(RetryConfig::disabled());
            let executor = RequestExecutor::new(config).unwrap();

            let result = paused_runtime().block_on(executor.execute(&RequestDescription::new(Method::GET, "/logs"), None));

            prop_assert_eq!(result.is_ok(), expected_calls == 0);
            prop_assert_eq!(parser.calls.load(Ordering::SeqCst), expected_calls);
        }
    }
}
