//! Shared proptest generators.
//!
//! This module provides reusable strategies for request descriptions,
//! retry budgets and token audiences.

use proptest::prelude::*;

/// Generate URL paths such as `/logs/abc`.
pub fn path_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z0-9]{1,8}", 1..4).prop_map(|segments| format!("/{}", segments.join("/")))
}

/// Generate lowercase header names that are never standard headers.
pub fn header_name_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,12}".prop_map(|name| format!("x-{name}"))
}

/// Generate printable ASCII header values.
pub fn header_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ._-]{0,24}"
}

/// Generate a header list where `None` means "remove this key".
pub fn header_overrides_strategy() -> impl Strategy<Value = Vec<(String, Option<String>)>> {
    prop::collection::vec(
        (header_name_strategy(), prop::option::of(header_value_strategy())),
        0..6,
    )
}

/// Generate retry budgets within the supported range.
pub fn max_retries_strategy() -> impl Strategy<Value = u32> {
    0u32..=5
}

/// Generate audience entries that never equal `client-a`.
pub fn other_audiences_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-z]{3,10}".prop_map(|aud| format!("aud-{aud}")), 0..5)
}

/// Generate HTTP status codes outside the 2xx range.
pub fn error_status_strategy() -> impl Strategy<Value = u16> {
    prop_oneof![300u16..=308, 400u16..=451, 500u16..=511]
}

/// Generate 2xx HTTP status codes.
pub fn success_status_strategy() -> impl Strategy<Value = u16> {
    200u16..=206
}
