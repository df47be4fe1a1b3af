//! Helpers for reading upstream JSON payloads

use serde_json::{json, Value};

/// Parse the trailing numeric id of a resource URL (`.../episode/28` -> 28)
pub fn trailing_id(url: &str) -> Option<i64> {
    url.rsplit('/').next()?.parse().ok()
}

/// The `results` array of a list page, or an empty slice
pub fn results(page: &Value) -> &[Value] {
    page.get("results")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// `info.count` of a list page
pub fn result_count(page: &Value) -> u64 {
    page.get("info")
        .and_then(|info| info.get("count"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// Whether `info.next` points at another page
pub fn has_next(page: &Value) -> bool {
    page.get("info")
        .and_then(|info| info.get("next"))
        .and_then(Value::as_str)
        .is_some_and(|next| !next.is_empty())
}

/// Whether the payload is a list page carrying at least one result
pub fn has_results(page: &Value) -> bool {
    !results(page).is_empty()
}

/// Page shape returned when nothing could be fetched
pub fn empty_page() -> Value {
    json!({
        "results": [],
        "info": { "count": 0, "pages": 0, "next": null, "prev": null }
    })
}

/// A string field, or `default` when absent or not a string
pub fn str_field(payload: &Value, field: &str, default: &str) -> String {
    payload
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

/// `payload[field].url` when present and non-empty
pub fn nested_url<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload
        .get(field)
        .and_then(|v| v.get("url"))
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
}
