//! Wire contract of the changelog endpoint: request shape and response decoding.

use changelog_core::{ChangelogEntry, FeedbackRef, WidgetError, GENERIC_FETCH_ERROR};
use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;

pub const CHANGELOG_PATH: &str = "/api/v1/feedback/changelog";

/// Full endpoint URL, with `limit` only when one is requested.
pub fn changelog_url(api_base: &str, limit: Option<u32>) -> String {
    let base = api_base.trim().trim_end_matches('/');
    match limit {
        Some(limit) => format!("{base}{CHANGELOG_PATH}?limit={limit}"),
        None => format!("{base}{CHANGELOG_PATH}"),
    }
}

/// `Authorization` header value for a board's public key.
pub fn bearer_header(public_key: &str) -> String {
    format!("Bearer {public_key}")
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Extracts `error` from a `{ "error": "..." }` body.
pub fn error_message_from_body(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|parsed| parsed.error)
        .filter(|message| !message.trim().is_empty())
}

/// Turns an HTTP status and raw body into entries or a typed failure.
pub fn decode_response(status: u16, body: &str) -> Result<Vec<ChangelogEntry>, WidgetError> {
    if !(200..=299).contains(&status) {
        let message =
            error_message_from_body(body).unwrap_or_else(|| GENERIC_FETCH_ERROR.to_string());
        log::warn!("changelog request failed with status {status}: {message}");
        return Err(WidgetError::FetchFailed(message));
    }

    let value: Value = serde_json::from_str(body)
        .map_err(|err| WidgetError::MalformedResponse(format!("invalid JSON: {err}")))?;
    entries_from_value(&value)
}

/// Validates the response array. Only `id` and `title` are mandatory; unknown
/// fields are ignored and mistyped optional fields read as absent.
pub fn entries_from_value(value: &Value) -> Result<Vec<ChangelogEntry>, WidgetError> {
    let items = value
        .as_array()
        .ok_or_else(|| WidgetError::MalformedResponse("expected a JSON array".into()))?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| entry_from_value(index, item))
        .collect()
}

fn entry_from_value(index: usize, item: &Value) -> Result<ChangelogEntry, WidgetError> {
    let id = required_str(item, "id")
        .ok_or_else(|| WidgetError::MalformedResponse(format!("entry {index} has no string id")))?;
    let title = required_str(item, "title").ok_or_else(|| {
        WidgetError::MalformedResponse(format!("entry {index} has no string title"))
    })?;

    Ok(ChangelogEntry {
        id,
        title,
        description: optional_str(item, "description"),
        version: optional_str(item, "version"),
        published_at: item.get("publishedAt").and_then(parse_timestamp),
        feedback: item
            .get("feedback")
            .and_then(Value::as_array)
            .map(|refs| refs.iter().filter_map(feedback_from_value).collect())
            .unwrap_or_default(),
    })
}

fn feedback_from_value(value: &Value) -> Option<FeedbackRef> {
    Some(FeedbackRef {
        id: required_str(value, "id")?,
        title: required_str(value, "title")?,
    })
}

fn required_str(value: &Value, field: &str) -> Option<String> {
    value.get(field).and_then(Value::as_str).map(str::to_string)
}

fn optional_str(value: &Value, field: &str) -> Option<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}

/// Epoch milliseconds from a number, a numeric string or an RFC 3339 string.
fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|ms| ms.is_finite()).map(|ms| ms.floor() as i64)),
        Value::String(text) => {
            let text = text.trim();
            text.parse::<i64>().ok().or_else(|| {
                DateTime::parse_from_rfc3339(text)
                    .ok()
                    .map(|dt| dt.timestamp_millis())
            })
        }
        _ => None,
    }
}
