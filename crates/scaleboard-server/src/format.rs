//! Formatting of upstream JSON into table-friendly rows.
//!
//! Headscale mixes `{seconds, nanos}` objects and RFC 3339 strings for
//! timestamps, and numbers or strings for ids; everything here degrades to an
//! empty string instead of failing.

use chrono::{DateTime, Utc};
use serde_json::Value;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static NULL: Value = Value::Null;

/// Whether a JSON value counts as "set": not null, false, zero or empty.
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// The first of `keys` that is set on `object`, or `Null`.
pub fn first_set<'a>(object: &'a Value, keys: &[&str]) -> &'a Value {
    keys.iter()
        .filter_map(|key| object.get(key))
        .find(|v| is_set(v))
        .unwrap_or(&NULL)
}

/// The value as a display string; strings unquoted, numbers as written.
pub fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a timestamp as `YYYY-MM-DD HH:MM:SS` in UTC.
///
/// Unparseable strings are returned unchanged.
pub fn format_timestamp(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let seconds = map.get("seconds").and_then(|s| match s {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.parse().ok(),
                _ => None,
            });
            seconds
                .filter(|s| *s != 0)
                .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
                .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string())
                .unwrap_or_default()
        }
        Value::String(s) if !s.is_empty() => DateTime::parse_from_rfc3339(s).map_or_else(
            |_| s.clone(),
            |dt| dt.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string(),
        ),
        _ => String::new(),
    }
}

fn yes_no(flag: bool) -> String {
    String::from(if flag { "yes" } else { "no" })
}

/// `"yes"` / `"no"` for booleans, counts and common truthy words.
pub fn bool_label(value: &Value) -> String {
    match value {
        Value::Bool(b) => yes_no(*b),
        Value::Number(n) => yes_no(n.as_f64().is_some_and(|f| f > 0.0)),
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "yes" | "1" | "online" => "yes".to_owned(),
            "false" | "no" | "0" | "offline" => "no".to_owned(),
            _ => s.clone(),
        },
        Value::Null => "no".to_owned(),
        other => other.to_string(),
    }
}

/// Join an array with `", "`. Anything else renders empty.
pub fn array_to_string(value: &Value) -> String {
    value
        .as_array()
        .map(|items| items.iter().map(text).collect::<Vec<_>>().join(", "))
        .unwrap_or_default()
}

/// A user given either as a bare name or as an object with `name` or `id`.
pub fn extract_user_name(user: &Value) -> String {
    match user {
        Value::String(name) => name.clone(),
        Value::Object(_) => text(first_set(user, &["name", "id"])),
        _ => String::new(),
    }
}
