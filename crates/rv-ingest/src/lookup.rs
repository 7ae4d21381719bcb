//! Field lookup helpers over loosely-shaped JSON.
//!
//! Vendor exports name the same concept many ways, so every extractor is
//! expressed as an ordered list of candidate keys resolved by
//! [`first_present`] and friends.

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

/// Non-null value of `key` on an object.
pub fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value.get(key).filter(|v| !v.is_null())
}

/// Walks a dotted path of object keys (`"extra.metadata.ls_model_name"`).
pub fn path<'a>(value: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted
        .split('.')
        .try_fold(value, |current, key| field(current, key))
}

/// First non-null value among `keys`, tried in order. Keys may be dotted paths.
pub fn first_present<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| path(value, key))
}

/// First non-empty string among `keys`.
pub fn first_str(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| path(value, key))
        .find_map(|v| v.as_str().filter(|s| !s.trim().is_empty()))
        .map(str::to_owned)
}

/// First value among `keys` that reads as a number.
pub fn first_number(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter()
        .filter_map(|key| path(value, key))
        .find_map(number_of)
}

/// First value among `keys` that reads as a non-negative integer.
pub fn first_u64(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter()
        .filter_map(|key| path(value, key))
        .find_map(u64_of)
}

pub fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn u64_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Text form of any JSON value: strings verbatim, `null` as empty, anything
/// else as compact JSON.
pub fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// True for `null`, `""`, `[]` and `{}`.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Scalar identifier (`"abc"` or `42`) as a string.
pub fn id_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// True when the lowercased `name` contains any non-empty fragment,
/// compared case-insensitively.
pub fn name_matches(name: &str, fragments: &[String]) -> bool {
    fragments
        .iter()
        .any(|fragment| !fragment.is_empty() && name.contains(&fragment.to_ascii_lowercase()))
}

/// String elements of an array; non-strings are skipped.
pub fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Parses an RFC 3339 string, a naive `YYYY-MM-DDTHH:MM:SS[.f]` string
/// (assumed UTC, as LangSmith exports them), or epoch seconds/milliseconds.
pub fn timestamp_of(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|naive| naive.and_utc())
                })
                .or_else(|| s.parse::<f64>().ok().and_then(epoch_to_datetime))
        }
        Value::Number(n) => n.as_f64().and_then(epoch_to_datetime),
        _ => None,
    }
}

/// Epoch seconds, or milliseconds when the value is too large to be seconds.
fn epoch_to_datetime(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() || epoch < 0.0 {
        return None;
    }
    let millis = if epoch > 1e11 { epoch } else { epoch * 1000.0 };
    Utc.timestamp_millis_opt(millis.round() as i64).single()
}
