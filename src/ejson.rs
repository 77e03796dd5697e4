//! Extended JSON scalars.
//!
//! JSON has no date or binary type, so documents carry them as MongoDB
//! Extended JSON wrappers: `{"$date": "2024-01-01T00:00:00Z"}` (or epoch
//! milliseconds) and `{"$binary": "<base64>"}`. Wrappers are scalars: the
//! validator and cleaner never descend into them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{json, Value};

pub const DATE_KEY: &str = "$date";
pub const BINARY_KEY: &str = "$binary";

fn single_key<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let map = value.as_object()?;
    if map.len() == 1 {
        map.get(key)
    } else {
        None
    }
}

/// True for any `{"$date": …}` wrapper, valid or not.
pub fn is_date(value: &Value) -> bool {
    single_key(value, DATE_KEY).is_some()
}

/// True for a `{"$binary": …}` wrapper.
pub fn is_binary(value: &Value) -> bool {
    match single_key(value, BINARY_KEY) {
        Some(Value::String(_)) => true,
        Some(Value::Object(inner)) => inner.get("base64").is_some_and(Value::is_string),
        _ => false,
    }
}

/// True for an object that is not a scalar wrapper.
pub fn is_plain_object(value: &Value) -> bool {
    value.is_object() && !is_date(value) && !is_binary(value)
}

/// The instant held by a date wrapper, or `None` if the value is not a date
/// or its payload cannot be parsed.
pub fn as_date(value: &Value) -> Option<DateTime<Utc>> {
    match single_key(value, DATE_KEY)? {
        Value::String(s) => parse_date_str(s),
        Value::Number(n) => n.as_f64().and_then(date_from_millis),
        Value::Object(inner) => inner
            .get("$numberLong")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

/// Wrap an instant as an Extended JSON date.
pub fn date(instant: DateTime<Utc>) -> Value {
    json!({ DATE_KEY: instant.to_rfc3339_opts(SecondsFormat::Millis, true) })
}

pub fn date_from_millis(millis: f64) -> Option<DateTime<Utc>> {
    if !millis.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

/// Parse the date strings a caller is likely to hand over: RFC 3339, a bare
/// `YYYY-MM-DD` day, or a zone-less date-time (read as UTC).
pub fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return day.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    None
}

/// `YYYY-MM-DD` in UTC, as used by date bound messages.
pub fn format_day(instant: &DateTime<Utc>) -> String {
    instant.format("%Y-%m-%d").to_string()
}
