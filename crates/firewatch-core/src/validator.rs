//! Inbound message validation into canonical [`Reading`]s.
//!
//! Producers are small microcontrollers, so the validator is lenient about
//! representation and strict about meaning: numbers may arrive as numeric
//! strings and booleans as `0`/`1` or `"yes"`/`"no"`, but a missing
//! required field or a value that cannot mean the right thing rejects the
//! whole message.
//!
//! Keys outside [`CANONICAL_FIELDS`] are never rejected. They are copied
//! into [`Reading::extensions`] exactly as received.
//!
//! `timestamp` is the one canonical field with no coercion: it is stored
//! and served as a `YYYY-MM-DD HH:MM:SS` string, so a producer sending an
//! epoch number or any other non-string has the whole reading rejected
//! with [`ValidationError::InvalidField`] for `timestamp`, and the hub
//! logs that case with its own warning.

use chrono::{Local, NaiveDateTime};
use firewatch_types::{CANONICAL_FIELDS, Reading};
use serde_json::{Map, Value};

/// `strftime` pattern of timestamps assigned at ingestion.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Largest magnitude at which every integer is exactly representable as `f64`.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Why an inbound message was not accepted as a reading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The payload is not valid JSON.
    #[error("malformed JSON: {0}")]
    MalformedJson(String),

    /// The payload is JSON but not an object.
    #[error("expected a JSON object, got {found}")]
    NotAnObject {
        /// JSON kind that arrived instead.
        found: &'static str,
    },

    /// A required canonical field is absent.
    #[error("missing required field `{field}`")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A canonical field is present with a value of the wrong meaning.
    #[error("field `{field}` must be {expected}, got {found}")]
    InvalidField {
        /// Name of the offending field.
        field: &'static str,
        /// Description of the accepted values.
        expected: &'static str,
        /// JSON kind that arrived instead.
        found: &'static str,
    },
}

/// Decode a text frame into JSON.
///
/// # Errors
///
/// Returns [`ValidationError::MalformedJson`] if the text is not JSON.
pub fn decode_text(raw: &str) -> Result<Value, ValidationError> {
    serde_json::from_str(raw).map_err(|e| ValidationError::MalformedJson(e.to_string()))
}

/// Decode a binary frame into JSON.
///
/// # Errors
///
/// Returns [`ValidationError::MalformedJson`] if the bytes are not JSON.
pub fn decode_bytes(raw: &[u8]) -> Result<Value, ValidationError> {
    serde_json::from_slice(raw).map_err(|e| ValidationError::MalformedJson(e.to_string()))
}

/// Parse a decoded message into a [`Reading`].
///
/// Required: `temperature`, `humidity`, `smoke_level`, `fire_detected`.
/// Optional with defaults: `flame_detected` (false), `latitude` and
/// `longitude` (0.0). A string `timestamp` is kept verbatim; when absent
/// the returned reading has an empty timestamp and [`assign_timestamp`]
/// fills it in.
///
/// # Errors
///
/// Returns a [`ValidationError`] naming the first problem found.
pub fn parse(raw: &Value) -> Result<Reading, ValidationError> {
    let Value::Object(map) = raw else {
        return Err(ValidationError::NotAnObject {
            found: json_kind(raw),
        });
    };

    let temperature = required(map, "temperature", FLOAT, as_float)?;
    let humidity = required(map, "humidity", FLOAT, as_float)?;
    let smoke_level = required(map, "smoke_level", INTEGER, as_integer)?;
    let fire_detected = required(map, "fire_detected", BOOLEAN, as_bool)?;

    let flame_detected = optional(map, "flame_detected", BOOLEAN, as_bool)?.unwrap_or(false);
    let latitude = optional(map, "latitude", FLOAT, as_float)?.unwrap_or(0.0);
    let longitude = optional(map, "longitude", FLOAT, as_float)?.unwrap_or(0.0);
    let timestamp = optional(map, "timestamp", STRING, |v| v.as_str().map(str::to_owned))?
        .unwrap_or_default();

    let extensions: Map<String, Value> = map
        .iter()
        .filter(|(key, _)| !CANONICAL_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(Reading {
        temperature,
        humidity,
        smoke_level,
        fire_detected,
        flame_detected,
        latitude,
        longitude,
        timestamp,
        extensions,
    })
}

/// Stamp `reading` with the current local time unless the producer sent a
/// timestamp of its own.
pub fn assign_timestamp(reading: &mut Reading, raw: &Value) {
    assign_timestamp_at(reading, raw, Local::now().naive_local());
}

/// Like [`assign_timestamp`] with an explicit clock reading.
///
/// A `timestamp` key holding a non-empty string is left exactly as it is.
/// An absent key, `null`, or the empty string gets `now` rendered with
/// [`TIMESTAMP_FORMAT`].
pub fn assign_timestamp_at(reading: &mut Reading, raw: &Value, now: NaiveDateTime) {
    let supplied = raw
        .get("timestamp")
        .and_then(Value::as_str)
        .is_some_and(|ts| !ts.is_empty());
    if !supplied || !reading.has_timestamp() {
        reading.timestamp = now.format(TIMESTAMP_FORMAT).to_string();
    }
}

/// Stamp `reading` with the current local time if it has no timestamp yet.
pub fn ensure_timestamp(reading: &mut Reading) {
    if !reading.has_timestamp() {
        reading.timestamp = Local::now().naive_local().format(TIMESTAMP_FORMAT).to_string();
    }
}

const FLOAT: &str = "a number";
const INTEGER: &str = "an integer";
const BOOLEAN: &str = "a boolean";
const STRING: &str = "a string";

fn required<T>(
    map: &Map<String, Value>,
    field: &'static str,
    expected: &'static str,
    coerce: impl Fn(&Value) -> Option<T>,
) -> Result<T, ValidationError> {
    let value = map
        .get(field)
        .ok_or(ValidationError::MissingField { field })?;
    coerce(value).ok_or(ValidationError::InvalidField {
        field,
        expected,
        found: json_kind(value),
    })
}

fn optional<T>(
    map: &Map<String, Value>,
    field: &'static str,
    expected: &'static str,
    coerce: impl Fn(&Value) -> Option<T>,
) -> Result<Option<T>, ValidationError> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => coerce(value)
            .map(Some)
            .ok_or(ValidationError::InvalidField {
                field,
                expected,
                found: json_kind(value),
            }),
    }
}

fn as_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_INTEGER)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" | "t" | "y" => Some(true),
            "false" | "0" | "no" | "off" | "f" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
