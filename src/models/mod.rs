//! Data model for the feeder: schedules, device variables, and stored media.

pub mod blob;
pub mod schedule;
pub mod variables;

pub use blob::BlobItem;
pub use schedule::Schedule;
pub use variables::DeviceVariables;

use serde_json::Value;

/// Reads a boolean field from a remote record, defaulting on absence or a
/// mistyped value. Remote records are never rejected for bad fields.
pub(crate) fn bool_field(value: &Value, field: &str) -> bool {
    value.get(field).and_then(Value::as_bool).unwrap_or(false)
}

/// Reads an integer field, defaulting to 0.
pub(crate) fn int_field(value: &Value, field: &str) -> i64 {
    value.get(field).and_then(Value::as_i64).unwrap_or(0)
}

/// Reads a float field, defaulting to 0.0.
pub(crate) fn float_field(value: &Value, field: &str) -> f64 {
    value.get(field).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Reads a string field, defaulting to "".
pub(crate) fn string_field(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
