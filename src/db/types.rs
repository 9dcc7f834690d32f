//! Row decoding for the `Any` driver.
//!
//! The `Any` driver exposes a small value model (integers, floats, booleans, text,
//! blobs, NULL). Each column is decoded by trying those kinds in turn; sqlx rejects
//! incompatible kinds before decoding, so the first compatible attempt wins.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value as JsonValue;
use sqlx::any::AnyRow;
use sqlx::{Column, Row};

/// Column names of a row, in select order.
pub fn column_names(row: &AnyRow) -> Vec<String> {
    row.columns().iter().map(|c| c.name().to_string()).collect()
}

/// Convert a row into a JSON object keyed by column name.
pub fn row_to_json(row: &AnyRow) -> serde_json::Map<String, JsonValue> {
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), decode_column(row, col.ordinal())))
        .collect()
}

fn decode_column(row: &AnyRow, idx: usize) -> JsonValue {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(JsonValue::from).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return v.map(JsonValue::from).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
        return v.map(JsonValue::from).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(float_to_json).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        return v
            .map(|f| float_to_json(f as f64))
            .unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(JsonValue::Bool).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(JsonValue::String).unwrap_or(JsonValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v
            .map(|bytes| JsonValue::String(STANDARD.encode(bytes)))
            .unwrap_or(JsonValue::Null);
    }
    JsonValue::Null
}

/// NaN and infinities have no JSON representation.
fn float_to_json(f: f64) -> JsonValue {
    serde_json::Number::from_f64(f)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_to_json() {
        assert_eq!(float_to_json(1.5), JsonValue::from(1.5));
        assert_eq!(float_to_json(f64::NAN), JsonValue::Null);
        assert_eq!(float_to_json(f64::INFINITY), JsonValue::Null);
    }
}
