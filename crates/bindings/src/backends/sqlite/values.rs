//! Conversion between JSON field values and SQLite values.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rusqlite::types::{Value as SqlValue, ValueRef};
use serde_json::{Number, Value};

use crate::orm::ColumnType;

/// Converts a field value for binding into a statement.
///
/// Booleans are stored as 0/1, arrays and objects as JSON text.
pub(crate) fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

/// Converts a column value read from a row.
///
/// The declared column type, when known, decides how integers and text
/// decode. Blobs become base64 text.
pub(crate) fn from_sql(value: ValueRef<'_>, declared: Option<ColumnType>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => match declared {
            Some(ColumnType::Boolean) => Value::Bool(i != 0),
            Some(ColumnType::Real) => real(i as f64),
            _ => Value::from(i),
        },
        ValueRef::Real(f) => real(f),
        ValueRef::Text(bytes) => {
            let text = String::from_utf8_lossy(bytes);
            match declared {
                Some(ColumnType::Json) => {
                    serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.into_owned()))
                }
                Some(ColumnType::Boolean) => match text.as_ref() {
                    "true" | "1" => Value::Bool(true),
                    "false" | "0" => Value::Bool(false),
                    _ => Value::String(text.into_owned()),
                },
                _ => Value::String(text.into_owned()),
            }
        }
        ValueRef::Blob(bytes) => Value::String(BASE64.encode(bytes)),
    }
}

fn real(f: f64) -> Value {
    Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null)
}
