//! Dynamic SQL values.

use crate::error::{Error, TypeError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A dynamically-typed SQL value.
///
/// This enum is the closed set of values that flow between beans, the
/// statement renderer and drivers. Every conversion into or out of it is an
/// exhaustive `match`, so a new variant is a compile error at every site
/// that must handle it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 64-bit floating point
    Double(f64),

    /// Text string
    Text(String),

    /// Binary data
    Bytes(Vec<u8>),

    /// Timestamp (microseconds since the Unix epoch, UTC)
    Timestamp(i64),

    /// JSON document, used for slice and map fields
    Json(serde_json::Value),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Double(_) => "DOUBLE",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::Json(_) => "JSON",
        }
    }

    /// Does this value count as "not set" when a bean doubles as a filter?
    ///
    /// Empty strings, zero numbers, the zero timestamp, empty byte strings and
    /// empty JSON collections are all unset. `false` is unset too; callers
    /// that treat booleans specially must check for [`Value::Bool`] first.
    pub fn is_zero(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Int(v) => *v == 0,
            Value::BigInt(v) | Value::Timestamp(v) => *v == 0,
            Value::Double(v) => *v == 0.0,
            Value::Text(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Json(json) => match json {
                serde_json::Value::Null => true,
                serde_json::Value::Array(items) => items.is_empty(),
                serde_json::Value::Object(map) => map.is_empty(),
                serde_json::Value::String(s) => s.is_empty(),
                serde_json::Value::Bool(_) | serde_json::Value::Number(_) => false,
            },
        }
    }

    /// Try to convert this value to a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::BigInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Try to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) | Value::Timestamp(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Try to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(f64::from(*v)),
            Value::BigInt(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a byte slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Serialize a slice or map field into a JSON value.
    #[allow(clippy::result_large_err)]
    pub fn json<T: Serialize + ?Sized>(value: &T) -> crate::Result<Value> {
        serde_json::to_value(value)
            .map(Value::Json)
            .map_err(|e| Error::Serde(e.to_string()))
    }

    /// Decode a JSON-shaped field, accepting the text and byte forms that
    /// drivers hand back for JSON stored in text or binary columns.
    #[allow(clippy::result_large_err)]
    pub fn decode_json<T: DeserializeOwned>(&self) -> crate::Result<T> {
        let parsed = match self {
            Value::Json(json) => serde_json::from_value(json.clone()),
            Value::Text(s) => serde_json::from_str(s),
            Value::Bytes(b) => serde_json::from_slice(b),
            Value::Null => serde_json::from_value(serde_json::Value::Null),
            other => {
                return Err(Error::Type(TypeError {
                    expected: "JSON",
                    actual: other.type_name().to_string(),
                    column: None,
                }));
            }
        };
        parsed.map_err(|e| Error::Serde(e.to_string()))
    }

    /// Canonical JSON form used for cache keys and primary-key strings.
    ///
    /// Integers of every width collapse to the same number, so `Int(7)` and
    /// `BigInt(7)` produce identical keys.
    pub fn canonical(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::from(i64::from(*b)),
            Value::Int(v) => serde_json::Value::from(i64::from(*v)),
            Value::BigInt(v) | Value::Timestamp(v) => serde_json::Value::from(*v),
            Value::Double(v) => serde_json::Value::from(*v),
            Value::Text(s) => serde_json::Value::from(s.as_str()),
            Value::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{byte:02x}")).collect();
                serde_json::Value::from(format!("0x{hex}"))
            }
            Value::Json(json) => json.clone(),
        }
    }

    /// The current wall-clock time as a [`Value::Timestamp`].
    pub fn now() -> Value {
        Value::Timestamp(now_micros())
    }
}

/// Microseconds since the Unix epoch, saturating on clocks set before it.
pub fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_micros()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Int(i32::from(v))
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int(i32::from(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::Int(i32::from(v))
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::Int(i32::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::BigInt(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Double(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_values() {
        assert!(Value::Null.is_zero());
        assert!(Value::Text(String::new()).is_zero());
        assert!(Value::Int(0).is_zero());
        assert!(Value::BigInt(0).is_zero());
        assert!(Value::Double(0.0).is_zero());
        assert!(Value::Timestamp(0).is_zero());
        assert!(Value::Bytes(Vec::new()).is_zero());
        assert!(Value::Json(serde_json::json!([])).is_zero());
        assert!(Value::Json(serde_json::json!({})).is_zero());

        assert!(!Value::Text("a".into()).is_zero());
        assert!(!Value::BigInt(-1).is_zero());
        assert!(!Value::Json(serde_json::json!(["x"])).is_zero());
        assert!(!Value::Bool(true).is_zero());
    }

    #[test]
    fn canonical_collapses_integer_widths() {
        assert_eq!(Value::Int(7).canonical(), Value::BigInt(7).canonical());
        assert_eq!(
            Value::Bytes(vec![0xde, 0xad]).canonical(),
            serde_json::json!("0xdead")
        );
    }

    #[test]
    fn json_round_trip_through_text() {
        let tags = vec!["red".to_string(), "blue".to_string()];
        let value = Value::json(&tags).unwrap();
        assert_eq!(value, Value::Json(serde_json::json!(["red", "blue"])));

        let stored = Value::Text(r#"["red","blue"]"#.to_string());
        let decoded: Vec<String> = stored.decode_json().unwrap();
        assert_eq!(decoded, tags);
    }

    #[test]
    fn decode_json_rejects_numbers() {
        let err = Value::BigInt(3).decode_json::<Vec<String>>().unwrap_err();
        assert!(matches!(err, Error::Type(_)));
    }

    #[test]
    fn conversions() {
        assert_eq!(Value::from(5_i16), Value::Int(5));
        assert_eq!(Value::from(5_u32), Value::BigInt(5));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".into()));
        assert_eq!(Value::Text(" 42 ".into()).as_i64(), Some(42));
        assert_eq!(Value::Int(1).as_bool(), Some(true));
    }

    #[test]
    fn now_is_after_epoch() {
        match Value::now() {
            Value::Timestamp(micros) => assert!(micros > 0),
            other => panic!("unexpected {other:?}"),
        }
    }
}
