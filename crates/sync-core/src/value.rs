//! Scalar values bound into relational columns.
//!
//! Documents are schema-less, so every value read from the source collapses
//! into one of these variants before it reaches a SQL statement. Nested
//! documents and arrays assigned directly to a column become [`Value::Json`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A column value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL (also used for missing source fields)
    Null,

    /// Boolean value
    Bool(bool),

    /// 64-bit signed integer
    Int(i64),

    /// 64-bit floating point
    Float(f64),

    /// Exact decimal
    Decimal(Decimal),

    /// UTF-8 text
    Text(String),

    /// Binary data
    Bytes(Vec<u8>),

    /// Timestamp in UTC
    DateTime(DateTime<Utc>),

    /// Structured value stored as a JSON document
    Json(serde_json::Value),
}

impl Value {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Render the value the way it would appear inside a text column.
    ///
    /// Returns `None` for [`Value::Null`]. Bytes are rendered as lowercase hex.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Decimal(d) => Some(d.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Bytes(b) => Some(b.iter().map(|byte| format!("{byte:02x}")).collect()),
            Self::DateTime(dt) => Some(dt.to_rfc3339()),
            Self::Json(j) => Some(j.to_string()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Self::Decimal(d)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::DateTime(dt)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

/// JSON scalars map onto their natural variants; arrays and objects stay JSON.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Self::Float(f)
                } else {
                    Self::Text(n.to_string())
                }
            }
            serde_json::Value::String(s) => Self::Text(s),
            other => Self::Json(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(Value::from(json!(null)), Value::Null);
        assert_eq!(Value::from(json!(true)), Value::Bool(true));
        assert_eq!(Value::from(json!(42)), Value::Int(42));
        assert_eq!(Value::from(json!(1.5)), Value::Float(1.5));
        assert_eq!(Value::from(json!("x")), Value::Text("x".to_string()));
    }

    #[test]
    fn test_from_json_keeps_structures() {
        let v = Value::from(json!({"a": [1, 2]}));
        assert_eq!(v, Value::Json(json!({"a": [1, 2]})));
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".to_string()));
    }

    #[test]
    fn test_to_text() {
        assert_eq!(Value::Null.to_text(), None);
        assert_eq!(Value::Bool(false).to_text().as_deref(), Some("false"));
        assert_eq!(Value::Bytes(vec![0, 255]).to_text().as_deref(), Some("00ff"));
        assert_eq!(
            Value::Json(serde_json::json!({"k": 1})).to_text().as_deref(),
            Some(r#"{"k":1}"#)
        );
    }
}
