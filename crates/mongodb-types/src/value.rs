//! BSON value → [`Value`] conversion.
//!
//! Scalars map onto their natural column values. Arrays and sub-documents
//! assigned directly to a column are stored as relaxed Extended JSON.

use bson::Bson;
use rust_decimal::Decimal;
use std::str::FromStr;
use sync_core::Value;
use thiserror::Error;

/// Errors raised while converting BSON into column values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConversionError {
    /// Decimal128 that does not fit the column decimal type (NaN, Infinity, overflow).
    #[error("Failed to parse BSON Decimal128 '{0}'")]
    Decimal(String),

    /// Timestamp outside the representable range.
    #[error("Failed to convert MongoDB timestamp {time}:{increment} to datetime")]
    Timestamp { time: u32, increment: u32 },
}

/// Convert a BSON value into a column value.
pub fn bson_to_value(bson_value: Bson) -> Result<Value, ConversionError> {
    match bson_value {
        Bson::Double(f) => Ok(Value::Float(f)),
        Bson::String(s) => Ok(Value::Text(s)),
        Bson::Boolean(b) => Ok(Value::Bool(b)),
        Bson::Null | Bson::Undefined => Ok(Value::Null),
        Bson::Int32(i) => Ok(Value::Int(i as i64)),
        Bson::Int64(i) => Ok(Value::Int(i)),
        Bson::ObjectId(oid) => Ok(Value::Text(oid.to_hex())),
        Bson::DateTime(dt) => Ok(Value::DateTime(dt.to_chrono())),
        Bson::Timestamp(ts) => {
            // The increment keeps ordering between timestamps of the same second.
            chrono::DateTime::from_timestamp(ts.time as i64, ts.increment)
                .map(Value::DateTime)
                .ok_or(ConversionError::Timestamp {
                    time: ts.time,
                    increment: ts.increment,
                })
        }
        Bson::Binary(binary) => Ok(Value::Bytes(binary.bytes)),
        Bson::Symbol(s) | Bson::JavaScriptCode(s) => Ok(Value::Text(s)),
        Bson::RegularExpression(regex) => Ok(Value::Text(format!(
            "/{}/{}",
            regex.pattern, regex.options
        ))),
        Bson::Decimal128(d) => {
            let decimal_str = d.to_string();
            Decimal::from_str(&decimal_str)
                .or_else(|_| Decimal::from_scientific(&decimal_str))
                .map(Value::Decimal)
                .map_err(|e| {
                    tracing::warn!("Failed to parse BSON Decimal128 '{}': {:?}", decimal_str, e);
                    ConversionError::Decimal(decimal_str)
                })
        }
        // DBPointer is deprecated and its fields are private
        Bson::DbPointer(_) => Ok(Value::Text("$dbPointer".to_string())),
        structured @ (Bson::Array(_)
        | Bson::Document(_)
        | Bson::JavaScriptCodeWithScope(_)
        | Bson::MaxKey
        | Bson::MinKey) => Ok(Value::Json(structured.into_relaxed_extjson())),
    }
}
