//! SQL cell values and their conversion to gauge values
//!
//! Every cell a query returns is decoded into a [`SqlValue`] by the data
//! access layer. [`to_float`] then maps it onto the `f64` a gauge can hold.
//!
//! The conversion is total: it never fails or panics. Instead it returns a
//! flag telling the caller whether the value was usable:
//!
//! | value                | result            |
//! |----------------------|-------------------|
//! | integer / float      | the number, `true` |
//! | boolean              | `1.0` / `0.0`, `true` |
//! | timestamp            | Unix seconds, `true` |
//! | text / bytes         | parsed decimal, or `NaN, false` |
//! | NULL                 | `NaN, true` |
//! | unsupported type     | `NaN, false` |
//!
//! A NULL is a valid but unmeasurable value, which is different from a value
//! that could not be converted.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::error;

/// A single cell as returned by a database driver
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Timestamp(DateTime<Utc>),
    /// Raw driver bytes, e.g. NUMERIC/DECIMAL columns or binary data
    Bytes(Vec<u8>),
    Text(String),
    /// A column type the data access layer does not decode, by type name
    Unsupported(String),
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(v) => write!(f, "{v}"),
            SqlValue::Int(v) => write!(f, "{v}"),
            SqlValue::UInt(v) => write!(f, "{v}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            SqlValue::Bytes(v) => write!(f, "{}", String::from_utf8_lossy(v)),
            SqlValue::Text(v) => write!(f, "{v}"),
            SqlValue::Unsupported(type_name) => write!(f, "<unsupported type {type_name}>"),
        }
    }
}

/// Convert a cell into a gauge value.
///
/// Returns the value and whether the conversion succeeded.
pub fn to_float(value: &SqlValue) -> (f64, bool) {
    match value {
        SqlValue::Null => (f64::NAN, true),
        SqlValue::Bool(true) => (1.0, true),
        SqlValue::Bool(false) => (0.0, true),
        SqlValue::Int(v) => (*v as f64, true),
        SqlValue::UInt(v) => (*v as f64, true),
        SqlValue::Float(v) => (*v, true),
        SqlValue::Timestamp(v) => (v.timestamp() as f64, true),
        SqlValue::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => parse_decimal(text, "bytes"),
            Err(e) => {
                error!(
                    raw = %String::from_utf8_lossy(bytes),
                    "could not decode bytes as UTF-8: {e}"
                );
                (f64::NAN, false)
            }
        },
        SqlValue::Text(text) => parse_decimal(text, "string"),
        SqlValue::Unsupported(type_name) => {
            error!("cannot convert values of type {type_name} to float");
            (f64::NAN, false)
        }
    }
}

fn parse_decimal(text: &str, kind: &str) -> (f64, bool) {
    match text.trim().parse::<f64>() {
        Ok(v) => (v, true),
        Err(e) => {
            error!(raw = %text, "could not parse {kind}: {e}");
            (f64::NAN, false)
        }
    }
}
