//! Decoding driver rows into [`SqlValue`] cells
//!
//! The column's type name decides which variant a cell becomes. NULL cells
//! become [`SqlValue::Null`] regardless of type, unknown types become
//! [`SqlValue::Unsupported`] so the coercion step can report them. Rows are
//! fetched over the text protocol, which is why textual decimals are read
//! without a type check.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::postgres::types::Oid;
use sqlx::{Column, Row, TypeInfo, ValueRef};

use crate::coercion::SqlValue;

use super::ResultRow;
use super::error::{DatabaseError, DatabaseResult};

pub fn pg_row(row: &PgRow) -> DatabaseResult<ResultRow> {
    decode_row(row, pg_value)
}

pub fn mysql_row(row: &MySqlRow) -> DatabaseResult<ResultRow> {
    decode_row(row, mysql_value)
}

fn decode_row<R, F>(row: &R, decode: F) -> DatabaseResult<ResultRow>
where
    R: Row,
    F: Fn(&R, usize, &str) -> Result<SqlValue, sqlx::Error>,
{
    let mut cells = Vec::with_capacity(row.len());

    for (index, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name();
        let value = decode(row, index, type_name).map_err(|source| DatabaseError::Decode {
            column: column.name().to_string(),
            type_name: type_name.to_string(),
            source,
        })?;
        cells.push((column.name().to_string(), value));
    }

    Ok(ResultRow::new(cells))
}

/// How a cell of a given column type is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Null,
    Bool,
    Int16,
    Int32,
    Int64,
    Oid,
    UInt64,
    Float32,
    Float64,
    /// Exact decimal, kept as its text
    Decimal,
    Text,
    TimestampTz,
    /// Timestamp without zone, read as UTC
    Timestamp,
    Date,
    Binary,
    Unsupported,
}

/// Column kind for a Postgres type name as sqlx reports it
///
/// sqlx names `bpchar` as `CHAR` and the single byte `"char"` as `"CHAR"`.
fn pg_kind(type_name: &str) -> CellKind {
    match type_name {
        "BOOL" => CellKind::Bool,
        "INT2" => CellKind::Int16,
        "INT4" => CellKind::Int32,
        "INT8" => CellKind::Int64,
        "OID" => CellKind::Oid,
        "FLOAT4" => CellKind::Float32,
        "FLOAT8" => CellKind::Float64,
        "NUMERIC" | "MONEY" => CellKind::Decimal,
        "TEXT" | "VARCHAR" | "CHAR" | "\"CHAR\"" | "NAME" | "UNKNOWN" => CellKind::Text,
        "TIMESTAMPTZ" => CellKind::TimestampTz,
        "TIMESTAMP" => CellKind::Timestamp,
        "DATE" => CellKind::Date,
        "BYTEA" => CellKind::Binary,
        _ => CellKind::Unsupported,
    }
}

/// Column kind for a MySQL type name as sqlx reports it
fn mysql_kind(type_name: &str) -> CellKind {
    match type_name {
        "NULL" => CellKind::Null,
        "BOOLEAN" => CellKind::Bool,
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => CellKind::Int64,
        "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
        | "BIGINT UNSIGNED" => CellKind::UInt64,
        "FLOAT" | "DOUBLE" => CellKind::Float64,
        "DECIMAL" => CellKind::Decimal,
        "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" | "ENUM" | "SET" => {
            CellKind::Text
        }
        "DATETIME" | "TIMESTAMP" => CellKind::Timestamp,
        "DATE" => CellKind::Date,
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT" => {
            CellKind::Binary
        }
        _ => CellKind::Unsupported,
    }
}

fn pg_value(row: &PgRow, index: usize, type_name: &str) -> Result<SqlValue, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(SqlValue::Null);
    }

    let value = match pg_kind(type_name) {
        CellKind::Null => SqlValue::Null,
        CellKind::Bool => SqlValue::Bool(row.try_get(index)?),
        CellKind::Int16 => SqlValue::Int(row.try_get::<i16, _>(index)?.into()),
        CellKind::Int32 => SqlValue::Int(row.try_get::<i32, _>(index)?.into()),
        CellKind::Int64 => SqlValue::Int(row.try_get(index)?),
        CellKind::Oid => SqlValue::Int(row.try_get::<Oid, _>(index)?.0.into()),
        CellKind::Float32 => SqlValue::Float(row.try_get::<f32, _>(index)?.into()),
        CellKind::Float64 => SqlValue::Float(row.try_get(index)?),
        CellKind::Decimal => {
            SqlValue::Bytes(row.try_get_unchecked::<String, _>(index)?.into_bytes())
        }
        CellKind::Text => SqlValue::Text(row.try_get_unchecked(index)?),
        CellKind::TimestampTz => SqlValue::Timestamp(row.try_get::<DateTime<Utc>, _>(index)?),
        CellKind::Timestamp => {
            SqlValue::Timestamp(row.try_get::<NaiveDateTime, _>(index)?.and_utc())
        }
        CellKind::Date => SqlValue::Timestamp(midnight(row.try_get(index)?)),
        CellKind::Binary => SqlValue::Bytes(row.try_get(index)?),
        // Postgres has no unsigned integers
        CellKind::UInt64 | CellKind::Unsupported => SqlValue::Unsupported(type_name.to_string()),
    };

    Ok(value)
}

fn mysql_value(row: &MySqlRow, index: usize, type_name: &str) -> Result<SqlValue, sqlx::Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(SqlValue::Null);
    }

    // Text protocol cells carry no width, so every read is unchecked
    let value = match mysql_kind(type_name) {
        CellKind::Null => SqlValue::Null,
        CellKind::Bool => SqlValue::Bool(row.try_get_unchecked(index)?),
        CellKind::Int16 | CellKind::Int32 | CellKind::Int64 | CellKind::Oid => {
            SqlValue::Int(row.try_get_unchecked(index)?)
        }
        CellKind::UInt64 => SqlValue::UInt(row.try_get_unchecked(index)?),
        CellKind::Float32 | CellKind::Float64 => SqlValue::Float(row.try_get_unchecked(index)?),
        CellKind::Decimal => {
            SqlValue::Bytes(row.try_get_unchecked::<String, _>(index)?.into_bytes())
        }
        CellKind::Text => SqlValue::Text(row.try_get_unchecked(index)?),
        CellKind::TimestampTz | CellKind::Timestamp => {
            SqlValue::Timestamp(row.try_get_unchecked::<NaiveDateTime, _>(index)?.and_utc())
        }
        CellKind::Date => SqlValue::Timestamp(midnight(row.try_get_unchecked(index)?)),
        CellKind::Binary => SqlValue::Bytes(row.try_get_unchecked(index)?),
        CellKind::Unsupported => SqlValue::Unsupported(type_name.to_string()),
    };

    Ok(value)
}

/// Dates are reported as midnight UTC
fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
