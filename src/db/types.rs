//! Row decoding into the canonical [`Row`] shape.
//!
//! # Architecture
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies column types into logical categories
//! 2. Database-specific decoders handle the actual value extraction
//!
//! A value the driver cannot decode fails the row with the driver's error, which
//! surfaces as a `Query` error (or a `Stream` error once rows have been delivered).

use crate::models::{DatabaseType, Row};
use serde_json::Value as JsonValue;
use sqlx::mysql::{MySqlRow, MySqlTypeInfo, MySqlValueRef};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Decode, Row as _, Type, TypeInfo};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for database column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Text,
    Binary,
    Json,
    Temporal,
    Unknown,
}

/// Classify a database type name into a logical category.
pub fn categorize_type(type_name: &str, db: DatabaseType) -> TypeCategory {
    let lower = type_name.to_lowercase();

    // Decimal/Numeric - check first as it overlaps with "numeric" in float checks
    if lower.contains("decimal") || lower.contains("numeric") {
        // SQLite's NUMERIC is actually a float
        if db == DatabaseType::SQLite && lower == "numeric" {
            return TypeCategory::Float;
        }
        return TypeCategory::Decimal;
    }

    // Boolean before integers: MySQL reports TINYINT(1) as BOOLEAN
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }

    if lower.contains("int") || lower.contains("tiny") || lower == "year" {
        return TypeCategory::Integer;
    }

    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }

    if lower == "json" {
        return TypeCategory::Json;
    }

    if lower.contains("blob") || lower.contains("binary") {
        return TypeCategory::Binary;
    }

    // SQLite stores dates as text, so only MySQL gets a temporal decoder
    if db == DatabaseType::MySQL
        && (lower.contains("date") || lower.contains("time") || lower == "timestamp")
    {
        return TypeCategory::Temporal;
    }

    if lower.contains("char") || lower.contains("text") || lower == "enum" || lower == "set" {
        return TypeCategory::Text;
    }

    TypeCategory::Unknown
}

// =============================================================================
// Decimal Type Support
// =============================================================================

/// Wrapper type for raw DECIMAL values as strings.
/// This preserves the exact database representation.
#[derive(Debug)]
pub struct RawDecimal(pub String);

impl Type<sqlx::MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<sqlx::MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, sqlx::MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<sqlx::MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Encode binary column data as a base64 JSON string.
pub fn encode_binary_value(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    JsonValue::String(STANDARD.encode(bytes))
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Trait for converting native driver rows into canonical rows.
///
/// A column that cannot be decoded fails the whole row with the driver's error.
pub trait RowToJson {
    fn to_json_map(&self) -> Result<Row, sqlx::Error>;
}

impl RowToJson for MySqlRow {
    fn to_json_map(&self) -> Result<Row, sqlx::Error> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::MySQL);
                let value = mysql::decode_column(self, idx, category)?;
                Ok((col.name().to_string(), value))
            })
            .collect()
    }
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self) -> Result<Row, sqlx::Error> {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let category = categorize_type(type_name, DatabaseType::SQLite);
                let value = sqlite::decode_column(self, idx, category)?;
                Ok((col.name().to_string(), value))
            })
            .collect()
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

type DecodeResult = Result<JsonValue, sqlx::Error>;

mod mysql {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use sqlx::Row as _;

    pub fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> DecodeResult {
        match category {
            TypeCategory::Decimal => decode_decimal(row, idx),
            TypeCategory::Integer => decode_integer(row, idx),
            TypeCategory::Boolean => decode_boolean(row, idx),
            TypeCategory::Float => decode_float(row, idx),
            TypeCategory::Binary => decode_binary_col(row, idx),
            TypeCategory::Json => decode_json(row, idx),
            TypeCategory::Temporal => decode_temporal(row, idx),
            TypeCategory::Text | TypeCategory::Unknown => decode_text(row, idx),
        }
    }

    fn decode_decimal(row: &MySqlRow, idx: usize) -> DecodeResult {
        Ok(row
            .try_get::<Option<RawDecimal>, _>(idx)?
            .map_or(JsonValue::Null, |v| JsonValue::String(v.0)))
    }

    fn decode_integer(row: &MySqlRow, idx: usize) -> DecodeResult {
        let signed = match row.try_get::<Option<i64>, _>(idx) {
            Ok(v) => return Ok(v.map_or(JsonValue::Null, |v| JsonValue::Number(v.into()))),
            Err(e) => e,
        };
        // BIGINT UNSIGNED above i64::MAX
        if let Ok(v) = row.try_get::<Option<u64>, _>(idx) {
            return Ok(v.map_or(JsonValue::Null, |v| JsonValue::Number(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
            return Ok(v.map_or(JsonValue::Null, |v| JsonValue::Number(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<u32>, _>(idx) {
            return Ok(v.map_or(JsonValue::Null, |v| JsonValue::Number(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
            return Ok(v.map_or(JsonValue::Null, |v| JsonValue::Number(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<i8>, _>(idx) {
            return Ok(v.map_or(JsonValue::Null, |v| JsonValue::Number(v.into())));
        }
        if let Ok(v) = row.try_get::<Option<u8>, _>(idx) {
            return Ok(v.map_or(JsonValue::Null, |v| JsonValue::Number(v.into())));
        }
        Err(signed)
    }

    fn decode_boolean(row: &MySqlRow, idx: usize) -> DecodeResult {
        Ok(row
            .try_get::<Option<bool>, _>(idx)?
            .map_or(JsonValue::Null, JsonValue::Bool))
    }

    fn decode_float(row: &MySqlRow, idx: usize) -> DecodeResult {
        match row.try_get::<Option<f64>, _>(idx) {
            Ok(v) => Ok(v.map_or(JsonValue::Null, float_value)),
            Err(e) => match row.try_get::<Option<f32>, _>(idx) {
                Ok(v) => Ok(v.map_or(JsonValue::Null, |v| float_value(v as f64))),
                Err(_) => Err(e),
            },
        }
    }

    fn decode_binary_col(row: &MySqlRow, idx: usize) -> DecodeResult {
        Ok(row
            .try_get::<Option<Vec<u8>>, _>(idx)?
            .map_or(JsonValue::Null, |v| encode_binary_value(&v)))
    }

    fn decode_json(row: &MySqlRow, idx: usize) -> DecodeResult {
        Ok(row
            .try_get::<Option<JsonValue>, _>(idx)?
            .unwrap_or(JsonValue::Null))
    }

    fn decode_temporal(row: &MySqlRow, idx: usize) -> DecodeResult {
        if let Ok(None) = row.try_get_unchecked::<Option<String>, _>(idx) {
            return Ok(JsonValue::Null);
        }
        if let Ok(Some(v)) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
            return Ok(JsonValue::String(v.to_rfc3339()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
            return Ok(JsonValue::String(v.to_string()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveDate>, _>(idx) {
            return Ok(JsonValue::String(v.to_string()));
        }
        if let Ok(Some(v)) = row.try_get::<Option<NaiveTime>, _>(idx) {
            return Ok(JsonValue::String(v.to_string()));
        }
        // Zero dates and out-of-range values keep the server's text form
        decode_text(row, idx)
    }

    fn decode_text(row: &MySqlRow, idx: usize) -> DecodeResult {
        match row.try_get::<Option<String>, _>(idx) {
            Ok(v) => Ok(v.map_or(JsonValue::Null, JsonValue::String)),
            // VARBINARY-backed strings and unknown types fall back to raw bytes
            Err(e) => decode_binary_col(row, idx).map_err(|_| e),
        }
    }
}

mod sqlite {
    use super::*;
    use sqlx::Row as _;
    use sqlx::ValueRef;

    /// SQLite typing is per value: the declared type only decides how booleans
    /// and JSON text are presented, the storage class decides everything else.
    pub fn decode_column(row: &SqliteRow, idx: usize, category: TypeCategory) -> DecodeResult {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(JsonValue::Null);
        }
        let storage = raw.type_info().name().to_lowercase();

        match (category, storage.as_str()) {
            (TypeCategory::Boolean, "integer") => decode_boolean(row, idx),
            (TypeCategory::Json, "text") => decode_json_text(row, idx),
            (_, "integer") => decode_integer(row, idx),
            (_, "real") => decode_float(row, idx),
            (_, "blob") => decode_binary_col(row, idx),
            _ => decode_text(row, idx),
        }
    }

    fn decode_integer(row: &SqliteRow, idx: usize) -> DecodeResult {
        Ok(JsonValue::Number(row.try_get::<i64, _>(idx)?.into()))
    }

    fn decode_boolean(row: &SqliteRow, idx: usize) -> DecodeResult {
        Ok(JsonValue::Bool(row.try_get::<bool, _>(idx)?))
    }

    fn decode_float(row: &SqliteRow, idx: usize) -> DecodeResult {
        Ok(float_value(row.try_get::<f64, _>(idx)?))
    }

    fn decode_binary_col(row: &SqliteRow, idx: usize) -> DecodeResult {
        Ok(encode_binary_value(&row.try_get::<Vec<u8>, _>(idx)?))
    }

    fn decode_json_text(row: &SqliteRow, idx: usize) -> DecodeResult {
        let v = row.try_get::<String, _>(idx)?;
        Ok(serde_json::from_str(&v).unwrap_or(JsonValue::String(v)))
    }

    fn decode_text(row: &SqliteRow, idx: usize) -> DecodeResult {
        Ok(JsonValue::String(row.try_get::<String, _>(idx)?))
    }
}
