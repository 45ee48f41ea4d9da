//! Query-related data models.
//!
//! This module defines positional parameters, the canonical result set, and the
//! statement contract the calling layer implements.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A single result row: column name to value. Its shape is decided by the query.
pub type Row = serde_json::Map<String, JsonValue>;

/// A parameter value for parameterized queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Binary data, serialized as a base64 string.
    ///
    /// Never produced by deserialization: a JSON string is always `String`.
    #[serde(serialize_with = "serialize_base64", skip_deserializing)]
    Bytes(Vec<u8>),
    /// Structured JSON document (arrays and objects)
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Json(_) => "json",
        }
    }
}

impl From<bool> for QueryParam {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for QueryParam {
    fn from(v: i32) -> Self {
        Self::Int(v.into())
    }
}

impl From<i64> for QueryParam {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for QueryParam {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for QueryParam {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for QueryParam {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for QueryParam {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<JsonValue> for QueryParam {
    fn from(v: JsonValue) -> Self {
        Self::Json(v)
    }
}

impl<T: Into<QueryParam>> From<Option<T>> for QueryParam {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

fn serialize_base64<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    serializer.serialize_str(&STANDARD.encode(bytes))
}

/// Canonical result of one buffered execution.
///
/// At most one of {`id` + `row_count` of affected rows, `rows`} is meaningful for a
/// given execution. Absent fields are omitted when serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    /// Identifier generated by an INSERT
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Number of returned rows, or rows affected by a write
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows: Option<Vec<Row>>,
}

impl ResultSet {
    /// Create an empty result (no identifier, no count, no rows).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if no field is populated.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.row_count.is_none() && self.rows.is_none()
    }

    /// Borrow the returned rows, or an empty slice for acknowledgments.
    pub fn rows(&self) -> &[Row] {
        self.rows.as_deref().unwrap_or_default()
    }
}

/// Query text plus positional arguments, ready for the driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreparedQuery {
    pub text: String,
    #[serde(default)]
    pub args: Vec<QueryParam>,
}

impl PreparedQuery {
    /// Create a prepared query without arguments.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            args: Vec::new(),
        }
    }

    /// Add a positional argument.
    pub fn with_arg(mut self, arg: impl Into<QueryParam>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// A not-yet-rendered SQL operation, as produced by the calling layer's statement
/// builder. The handler only ever consumes its rendered form.
pub trait Statement {
    /// Render the statement into query text and positional arguments.
    fn prepare_query(&self) -> PreparedQuery;
}

impl Statement for PreparedQuery {
    fn prepare_query(&self) -> PreparedQuery {
        self.clone()
    }
}
