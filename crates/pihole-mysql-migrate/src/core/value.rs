//! Value types flowing through the migration pipeline.
//!
//! [`SourceValue`] is a raw cell as SQLite stored it (one of its five storage
//! classes). [`SqlValue`] is a cell after coercion to its declared destination
//! type, ready to be bound into an INSERT.

use chrono::NaiveDateTime;

/// A raw SQLite cell.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl SourceValue {
    /// SQLite storage class name, for error messages.
    pub fn storage_class(&self) -> &'static str {
        match self {
            SourceValue::Null => "NULL",
            SourceValue::Integer(_) => "INTEGER",
            SourceValue::Real(_) => "REAL",
            SourceValue::Text(_) => "TEXT",
            SourceValue::Blob(_) => "BLOB",
        }
    }
}

impl From<i64> for SourceValue {
    fn from(v: i64) -> Self {
        SourceValue::Integer(v)
    }
}

impl From<f64> for SourceValue {
    fn from(v: f64) -> Self {
        SourceValue::Real(v)
    }
}

impl From<&str> for SourceValue {
    fn from(v: &str) -> Self {
        SourceValue::Text(v.to_string())
    }
}

impl<T: Into<SourceValue>> From<Option<T>> for SourceValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SourceValue::Null)
    }
}

/// One row returned by the source load query, in query column order.
pub type SourceRow = Vec<SourceValue>;

/// A typed destination value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL of any destination type.
    Null,

    /// 64-bit signed integer.
    Int(i64),

    /// Timestamp without timezone (UTC).
    DateTime(NaiveDateTime),

    /// Text data.
    Text(String),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    pub fn into_int(self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_datetime(self) -> Option<NaiveDateTime> {
        match self {
            SqlValue::DateTime(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            SqlValue::Text(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Option<i64>> for SqlValue {
    fn from(v: Option<i64>) -> Self {
        v.map(SqlValue::Int).unwrap_or(SqlValue::Null)
    }
}

impl From<Option<NaiveDateTime>> for SqlValue {
    fn from(v: Option<NaiveDateTime>) -> Self {
        v.map(SqlValue::DateTime).unwrap_or(SqlValue::Null)
    }
}

impl From<Option<String>> for SqlValue {
    fn from(v: Option<String>) -> Self {
        v.map(SqlValue::Text).unwrap_or(SqlValue::Null)
    }
}
