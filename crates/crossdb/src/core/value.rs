//! SQL value type shared by bind parameters and result rows.
//!
//! Both backends convert their native values to and from [`SqlValue`], so
//! application code sees the same representation whichever dialect is
//! active.

use std::fmt;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::NaiveDateTime;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Text format used for DATETIME values in logs and dump files.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// SQL value enum for type-safe parameter and row handling.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SqlValue {
    /// SQL NULL.
    #[default]
    Null,

    /// Any integer type (BIGINT, INT, TINYINT).
    Int(i64),

    /// Floating point (only produced when reading native float columns).
    Float(f64),

    /// Exact numeric (DECIMAL / NUMBER with scale).
    Decimal(Decimal),

    /// Character data (VARCHAR, CHAR, TEXT, LONGTEXT / CLOB).
    Text(String),

    /// Binary data (BLOB).
    Bytes(Vec<u8>),

    /// Timestamp without timezone.
    DateTime(NaiveDateTime),
}

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// True for the empty string, which some dialects cannot tell from NULL.
    #[must_use]
    pub fn is_empty_text(&self) -> bool {
        matches!(self, SqlValue::Text(s) if s.is_empty())
    }

    /// Integer view of the value.
    ///
    /// Text is parsed, since MySQL's text protocol and Oracle's NUMBER both
    /// surface integers that way in some paths.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            SqlValue::Decimal(d) if d.fract().is_zero() => d.to_i64(),
            SqlValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Borrow the value as a string slice when it is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the value as bytes when it is binary.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            SqlValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Convert to the JSON representation used by dump files.
    ///
    /// Decimals and datetimes become strings so no precision is lost;
    /// binary data becomes a base64 string.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Int(v) => Value::from(*v),
            SqlValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::Decimal(d) => Value::String(d.to_string()),
            SqlValue::Text(s) => Value::String(s.clone()),
            SqlValue::Bytes(b) => Value::String(BASE64.encode(b)),
            SqlValue::DateTime(dt) => Value::String(dt.format(DATETIME_FORMAT).to_string()),
        }
    }

    /// Short, single-line rendering for query logs.
    pub fn display_truncated(&self, max_len: usize) -> String {
        if let SqlValue::Bytes(b) = self {
            return format!("<{} bytes>", b.len());
        }
        let full = self.to_string();
        if full.chars().count() <= max_len {
            full
        } else {
            let cut: String = full.chars().take(max_len).collect();
            format!("{}...", cut)
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Int(v) => write!(f, "{}", v),
            SqlValue::Float(v) => write!(f, "{}", v),
            SqlValue::Decimal(v) => write!(f, "{}", v),
            SqlValue::Text(v) => write!(f, "{}", v),
            SqlValue::Bytes(v) => write!(f, "{}", BASE64.encode(v)),
            SqlValue::DateTime(v) => write!(f, "{}", v.format(DATETIME_FORMAT)),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<Decimal> for SqlValue {
    fn from(v: Decimal) -> Self {
        SqlValue::Decimal(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<&[u8]> for SqlValue {
    fn from(v: &[u8]) -> Self {
        SqlValue::Bytes(v.to_vec())
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}
