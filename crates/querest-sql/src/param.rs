//! SQL parameter values.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A value bound to a `$n` placeholder.
///
/// Serializes untagged, so a parameter list renders as plain JSON values
/// (`[1, "active", [1, 2, 3]]`) ready to hand to a PostgreSQL client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlParam {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit integer
    Int(i64),
    /// 64-bit float (numeric filter values)
    Float(f64),
    /// Text string
    Text(String),
    /// JSON value
    Json(JsonValue),
    /// Array parameter, bound as a whole to one placeholder
    Array(Vec<SqlParam>),
}

impl SqlParam {
    /// Create a text parameter.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Create an integer parameter.
    pub fn int(n: i64) -> Self {
        Self::Int(n)
    }

    /// Coerce a raw query-string scalar.
    ///
    /// Integer-parseable strings become integers, decimal-parseable ones
    /// become floats, anything else stays text.
    pub fn coerce(s: &str) -> Self {
        if let Ok(n) = s.parse::<i64>() {
            return Self::Int(n);
        }
        if looks_numeric(s) {
            if let Ok(f) = s.parse::<f64>() {
                if f.is_finite() {
                    return Self::Float(f);
                }
            }
        }
        Self::Text(s.to_string())
    }

    /// Coerce a list of raw scalars into one array parameter.
    pub fn coerce_list(items: &[String]) -> Self {
        Self::Array(items.iter().map(|s| Self::coerce(s)).collect())
    }

    /// Check if this is a NULL value.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the PostgreSQL type name for this parameter.
    pub fn pg_type(&self) -> &'static str {
        match self {
            Self::Null => "unknown",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "bigint",
            Self::Float(_) => "double precision",
            Self::Text(_) => "text",
            Self::Json(_) => "jsonb",
            Self::Array(arr) => match arr.first() {
                Some(Self::Int(_)) => "bigint[]",
                Some(Self::Float(_)) => "double precision[]",
                Some(Self::Bool(_)) => "boolean[]",
                _ => "text[]",
            },
        }
    }
}

// Guards f64::from_str from accepting "nan", "inf" and friends.
fn looks_numeric(s: &str) -> bool {
    !s.is_empty()
        && s.contains(|c: char| c.is_ascii_digit())
        && s.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}

impl From<String> for SqlParam {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for SqlParam {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i32> for SqlParam {
    fn from(n: i32) -> Self {
        Self::Int(n as i64)
    }
}

impl From<i64> for SqlParam {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<u64> for SqlParam {
    fn from(n: u64) -> Self {
        Self::Int(n as i64)
    }
}

impl From<f64> for SqlParam {
    fn from(n: f64) -> Self {
        Self::Float(n)
    }
}

impl From<bool> for SqlParam {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<JsonValue> for SqlParam {
    fn from(v: JsonValue) -> Self {
        Self::Json(v)
    }
}

impl From<Vec<String>> for SqlParam {
    fn from(v: Vec<String>) -> Self {
        Self::Array(v.into_iter().map(SqlParam::Text).collect())
    }
}

impl<T: Into<SqlParam>> From<Option<T>> for SqlParam {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}
