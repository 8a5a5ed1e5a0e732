//! A single typed-or-null cell.

use serde::{Deserialize, Serialize};

use crate::value::SqlValue;

/// One scalar value within a row.
///
/// Accessors are lenient the way dynamically typed result sets usually need:
/// integers read as reals, numeric text parses, integers read as booleans.
/// `None` means the stored value cannot be viewed as the requested type;
/// a database NULL is visible through [`Cell::is_null`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cell {
    value: SqlValue,
}

impl Cell {
    pub fn new(value: impl Into<SqlValue>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// A database NULL cell.
    pub fn null() -> Self {
        Self {
            value: SqlValue::Null,
        }
    }

    pub fn value(&self) -> &SqlValue {
        &self.value
    }

    pub fn into_value(self) -> SqlValue {
        self.value
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn as_integer(&self) -> Option<i64> {
        match &self.value {
            SqlValue::Integer(v) => Some(*v),
            SqlValue::Real(v) => Some(*v as i64),
            SqlValue::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match &self.value {
            SqlValue::Real(v) => Some(*v),
            SqlValue::Integer(v) => Some(*v as f64),
            SqlValue::Text(v) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            SqlValue::Text(v) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match &self.value {
            SqlValue::Blob(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.value {
            SqlValue::Integer(v) => Some(*v != 0),
            SqlValue::Text(v) => match v.trim() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// Convert to a JSON value (blobs become base64 strings).
    pub fn to_json(&self) -> serde_json::Value {
        self.value.to_json()
    }
}

impl From<SqlValue> for Cell {
    fn from(value: SqlValue) -> Self {
        Self { value }
    }
}

impl std::fmt::Display for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}
