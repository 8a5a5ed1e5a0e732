//! Dynamically typed scalar values.
//!
//! `SqlValue` is the tagged union flowing between providers, parameters and
//! materialized cells. `Null` is a real variant, so a database NULL is never
//! confused with an absent column.

use serde::{Deserialize, Serialize};

/// A single database value of any supported column type.
///
/// The variants mirror the storage classes of the bundled SQLite provider;
/// richer drivers map their native types onto the closest variant. Booleans
/// are carried as integers (0/1) and read back through [`crate::table::Cell`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    #[serde(with = "base64_blob")]
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Get a human-readable type name for this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Integer(_) => "integer",
            Self::Real(_) => "real",
            Self::Text(_) => "text",
            Self::Blob(_) => "blob",
        }
    }

    /// Check if this value is a database NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Convert to a JSON value. Blobs become base64 strings; non-finite
    /// reals have no JSON representation and become null.
    pub fn to_json(&self) -> serde_json::Value {
        use base64::{Engine as _, engine::general_purpose::STANDARD};

        match self {
            Self::Null => serde_json::Value::Null,
            Self::Integer(v) => serde_json::Value::Number((*v).into()),
            Self::Real(v) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Text(v) => serde_json::Value::String(v.clone()),
            Self::Blob(v) => serde_json::Value::String(STANDARD.encode(v)),
        }
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Real(v) => write!(f, "{}", v),
            Self::Text(v) => write!(f, "{}", v),
            Self::Blob(v) => {
                write!(f, "x'")?;
                for byte in v {
                    write!(f, "{:02X}", byte)?;
                }
                write!(f, "'")
            }
        }
    }
}

impl Default for SqlValue {
    fn default() -> Self {
        Self::Null
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<&[u8]> for SqlValue {
    fn from(v: &[u8]) -> Self {
        Self::Blob(v.to_vec())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}

/// Serde helper for base64-encoded blob values.
mod base64_blob {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(SqlValue::Null.type_name(), "null");
        assert_eq!(SqlValue::Integer(1).type_name(), "integer");
        assert_eq!(SqlValue::Real(1.5).type_name(), "real");
        assert_eq!(SqlValue::Text("x".into()).type_name(), "text");
        assert_eq!(SqlValue::Blob(vec![0]).type_name(), "blob");
    }

    #[test]
    fn test_is_null() {
        assert!(SqlValue::Null.is_null());
        assert!(!SqlValue::Integer(0).is_null());
    }

    #[test]
    fn test_from_conversions() {
        assert_eq!(SqlValue::from(7i64), SqlValue::Integer(7));
        assert_eq!(SqlValue::from(7i32), SqlValue::Integer(7));
        assert_eq!(SqlValue::from(true), SqlValue::Integer(1));
        assert_eq!(SqlValue::from(2.5), SqlValue::Real(2.5));
        assert_eq!(SqlValue::from("abc"), SqlValue::Text("abc".into()));
        assert_eq!(
            SqlValue::from(vec![1u8, 2]),
            SqlValue::Blob(vec![1, 2])
        );
        assert_eq!(SqlValue::from(None::<i64>), SqlValue::Null);
        assert_eq!(SqlValue::from(Some(3i64)), SqlValue::Integer(3));
    }

    #[test]
    fn test_to_json() {
        assert_eq!(SqlValue::Null.to_json(), serde_json::Value::Null);
        assert_eq!(SqlValue::Integer(4).to_json(), serde_json::json!(4));
        assert_eq!(SqlValue::Text("a".into()).to_json(), serde_json::json!("a"));
        // base64 of [104, 105] = "aGk="
        assert_eq!(
            SqlValue::Blob(b"hi".to_vec()).to_json(),
            serde_json::json!("aGk=")
        );
        assert_eq!(
            SqlValue::Real(f64::NAN).to_json(),
            serde_json::Value::Null
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(SqlValue::Null.to_string(), "NULL");
        assert_eq!(SqlValue::Integer(12).to_string(), "12");
        assert_eq!(SqlValue::Text("hey".into()).to_string(), "hey");
        assert_eq!(SqlValue::Blob(vec![0xAB, 0x01]).to_string(), "x'AB01'");
    }

    #[test]
    fn test_serde_untagged_roundtrip() {
        let json = serde_json::to_string(&SqlValue::Integer(9)).unwrap();
        assert_eq!(json, "9");
        let back: SqlValue = serde_json::from_str("9").unwrap();
        assert_eq!(back, SqlValue::Integer(9));

        let null: SqlValue = serde_json::from_str("null").unwrap();
        assert!(null.is_null());
    }
}
