//! Scalar column types and cell values.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Scalar type of a column, mapped one-to-one onto a PostgreSQL type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    BigInt,
    Double,
    Text,
    Boolean,
    /// Timestamp with time zone, supplied as an RFC 3339 string.
    Timestamp,
}

impl ColumnType {
    /// The PostgreSQL type name used in DDL.
    pub fn sql_name(&self) -> &'static str {
        match self {
            ColumnType::Integer => "INTEGER",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Text => "TEXT",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Timestamp => "TIMESTAMPTZ",
        }
    }

    /// Whether a non-null value can be stored in a column of this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (ColumnType::Integer, Value::Int(v)) => i32::try_from(*v).is_ok(),
            (ColumnType::BigInt, Value::Int(_)) => true,
            (ColumnType::Double, Value::Int(_) | Value::Float(_)) => true,
            (ColumnType::Text, Value::Text(_)) => true,
            (ColumnType::Boolean, Value::Bool(_)) => true,
            (ColumnType::Timestamp, Value::Text(s)) => {
                chrono::DateTime::parse_from_rfc3339(s).is_ok()
            }
            _ => false,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// A single cell value as delivered by a producer.
///
/// Deserializes from plain JSON scalars. Floats compare and hash by bit
/// pattern so values can key a seen-set during deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Text(a), Value::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Null => {}
            Value::Bool(v) => v.hash(state),
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Text(v) => v.hash(state),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// Describe a value that a column type rejected, for error messages.
pub(crate) fn describe_mismatch(column: &str, expected: ColumnType, value: &Value) -> String {
    format!(
        "column '{column}' expects {expected}, got {} {value}",
        value.kind()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_deserialize_json_scalars() {
        let values: Vec<Value> = serde_json::from_str(r#"[null, true, 7, 2.5, "x"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Bool(true),
                Value::Int(7),
                Value::Float(2.5),
                Value::Text("x".into()),
            ]
        );
    }

    #[test]
    fn test_int_and_float_are_distinct_keys() {
        let mut seen = HashSet::new();
        assert!(seen.insert(Value::Int(1)));
        assert!(seen.insert(Value::Float(1.0)));
        assert!(!seen.insert(Value::Int(1)));
    }

    #[test]
    fn test_nan_hashes_consistently() {
        let mut seen = HashSet::new();
        assert!(seen.insert(Value::Float(f64::NAN)));
        assert!(!seen.insert(Value::Float(f64::NAN)));
    }

    #[test]
    fn test_integer_range_checked() {
        assert!(ColumnType::Integer.accepts(&Value::Int(42)));
        assert!(!ColumnType::Integer.accepts(&Value::Int(i64::from(i32::MAX) + 1)));
        assert!(ColumnType::BigInt.accepts(&Value::Int(i64::MAX)));
    }

    #[test]
    fn test_timestamp_requires_rfc3339() {
        assert!(ColumnType::Timestamp.accepts(&Value::from("2024-03-01T10:00:00Z")));
        assert!(!ColumnType::Timestamp.accepts(&Value::from("yesterday")));
    }

    #[test]
    fn test_null_accepted_by_every_type() {
        for ty in [
            ColumnType::Integer,
            ColumnType::BigInt,
            ColumnType::Double,
            ColumnType::Text,
            ColumnType::Boolean,
            ColumnType::Timestamp,
        ] {
            assert!(ty.accepts(&Value::Null));
        }
    }

    #[test]
    fn test_column_type_from_yaml() {
        let ty: ColumnType = serde_yaml::from_str("bigint").unwrap();
        assert_eq!(ty, ColumnType::BigInt);
    }
}
