//! Typed values carried on datapool channels.

use serde::{Deserialize, Serialize};

/// The value of a single channel.
///
/// Equality is what decides whether an inbound observation counts as a change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Json(serde_json::Value),
}

impl Value {
    /// Whether this value stands for "nothing" (`Null` or a JSON `null`).
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Json(serde_json::Value::Null))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => v.fmt(f),
            Self::Int(v) => v.fmt(f),
            Self::Float(v) => v.fmt(f),
            Self::String(v) => f.write_str(v),
            Self::Json(v) => v.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_float_variant_as_number() {
        let json = serde_json::to_string(&Value::Float(21.5)).unwrap();
        assert_eq!(json, "21.5");
    }

    #[test]
    fn should_deserialize_null_as_null_variant() {
        let val: Value = serde_json::from_str("null").unwrap();
        assert_eq!(val, Value::Null);
        assert!(val.is_null());
    }

    #[test]
    fn should_deserialize_json_object_as_json_variant() {
        let val: Value = serde_json::from_str(r#"{"x": 1}"#).unwrap();
        assert!(matches!(val, Value::Json(_)));
        assert!(!val.is_null());
    }

    #[test]
    fn should_treat_json_null_as_null() {
        assert!(Value::Json(serde_json::Value::Null).is_null());
    }

    #[test]
    fn should_compare_equal_values() {
        assert_eq!(Value::from(10_i64), Value::Int(10));
        assert_ne!(Value::Int(10), Value::Int(20));
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn should_display_plain_string_without_quotes() {
        assert_eq!(Value::from("on").to_string(), "on");
    }
}
