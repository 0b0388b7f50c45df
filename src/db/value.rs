//! Bound parameter values and lenient value extraction.
//!
//! `SqlValue` is what the SQL compiler binds. The `DatabaseValue` trait reads
//! catalog and result values uniformly regardless of how a driver surfaced
//! them (a nullable flag may arrive as `"YES"`, `1` or `true`).

use std::fmt::{self, Debug};

use serde_json::Value;

/// A parameter bound to a compiled statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SqlValue {
    /// Textual form used by drivers that bind every parameter as text.
    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Bool(b) => Some(b.to_string()),
            SqlValue::Int(i) => Some(i.to_string()),
            SqlValue::Float(f) => Some(f.to_string()),
            SqlValue::Text(s) => Some(s.clone()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Bool(*b),
            SqlValue::Int(i) => Value::from(*i),
            SqlValue::Float(f) => Value::from(*f),
            SqlValue::Text(s) => Value::String(s.clone()),
        }
    }
}

impl From<&Value> for SqlValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => SqlValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            other => SqlValue::Text(other.to_string()),
        }
    }
}

impl From<Value> for SqlValue {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => SqlValue::Text(s),
            other => SqlValue::from(&other),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Bool(b) => write!(f, "{b}"),
            SqlValue::Int(i) => write!(f, "{i}"),
            SqlValue::Float(v) => write!(f, "{v}"),
            SqlValue::Text(s) => write!(f, "'{s}'"),
        }
    }
}

/// Trait for values that can be extracted to Rust types.
pub trait DatabaseValue: Clone + Debug {
    /// String form, `None` for null.
    fn as_string(&self) -> Option<String>;

    fn as_i64(&self) -> Option<i64>;

    fn as_f64(&self) -> Option<f64>;

    fn as_bool(&self) -> Option<bool>;

    /// Type name for diagnostics.
    fn type_name(&self) -> &'static str;

    fn as_i64_or(&self, default: i64) -> i64 {
        self.as_i64().unwrap_or(default)
    }

    fn as_string_or(&self, default: &str) -> String {
        self.as_string().unwrap_or_else(|| default.to_string())
    }

    fn as_bool_or(&self, default: bool) -> bool {
        self.as_bool().unwrap_or(default)
    }
}

impl DatabaseValue for Value {
    fn as_string(&self) -> Option<String> {
        match self {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().map(|f| f as i64))
            }
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => n.as_i64().map(|i| i != 0),
            Value::String(s) => match s.trim().to_ascii_uppercase().as_str() {
                "YES" | "Y" | "TRUE" | "T" | "1" => Some(true),
                "NO" | "N" | "FALSE" | "F" | "0" | "" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl DatabaseValue for SqlValue {
    fn as_string(&self) -> Option<String> {
        self.as_text()
    }

    fn as_i64(&self) -> Option<i64> {
        self.to_json().as_i64()
    }

    fn as_f64(&self) -> Option<f64> {
        DatabaseValue::as_f64(&self.to_json())
    }

    fn as_bool(&self) -> Option<bool> {
        DatabaseValue::as_bool(&self.to_json())
    }

    fn type_name(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Int(_) => "int",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!("YES"), Some(true))]
    #[case(json!("NO"), Some(false))]
    #[case(json!(1), Some(true))]
    #[case(json!("maybe"), None)]
    fn test_json_as_bool(#[case] value: Value, #[case] expected: Option<bool>) {
        assert_eq!(DatabaseValue::as_bool(&value), expected);
    }

    #[rstest]
    #[case(json!(42), Some(42))]
    #[case(json!("42"), Some(42))]
    #[case(json!("3.0"), Some(3))]
    #[case(json!(null), None)]
    fn test_json_as_i64(#[case] value: Value, #[case] expected: Option<i64>) {
        assert_eq!(DatabaseValue::as_i64(&value), expected);
    }

    #[rstest]
    fn test_defaults() {
        assert_eq!(Value::Null.as_string_or("none"), "none");
        assert_eq!(Value::Null.as_i64_or(7), 7);
        assert!(Value::Null.as_bool_or(true));
    }

    #[rstest]
    fn test_sql_value_from_json() {
        assert_eq!(SqlValue::from(&json!(3)), SqlValue::Int(3));
        assert_eq!(SqlValue::from(&json!(2.5)), SqlValue::Float(2.5));
        assert_eq!(SqlValue::from(&json!({"a": 1})), SqlValue::Text(r#"{"a":1}"#.into()));
        assert_eq!(SqlValue::from(json!(null)), SqlValue::Null);
    }

    #[rstest]
    fn test_sql_value_text_form() {
        assert_eq!(SqlValue::Bool(true).as_text().as_deref(), Some("true"));
        assert_eq!(SqlValue::Null.as_text(), None);
        assert_eq!(SqlValue::Text("x".into()).to_string(), "'x'");
    }
}
