//! Bidirectional type coercion between canonical values and store representations.
//!
//! Outbound coercion shapes a payload or predicate value before it is bound;
//! inbound coercion shapes a fetched row before it is returned. Both directions
//! are idempotent: applying them twice yields the same value as applying once.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Number, Value};

use crate::error::{EngineError, Result};
use crate::types::{Column, ColumnType, FindOptions, Record, Schema};

/// Timestamp layout bound to stores.
pub const OUTBOUND_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamp layout returned to callers.
pub const INBOUND_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// What a store can represent natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeCapabilities {
    pub native_boolean: bool,
    pub native_json: bool,
}

impl TypeCapabilities {
    pub const fn new(native_boolean: bool, native_json: bool) -> Self {
        Self {
            native_boolean,
            native_json,
        }
    }
}

/// Parse any of the accepted timestamp spellings into a UTC naive timestamp.
pub fn parse_datetime(input: &str) -> Option<NaiveDateTime> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(input, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn datetime_from_value(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_datetime(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc()),
        Value::Object(map) => map.get("$date").and_then(datetime_from_value),
        _ => None,
    }
}

/// Lenient boolean reading: `true`/`false`, 1/0 and their string forms.
pub fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(true),
            Some(f) if f == 0.0 => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "t" | "yes" => Some(true),
            "false" | "0" | "f" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Parse a numeric string into a JSON number, keeping integers integral.
pub fn parse_number(input: &str) -> Option<Number> {
    let input = input.trim();
    if let Ok(i) = input.parse::<i64>() {
        return Some(Number::from(i));
    }
    input
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(normalize_float)
}

/// Integral floats within the exact range become integers.
fn normalize_float(f: f64) -> Option<Number> {
    if f.fract() == 0.0 && f.abs() < 9_007_199_254_740_992.0 {
        Some(Number::from(f as i64))
    } else {
        Number::from_f64(f)
    }
}

fn invalid(column: &Column, expected: &str, value: &Value) -> EngineError {
    EngineError::InvalidValue {
        column: column.field.clone(),
        expected: expected.to_string(),
        value: match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}

/// Shape one value for binding against `column`.
pub fn coerce_outbound(column: &Column, value: &Value, caps: TypeCapabilities) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match column.column_type {
        ColumnType::Boolean => {
            let b = parse_bool(value).ok_or_else(|| invalid(column, "BOOLEAN", value))?;
            Ok(if caps.native_boolean {
                Value::Bool(b)
            } else {
                Value::from(u8::from(b))
            })
        }
        ColumnType::Date => {
            let dt = datetime_from_value(value).ok_or_else(|| invalid(column, "DATE", value))?;
            Ok(Value::String(dt.format(OUTBOUND_DATE_FORMAT).to_string()))
        }
        ColumnType::Number => match value {
            Value::Number(_) => Ok(value.clone()),
            Value::String(s) => parse_number(s)
                .map(Value::Number)
                .ok_or_else(|| invalid(column, "NUMBER", value)),
            Value::Bool(b) => Ok(Value::from(u8::from(*b))),
            _ => Err(invalid(column, "NUMBER", value)),
        },
        ColumnType::Json if !caps.native_json => match value {
            Value::Object(_) | Value::Array(_) => Ok(Value::String(value.to_string())),
            _ => Ok(value.clone()),
        },
        ColumnType::Enum => {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let allowed = &column.extra.enum_values;
            if !allowed.is_empty() && !allowed.iter().any(|v| v == &text) {
                return Err(invalid(column, &format!("one of {}", allowed.join(", ")), value));
            }
            Ok(Value::String(text))
        }
        _ => Ok(value.clone()),
    }
}

/// Shape a fetched value of `column_type` for the caller.
pub fn coerce_inbound(column_type: ColumnType, value: Value) -> Value {
    match (column_type, value) {
        (_, Value::Null) => Value::Null,
        (ColumnType::Boolean, value) => parse_bool(&value).map(Value::Bool).unwrap_or(value),
        (ColumnType::Date, value) => match datetime_from_value(&value) {
            Some(dt) => Value::String(dt.format(INBOUND_DATE_FORMAT).to_string()),
            None => value,
        },
        (ColumnType::Number, Value::String(s)) => match parse_number(&s) {
            Some(n) => Value::Number(n),
            None => Value::String(s),
        },
        (ColumnType::Number, Value::Number(n)) => match n.as_f64() {
            Some(f) if n.is_f64() => normalize_float(f).map(Value::Number).unwrap_or(Value::Number(n)),
            _ => Value::Number(n),
        },
        (ColumnType::Json, Value::String(s)) => match serde_json::from_str::<Value>(&s) {
            Ok(parsed @ (Value::Object(_) | Value::Array(_))) => parsed,
            _ => Value::String(s),
        },
        (_, value) => value,
    }
}

/// Coerce every payload field against `schema`.
///
/// Unknown fields are rejected rather than silently dropped.
pub fn coerce_record_outbound(
    schema: &Schema,
    record: &Record,
    caps: TypeCapabilities,
) -> Result<Record> {
    let mut out = Record::new();
    for (key, value) in record {
        let column = schema
            .column(key)
            .ok_or_else(|| EngineError::ColumnNotFound {
                table: schema.table.clone(),
                column: key.clone(),
            })?;
        out.insert(key.clone(), coerce_outbound(column, value, caps)?);
    }
    Ok(out)
}

/// Coerce a fetched row, resolving dotted keys through attached relation schemas.
pub fn coerce_row_inbound(options: &FindOptions, row: Record) -> Record {
    row.into_iter()
        .map(|(key, value)| {
            let value = match options.column_for(&key) {
                Some(column) => coerce_inbound(column.column_type, value),
                None => value,
            };
            (key, value)
        })
        .collect()
}

/// Coerce a row of a single table.
pub fn coerce_schema_row_inbound(schema: &Schema, row: Record) -> Record {
    row.into_iter()
        .map(|(key, value)| {
            let value = match schema.column(&key) {
                Some(column) => coerce_inbound(column.column_type, value),
                None => value,
            };
            (key, value)
        })
        .collect()
}

/// Current time in the outbound timestamp layout.
pub fn now_outbound() -> String {
    Utc::now().naive_utc().format(OUTBOUND_DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    const NO_NATIVE: TypeCapabilities = TypeCapabilities::new(false, false);
    const NATIVE: TypeCapabilities = TypeCapabilities::new(true, true);

    fn col(ty: ColumnType) -> Column {
        Column::new("c", ty)
    }

    #[rstest]
    #[case(json!(true), json!(1))]
    #[case(json!("false"), json!(0))]
    #[case(json!(1), json!(1))]
    fn test_boolean_outbound_without_native(#[case] input: Value, #[case] expected: Value) {
        assert_eq!(coerce_outbound(&col(ColumnType::Boolean), &input, NO_NATIVE).unwrap(), expected);
    }

    #[rstest]
    fn test_boolean_outbound_native() {
        let out = coerce_outbound(&col(ColumnType::Boolean), &json!("1"), NATIVE).unwrap();
        assert_eq!(out, json!(true));
    }

    #[rstest]
    #[case("2024-03-05T10:11:12.345Z", "2024-03-05 10:11:12")]
    #[case("2024-03-05 10:11:12", "2024-03-05 10:11:12")]
    #[case("2024-03-05", "2024-03-05 00:00:00")]
    #[case("2024-03-05T12:11:12+02:00", "2024-03-05 10:11:12")]
    fn test_date_outbound(#[case] input: &str, #[case] expected: &str) {
        let out = coerce_outbound(&col(ColumnType::Date), &json!(input), NO_NATIVE).unwrap();
        assert_eq!(out, json!(expected));
    }

    #[rstest]
    fn test_date_outbound_rejects_garbage() {
        let err = coerce_outbound(&col(ColumnType::Date), &json!("yesterday"), NO_NATIVE).unwrap_err();
        assert!(matches!(err, EngineError::InvalidValue { .. }));
    }

    #[rstest]
    fn test_number_outbound_parses_strings() {
        let column = col(ColumnType::Number);
        assert_eq!(coerce_outbound(&column, &json!("42"), NO_NATIVE).unwrap(), json!(42));
        assert_eq!(coerce_outbound(&column, &json!("4.5"), NO_NATIVE).unwrap(), json!(4.5));
        assert!(coerce_outbound(&column, &json!("four"), NO_NATIVE).is_err());
    }

    #[rstest]
    fn test_json_outbound_serializes_without_native() {
        let out = coerce_outbound(&col(ColumnType::Json), &json!({"a": 1}), NO_NATIVE).unwrap();
        assert_eq!(out, json!(r#"{"a":1}"#));
        let native = coerce_outbound(&col(ColumnType::Json), &json!({"a": 1}), NATIVE).unwrap();
        assert_eq!(native, json!({"a": 1}));
    }

    #[rstest]
    fn test_enum_outbound_checks_allowed_values() {
        let column = col(ColumnType::Enum).with_enum_values(["ADMIN", "USER"]);
        assert_eq!(coerce_outbound(&column, &json!("ADMIN"), NO_NATIVE).unwrap(), json!("ADMIN"));
        assert!(coerce_outbound(&column, &json!("ROOT"), NO_NATIVE).is_err());
    }

    #[rstest]
    #[case(ColumnType::Boolean, json!(1), json!(true))]
    #[case(ColumnType::Boolean, json!("false"), json!(false))]
    #[case(ColumnType::Number, json!("12.50"), json!(12.5))]
    #[case(ColumnType::Number, json!(3.0), json!(3))]
    #[case(ColumnType::Date, json!("2024-03-05 10:11:12"), json!("2024-03-05T10:11:12.000Z"))]
    #[case(ColumnType::Json, json!(r#"{"a":1}"#), json!({"a": 1}))]
    #[case(ColumnType::String, json!("12"), json!("12"))]
    #[case(ColumnType::Date, Value::Null, Value::Null)]
    fn test_inbound(#[case] ty: ColumnType, #[case] input: Value, #[case] expected: Value) {
        assert_eq!(coerce_inbound(ty, input), expected);
    }

    #[rstest]
    #[case(ColumnType::Boolean, json!(0))]
    #[case(ColumnType::Date, json!("2024-03-05 10:11:12"))]
    #[case(ColumnType::Number, json!("7"))]
    #[case(ColumnType::Json, json!("[1,2]"))]
    fn test_inbound_is_idempotent(#[case] ty: ColumnType, #[case] input: Value) {
        let once = coerce_inbound(ty, input);
        let twice = coerce_inbound(ty, once.clone());
        assert_eq!(once, twice);
    }

    #[rstest]
    fn test_outbound_is_idempotent() {
        let column = col(ColumnType::Date);
        let once = coerce_outbound(&column, &json!("2024-03-05T10:11:12Z"), NO_NATIVE).unwrap();
        let twice = coerce_outbound(&column, &once, NO_NATIVE).unwrap();
        assert_eq!(once, twice);
    }

    #[rstest]
    fn test_record_outbound_rejects_unknown_fields() {
        let schema = Schema::new("User", vec![Column::new("id", ColumnType::Number).primary()]);
        let mut record = Record::new();
        record.insert("nickname".into(), json!("x"));
        let err = coerce_record_outbound(&schema, &record, NO_NATIVE).unwrap_err();
        assert!(matches!(err, EngineError::ColumnNotFound { .. }));
    }
}
