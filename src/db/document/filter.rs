//! Predicate compilation into filter documents.
//!
//! Filters, sorts and payloads are expressed as extended JSON: object ids as
//! `{"$oid": ..}`, timestamps as `{"$date": ..}`. The store driver converts
//! them to its native representation.

use serde_json::{json, Map, Value};

use crate::coercion::{coerce_outbound, parse_datetime, TypeCapabilities, INBOUND_DATE_FORMAT};
use crate::error::{EngineError, Result};
use crate::types::{Column, ColumnType, Operator, Predicate, Record, Schema, SortCondition, SortDirection};

/// Native type name recorded for object id columns.
pub const OBJECT_ID: &str = "objectId";

/// Document stores keep booleans and nested values as they are.
pub const DOCUMENT_CAPS: TypeCapabilities = TypeCapabilities::new(true, true);

pub fn is_object_id(s: &str) -> bool {
    s.len() == 24 && hex::decode(s).is_ok()
}

/// Shape a caller value for storage or comparison against `column`.
pub fn to_document_value(column: &Column, value: &Value) -> Result<Value> {
    if column.native_type() == Some(OBJECT_ID) {
        return match value {
            Value::Null => Ok(Value::Null),
            Value::String(s) if is_object_id(s) => Ok(json!({ "$oid": s.to_ascii_lowercase() })),
            Value::Object(map) if map.contains_key("$oid") => Ok(value.clone()),
            other => Err(EngineError::InvalidValue {
                column: column.field.clone(),
                expected: "a 24 character hex object id".to_string(),
                value: match other {
                    Value::String(s) => s.clone(),
                    v => v.to_string(),
                },
            }),
        };
    }
    let coerced = coerce_outbound(column, value, DOCUMENT_CAPS)?;
    if column.column_type == ColumnType::Date {
        if let Some(dt) = coerced.as_str().and_then(parse_datetime) {
            return Ok(json!({ "$date": dt.format(INBOUND_DATE_FORMAT).to_string() }));
        }
    }
    Ok(coerced)
}

/// Shape a payload. Fields missing from the inferred schema pass through unchanged.
pub fn to_document(schema: &Schema, record: &Record) -> Result<Record> {
    record
        .iter()
        .map(|(key, value)| {
            let value = match schema.column(key) {
                Some(column) => to_document_value(column, value)?,
                None => value.clone(),
            };
            Ok((key.clone(), value))
        })
        .collect()
}

/// Translate a SQL `LIKE` pattern into an anchored regular expression.
pub fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');
    let mut literal = String::new();
    for c in pattern.chars() {
        match c {
            '%' | '_' => {
                regex.push_str(&regex::escape(&literal));
                literal.clear();
                regex.push_str(if c == '%' { ".*" } else { "." });
            }
            c => literal.push(c),
        }
    }
    regex.push_str(&regex::escape(&literal));
    regex.push('$');
    regex
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn operator(name: &str, value: Value) -> Value {
    let mut clause = Map::new();
    clause.insert(name.to_string(), value);
    Value::Object(clause)
}

fn condition(column: &Column, predicate: &Predicate) -> Result<Value> {
    let bound = |value: &Value| to_document_value(column, value);
    let value = predicate.value.as_ref();
    Ok(match predicate.operator {
        Operator::Equals => match value {
            Some(v) => bound(v)?,
            None => Value::Null,
        },
        Operator::NotEquals => json!({ "$ne": bound(value.unwrap_or(&Value::Null))? }),
        Operator::Lt | Operator::Lte | Operator::Gt | Operator::Gte => {
            let value = value.filter(|v| !v.is_null()).ok_or_else(|| EngineError::InvalidValue {
                column: column.field.clone(),
                expected: "a value".to_string(),
                value: "null".to_string(),
            })?;
            let op = match predicate.operator {
                Operator::Lt => "$lt",
                Operator::Lte => "$lte",
                Operator::Gt => "$gt",
                _ => "$gte",
            };
            operator(op, bound(value)?)
        }
        Operator::Like => json!({ "$regex": like_to_regex(&text(value)) }),
        Operator::NotLike => json!({ "$not": { "$regex": like_to_regex(&text(value)) } }),
        Operator::Search => json!({ "$regex": regex::escape(&text(value)), "$options": "i" }),
        Operator::In | Operator::NotIn => {
            let items = predicate
                .list_values()
                .iter()
                .map(bound)
                .collect::<Result<Vec<_>>>()?;
            let op = if predicate.operator == Operator::In { "$in" } else { "$nin" };
            operator(op, Value::Array(items))
        }
        Operator::Null => Value::Null,
        Operator::NotNull => json!({ "$ne": null }),
    })
}

/// Compile predicates into one filter document; several predicates are joined with `$and`.
pub fn compile_filter(schema: &Schema, predicates: &[Predicate]) -> Result<Record> {
    let mut clauses = Vec::with_capacity(predicates.len());
    for predicate in predicates {
        if predicate.is_relation() {
            return Err(EngineError::unsupported("document store", "filters on related collections"));
        }
        let column = schema
            .column(&predicate.column)
            .ok_or_else(|| EngineError::ColumnNotFound {
                table: schema.table.clone(),
                column: predicate.column.clone(),
            })?;
        let mut clause = Map::new();
        clause.insert(predicate.column.clone(), condition(column, predicate)?);
        clauses.push(Value::Object(clause));
    }

    Ok(match clauses.len() {
        0 => Record::new(),
        1 => match clauses.pop() {
            Some(Value::Object(clause)) => clause,
            _ => Record::new(),
        },
        _ => {
            let mut filter = Record::new();
            filter.insert("$and".to_string(), Value::Array(clauses));
            filter
        }
    })
}

/// Sort specification; relation-qualified columns are dropped.
pub fn compile_sort(sort: &[SortCondition]) -> Vec<(String, i32)> {
    sort.iter()
        .filter(|s| !s.column.contains('.'))
        .map(|s| {
            let direction = match s.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            };
            (s.column.clone(), direction)
        })
        .collect()
}
