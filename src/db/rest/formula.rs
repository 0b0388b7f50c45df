//! Predicate compilation into Airtable formula strings.

use serde_json::Value;

use crate::coercion::{coerce_outbound, TypeCapabilities};
use crate::db::document::like_to_regex;
use crate::db::escape_string_for_quote;
use crate::error::{EngineError, Result};
use crate::types::{Column, ColumnType, Operator, Predicate, Schema};

/// Record id pseudo-column every REST table exposes.
pub const RECORD_ID: &str = "id";

pub const REST_CAPS: TypeCapabilities = TypeCapabilities::new(true, true);

fn string_literal(s: &str) -> String {
    format!("'{}'", escape_string_for_quote(s, '\''))
}

fn field_ref(column: &Column) -> String {
    if column.field == RECORD_ID && column.primary_key {
        "RECORD_ID()".to_string()
    } else {
        format!("{{{}}}", column.field)
    }
}

fn literal(column: &Column, value: &Value) -> Result<String> {
    Ok(match coerce_outbound(column, value, REST_CAPS)? {
        Value::Null => "BLANK()".to_string(),
        Value::Bool(true) => "TRUE()".to_string(),
        Value::Bool(false) => "FALSE()".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => string_literal(&s),
        other => string_literal(&other.to_string()),
    })
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn required<'a>(column: &Column, value: Option<&'a Value>) -> Result<&'a Value> {
    value.filter(|v| !v.is_null()).ok_or_else(|| EngineError::InvalidValue {
        column: column.field.clone(),
        expected: "a value".to_string(),
        value: "null".to_string(),
    })
}

fn date_condition(field: &str, operator: Operator, value: &str) -> String {
    let parsed = format!("DATETIME_PARSE({value})");
    match operator {
        Operator::Equals => format!("IS_SAME({field}, {parsed}, 'second')"),
        Operator::NotEquals => format!("NOT(IS_SAME({field}, {parsed}, 'second'))"),
        Operator::Lt => format!("IS_BEFORE({field}, {parsed})"),
        Operator::Gt => format!("IS_AFTER({field}, {parsed})"),
        Operator::Lte => format!("NOT(IS_AFTER({field}, {parsed}))"),
        _ => format!("NOT(IS_BEFORE({field}, {parsed}))"),
    }
}

fn condition(column: &Column, predicate: &Predicate) -> Result<String> {
    let field = field_ref(column);
    let value = predicate.value.as_ref();
    let comparison = |op: &str| -> Result<String> {
        let bound = literal(column, required(column, value)?)?;
        if column.column_type == ColumnType::Date {
            Ok(date_condition(&field, predicate.operator, &bound))
        } else {
            Ok(format!("{field} {op} {bound}"))
        }
    };

    match predicate.operator {
        Operator::Equals | Operator::NotEquals if value.is_none_or(Value::is_null) => {
            let blank = format!("{field} = BLANK()");
            Ok(if predicate.operator == Operator::Equals {
                blank
            } else {
                format!("NOT({blank})")
            })
        }
        Operator::Equals => comparison("="),
        Operator::NotEquals => comparison("!="),
        Operator::Lt => comparison("<"),
        Operator::Lte => comparison("<="),
        Operator::Gt => comparison(">"),
        Operator::Gte => comparison(">="),
        Operator::Like | Operator::NotLike => {
            let matched = format!(
                "REGEX_MATCH({field} & '', {})",
                string_literal(&like_to_regex(&text(value)))
            );
            Ok(if predicate.operator == Operator::Like {
                matched
            } else {
                format!("NOT({matched})")
            })
        }
        Operator::Search => Ok(format!(
            "SEARCH(LOWER({}), LOWER({field} & ''))",
            string_literal(&text(value))
        )),
        Operator::In | Operator::NotIn => {
            let items = predicate
                .list_values()
                .iter()
                .map(|v| Ok(format!("{field} = {}", literal(column, v)?)))
                .collect::<Result<Vec<_>>>()?;
            Ok(match (predicate.operator, items.is_empty()) {
                (Operator::In, true) => "FALSE()".to_string(),
                (_, true) => "TRUE()".to_string(),
                (Operator::In, false) => format!("OR({})", items.join(", ")),
                (_, false) => format!("NOT(OR({}))", items.join(", ")),
            })
        }
        Operator::Null => Ok(format!("{field} = BLANK()")),
        Operator::NotNull => Ok(format!("NOT({field} = BLANK())")),
    }
}

/// Compile predicates into one formula; several are joined with `AND(..)`.
pub fn compile_formula(schema: &Schema, predicates: &[Predicate]) -> Result<Option<String>> {
    let mut conditions = Vec::with_capacity(predicates.len());
    for predicate in predicates {
        if predicate.is_relation() {
            return Err(EngineError::unsupported("airtable", "filters on linked tables"));
        }
        let column = schema
            .column(&predicate.column)
            .ok_or_else(|| EngineError::ColumnNotFound {
                table: schema.table.clone(),
                column: predicate.column.clone(),
            })?;
        conditions.push(condition(column, predicate)?);
    }
    Ok(match conditions.len() {
        0 => None,
        1 => conditions.pop(),
        _ => Some(format!("AND({})", conditions.join(", "))),
    })
}
