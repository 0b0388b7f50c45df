//! Parsing and validation of flat request parameters.
//!
//! Requests arrive as `key=value` pairs. Keys of the form `column[operator]`
//! become predicates; the reserved keys carry field, relation, sort and paging
//! directives. Everything is checked against the schema before a compiler sees it.

use serde_json::Value;

use crate::coercion::{parse_bool, parse_datetime, parse_number};
use crate::error::{EngineError, Result};
use crate::types::{
    split_reference, Column, ColumnType, FindOptions, JoinType, Operator, Predicate, Schema,
    SortCondition, SortDirection,
};

/// Keys that are never interpreted as predicates.
pub const RESERVED_KEYS: [&str; 6] = ["fields", "relations", "sort", "limit", "offset", "page"];

/// Ordered `key=value` request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    pairs: Vec<(String, String)>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            pairs: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Parse `key=value` strings as given on a command line.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Self> {
        let mut params = Self::new();
        for arg in args {
            let arg = arg.as_ref();
            let (key, value) = arg.split_once('=').ok_or_else(|| EngineError::InvalidValue {
                column: arg.to_string(),
                expected: "key=value".to_string(),
                value: arg.to_string(),
            })?;
            params.insert(key.trim(), value);
        }
        Ok(params)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    /// Last value supplied for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Pairs that describe predicates.
    pub fn filters(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, _)| !RESERVED_KEYS.contains(k))
    }
}

/// A relation named in the `relations` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedRelation {
    pub table: String,
    pub join: JoinType,
}

/// Split `column[operator]` into its parts; a bare column means `equals`.
pub fn parse_key(key: &str) -> Result<(String, Operator)> {
    match key.split_once('[') {
        Some((column, rest)) => {
            let operator = rest.strip_suffix(']').unwrap_or(rest);
            Ok((column.trim().to_string(), operator.trim().parse()?))
        }
        None => Ok((key.trim().to_string(), Operator::Equals)),
    }
}

fn check_relation_reference(schema: &Schema, table: &str) -> Result<()> {
    if schema.relation(table).is_some() {
        Ok(())
    } else {
        Err(EngineError::RelationNotFound {
            table: schema.table.clone(),
            relation: table.to_string(),
        })
    }
}

fn check_reference(schema: &Schema, reference: &str) -> Result<()> {
    match split_reference(reference) {
        Some((table, _)) => check_relation_reference(schema, table),
        None if schema.has_column(reference) => Ok(()),
        None => Err(EngineError::ColumnNotFound {
            table: schema.table.clone(),
            column: reference.to_string(),
        }),
    }
}

/// Parse predicate pairs. Dotted columns only need to name a known relation
/// here; their columns are checked once the relation schema is attached.
pub fn parse_filters(schema: &Schema, params: &RequestParams) -> Result<Vec<Predicate>> {
    params
        .filters()
        .map(|(key, raw)| {
            let (column, operator) = parse_key(key)?;
            check_reference(schema, &column)?;
            Ok(if operator.takes_value() {
                Predicate::new(column, operator, raw)
            } else {
                Predicate::unary(column, operator)
            })
        })
        .collect()
}

/// Parse `column.asc,other.desc`. A bare column sorts ascending.
pub fn parse_sort(schema: &Schema, raw: &str) -> Result<Vec<SortCondition>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (column, direction) = match entry.rsplit_once('.') {
                Some((column, direction)) => (column, direction.parse::<SortDirection>()),
                None => (entry, Ok(SortDirection::Asc)),
            };
            let direction = direction.map_err(|_| EngineError::InvalidSort {
                value: entry.to_string(),
            })?;
            check_reference(schema, column)?;
            Ok(SortCondition {
                column: column.to_string(),
                direction,
            })
        })
        .collect()
}

/// Parse a `fields` list into base-table fields and `(relation, column)` pairs.
#[allow(clippy::type_complexity)]
pub fn parse_fields(schema: &Schema, raw: &str) -> Result<(Vec<String>, Vec<(String, String)>)> {
    let mut base = Vec::new();
    let mut related = Vec::new();
    for field in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        check_reference(schema, field)?;
        match split_reference(field) {
            Some((table, column)) => related.push((table.to_string(), column.to_string())),
            None => base.push(field.to_string()),
        }
    }
    Ok((base, related))
}

/// Parse `Customer,Supplier:left`.
pub fn parse_relations(schema: &Schema, raw: &str) -> Result<Vec<RequestedRelation>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (table, join) = match entry.split_once(':') {
                Some((table, join)) => (table.trim(), join.parse()?),
                None => (entry, JoinType::default()),
            };
            check_relation_reference(schema, table)?;
            Ok(RequestedRelation {
                table: table.to_string(),
                join,
            })
        })
        .collect()
}

fn check_scalar(column: &Column, value: &Value) -> Result<()> {
    let ok = match (column.column_type, value) {
        (_, Value::Null) => true,
        (ColumnType::Number, Value::Number(_)) => true,
        (ColumnType::Number, Value::String(s)) => parse_number(s).is_some(),
        (ColumnType::Number, _) => false,
        (ColumnType::Boolean, v) => parse_bool(v).is_some(),
        (ColumnType::Date, Value::String(s)) => parse_datetime(s).is_some(),
        (ColumnType::Date, Value::Number(_)) => true,
        (ColumnType::Date, _) => false,
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(EngineError::InvalidValue {
            column: column.field.clone(),
            expected: column.column_type.to_string(),
            value: match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        })
    }
}

/// Check a predicate value against its column's type.
///
/// Pattern operators are not checked; they compare textual forms.
pub fn check_predicate_value(column: &Column, predicate: &Predicate) -> Result<()> {
    match predicate.operator {
        Operator::Like | Operator::NotLike | Operator::Search => Ok(()),
        Operator::Null | Operator::NotNull => Ok(()),
        Operator::In | Operator::NotIn => predicate
            .list_values()
            .iter()
            .try_for_each(|v| check_scalar(column, v)),
        _ => match &predicate.value {
            Some(v) => check_scalar(column, v),
            None => Ok(()),
        },
    }
}

fn resolve_column<'a>(options: &'a FindOptions, reference: &str) -> Result<&'a Column> {
    options.column_for(reference).ok_or_else(|| match split_reference(reference) {
        Some((table, column)) => EngineError::ColumnNotFound {
            table: table.to_string(),
            column: column.to_string(),
        },
        None => EngineError::ColumnNotFound {
            table: options.table().to_string(),
            column: reference.to_string(),
        },
    })
}

/// Validate assembled find options: every referenced column exists (relation
/// references through their attached schema) and every value fits its type.
pub fn validate_find(options: &FindOptions) -> Result<()> {
    for predicate in &options.filters {
        let column = resolve_column(options, &predicate.column)?;
        check_predicate_value(column, predicate)?;
    }
    for sort in &options.sort {
        resolve_column(options, &sort.column)?;
    }
    for field in &options.fields {
        resolve_column(options, field)?;
    }
    for request in &options.relations {
        for field in &request.fields {
            if request.schema().is_some_and(|s| !s.has_column(field)) {
                return Err(EngineError::ColumnNotFound {
                    table: request.table().to_string(),
                    column: field.clone(),
                });
            }
        }
    }
    Ok(())
}
