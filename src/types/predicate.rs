//! WHERE predicates and sort directives.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EngineError;

/// Comparison operator of a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Lt,
    Lte,
    Gt,
    Gte,
    Like,
    NotLike,
    In,
    NotIn,
    Null,
    NotNull,
    Search,
}

impl Operator {
    pub const ALL: [Operator; 13] = [
        Operator::Equals,
        Operator::NotEquals,
        Operator::Lt,
        Operator::Lte,
        Operator::Gt,
        Operator::Gte,
        Operator::Like,
        Operator::NotLike,
        Operator::In,
        Operator::NotIn,
        Operator::Null,
        Operator::NotNull,
        Operator::Search,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::Lt => "lt",
            Operator::Lte => "lte",
            Operator::Gt => "gt",
            Operator::Gte => "gte",
            Operator::Like => "like",
            Operator::NotLike => "not_like",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::Null => "null",
            Operator::NotNull => "not_null",
            Operator::Search => "search",
        }
    }

    /// `null` and `not_null` bind no value.
    pub fn takes_value(&self) -> bool {
        !matches!(self, Operator::Null | Operator::NotNull)
    }

    /// `in` and `not_in` bind a list.
    pub fn takes_list(&self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| EngineError::OperatorNotFound {
                operator: s.to_string(),
            })
    }
}

/// Split a relation-qualified reference (`Customer.companyName`) into its parts.
pub fn split_reference(reference: &str) -> Option<(&str, &str)> {
    reference.split_once('.')
}

/// One WHERE condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub column: String,
    pub operator: Operator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl Predicate {
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: Some(value.into()),
        }
    }

    pub fn equals(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(column, Operator::Equals, value)
    }

    /// A predicate without a bound value (`null` / `not_null`).
    pub fn unary(column: impl Into<String>, operator: Operator) -> Self {
        Self {
            column: column.into(),
            operator,
            value: None,
        }
    }

    /// Whether the column references a relation (`Table.column`).
    pub fn is_relation(&self) -> bool {
        self.column.contains('.')
    }

    /// Values of an `in`/`not_in` predicate: arrays are used as-is, strings are
    /// split on commas.
    pub fn list_values(&self) -> Vec<Value> {
        match &self.value {
            Some(Value::Array(items)) => items.clone(),
            Some(Value::String(s)) => s
                .split(',')
                .map(|part| Value::String(part.trim().to_string()))
                .filter(|v| v.as_str().is_some_and(|s| !s.is_empty()))
                .collect(),
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other.clone()],
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(EngineError::InvalidSort {
                value: s.to_string(),
            }),
        }
    }
}

/// One ORDER BY entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortCondition {
    pub column: String,
    pub direction: SortDirection,
}

impl SortCondition {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}
