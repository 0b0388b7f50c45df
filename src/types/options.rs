//! Operation inputs handed to a `Datasource`.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::column::Column;
use super::predicate::{split_reference, Predicate, SortCondition};
use super::response::Record;
use super::schema::{Relation, Schema};
use crate::error::EngineError;

/// Page size used when neither configuration nor the caller supplies one.
pub const DEFAULT_LIMIT: u64 = 20;

/// JOIN flavour used to attach a relation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
}

impl JoinType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
        }
    }
}

impl FromStr for JoinType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "inner" => Ok(JoinType::Inner),
            "left" => Ok(JoinType::Left),
            "right" => Ok(JoinType::Right),
            other => Err(EngineError::InvalidValue {
                column: "join".to_string(),
                expected: "inner, left or right".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// A relation the caller asked to expand.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationRequest {
    /// The relation with its schema attached.
    pub relation: Relation,
    pub join: JoinType,
    /// Columns of the related table to project; empty means all.
    pub fields: Vec<String>,
}

impl RelationRequest {
    pub fn new(relation: Relation) -> Self {
        Self {
            relation,
            join: JoinType::default(),
            fields: Vec::new(),
        }
    }

    pub fn with_join(mut self, join: JoinType) -> Self {
        self.join = join;
        self
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn table(&self) -> &str {
        &self.relation.table
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.relation.schema.as_deref()
    }

    /// True when the join column is the related table's primary key, so each
    /// parent row matches at most one related row.
    pub fn is_to_one(&self) -> bool {
        match self.schema() {
            Some(schema) => schema.primary_key.as_deref() == Some(self.relation.column.as_str()),
            None => true,
        }
    }

    /// Columns to project from the related table.
    pub fn projected_columns(&self) -> Vec<&Column> {
        let Some(schema) = self.schema() else {
            return Vec::new();
        };
        if self.fields.is_empty() {
            schema.columns.iter().collect()
        } else {
            self.fields.iter().filter_map(|f| schema.column(f)).collect()
        }
    }
}

/// Input to `find_one`, `find_many` and `find_total_records`.
#[derive(Debug, Clone, PartialEq)]
pub struct FindOptions {
    pub schema: Schema,
    /// Base-table fields to project; empty means all columns.
    pub fields: Vec<String>,
    pub filters: Vec<Predicate>,
    pub relations: Vec<RelationRequest>,
    pub sort: Vec<SortCondition>,
    pub limit: u64,
    pub offset: u64,
}

impl FindOptions {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            fields: Vec::new(),
            filters: Vec::new(),
            relations: Vec::new(),
            sort: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_filter(mut self, predicate: Predicate) -> Self {
        self.filters.push(predicate);
        self
    }

    pub fn with_filters(mut self, predicates: Vec<Predicate>) -> Self {
        self.filters.extend(predicates);
        self
    }

    pub fn with_relation(mut self, relation: RelationRequest) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortCondition>) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_page(mut self, limit: u64, offset: u64) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    pub fn table(&self) -> &str {
        &self.schema.table
    }

    /// Base-table columns to project.
    pub fn projected_columns(&self) -> Vec<&Column> {
        if self.fields.is_empty() {
            self.schema.columns.iter().collect()
        } else {
            self.fields
                .iter()
                .filter_map(|f| self.schema.column(f))
                .collect()
        }
    }

    pub fn relation_request(&self, table: &str) -> Option<&RelationRequest> {
        self.relations.iter().find(|r| r.table() == table)
    }

    /// Resolve a plain or relation-qualified reference to its column definition.
    pub fn column_for(&self, reference: &str) -> Option<&Column> {
        match split_reference(reference) {
            Some((table, column)) => self
                .relation_request(table)
                .and_then(|r| r.schema())
                .and_then(|s| s.column(column)),
            None => self.schema.column(reference),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateOneOptions {
    pub schema: Schema,
    pub data: Record,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOneOptions {
    pub schema: Schema,
    /// Primary key value of the target row.
    pub id: serde_json::Value,
    pub data: Record,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteOneOptions {
    pub schema: Schema,
    pub id: serde_json::Value,
    /// When set, the row is kept and this column receives the deletion time.
    pub soft_delete: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UniqueCheckOptions {
    pub schema: Schema,
    pub data: Record,
    /// Row being updated, excluded from the duplicate count.
    pub id: Option<serde_json::Value>,
}
