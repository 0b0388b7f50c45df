//! Table schema and relation definitions.

use serde::{Deserialize, Serialize};

use super::column::Column;
use crate::error::{EngineError, Result};

/// A link between two tables or collections.
///
/// `org_table`/`org_column` is the side owning this entry (the schema it was
/// read from); `table`/`column` is the related side. The JOIN condition is
/// always `org_table.org_column = table.column`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub table: String,
    pub column: String,
    pub org_table: String,
    pub org_column: String,

    /// Related table's schema. Only attached when the relation is requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Box<Schema>>,
}

impl Relation {
    pub fn new(
        table: impl Into<String>,
        column: impl Into<String>,
        org_table: impl Into<String>,
        org_column: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            org_table: org_table.into(),
            org_column: org_column.into(),
            schema: None,
        }
    }

    /// The same link seen from the related table.
    pub fn reversed(&self) -> Relation {
        Relation::new(&self.org_table, &self.org_column, &self.table, &self.column)
    }

    /// Whether two relations describe the same link, ignoring attached schemas.
    pub fn same_link(&self, other: &Relation) -> bool {
        self.table == other.table
            && self.column == other.column
            && self.org_table == other.org_table
            && self.org_column == other.org_column
    }
}

/// Introspected shape of one table or collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub table: String,

    #[serde(default)]
    pub primary_key: Option<String>,

    pub columns: Vec<Column>,

    #[serde(default)]
    pub relations: Vec<Relation>,
}

impl Schema {
    /// Build a schema; the primary key is taken from the first primary-flagged column.
    pub fn new(table: impl Into<String>, columns: Vec<Column>) -> Self {
        let primary_key = columns
            .iter()
            .find(|c| c.primary_key)
            .map(|c| c.field.clone());
        Self {
            table: table.into(),
            primary_key,
            columns,
            relations: Vec::new(),
        }
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.add_relation(relation);
        self
    }

    /// Add a relation unless the same link is already present.
    pub fn add_relation(&mut self, relation: Relation) {
        if !self.relations.iter().any(|r| r.same_link(&relation)) {
            self.relations.push(relation);
        }
    }

    pub fn column(&self, field: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn has_column(&self, field: &str) -> bool {
        self.column(field).is_some()
    }

    /// Find a relation by related table name.
    pub fn relation(&self, table: &str) -> Option<&Relation> {
        self.relations
            .iter()
            .find(|r| r.table == table)
            .or_else(|| {
                self.relations
                    .iter()
                    .find(|r| r.table.eq_ignore_ascii_case(table))
            })
    }

    pub fn unique_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.unique_key)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.field.clone()).collect()
    }
}

/// Return the first primary-flagged column of a schema.
///
/// Every write and delete depends on this.
pub fn get_primary_key(schema: &Schema) -> Result<&str> {
    schema
        .columns
        .iter()
        .find(|c| c.primary_key)
        .map(|c| c.field.as_str())
        .or(schema.primary_key.as_deref())
        .ok_or_else(|| EngineError::PrimaryKeyMissing {
            table: schema.table.clone(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnType;
    use rstest::rstest;

    fn user_schema() -> Schema {
        Schema::new(
            "User",
            vec![
                Column::new("id", ColumnType::Number).primary(),
                Column::new("email", ColumnType::String).unique(),
            ],
        )
    }

    #[rstest]
    fn test_primary_key_from_columns() {
        let schema = user_schema();
        assert_eq!(schema.primary_key.as_deref(), Some("id"));
        assert_eq!(get_primary_key(&schema).unwrap(), "id");
    }

    #[rstest]
    fn test_primary_key_missing() {
        let schema = Schema::new("Log", vec![Column::new("message", ColumnType::String)]);
        let err = get_primary_key(&schema).unwrap_err();
        assert_eq!(err, EngineError::PrimaryKeyMissing { table: "Log".into() });
    }

    #[rstest]
    fn test_relation_reversed() {
        let relation = Relation::new("Customer", "custId", "SalesOrder", "custId");
        let reversed = relation.reversed();
        assert_eq!(reversed.table, "SalesOrder");
        assert_eq!(reversed.org_table, "Customer");
    }

    #[rstest]
    fn test_add_relation_skips_duplicates() {
        let mut schema = user_schema();
        schema.add_relation(Relation::new("Post", "userId", "User", "id"));
        schema.add_relation(Relation::new("Post", "userId", "User", "id"));
        assert_eq!(schema.relations.len(), 1);
    }

    #[rstest]
    fn test_relation_lookup_is_case_tolerant() {
        let schema = user_schema().with_relation(Relation::new("Post", "userId", "User", "id"));
        assert!(schema.relation("Post").is_some());
        assert!(schema.relation("post").is_some());
        assert!(schema.relation("Comment").is_none());
    }
}
