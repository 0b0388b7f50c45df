//! Catalog rows to [`Schema`].
//!
//! Every dialect's catalog queries alias their output to the same column
//! names, so one mapper turns them into canonical columns and relations.

use log::trace;
use serde_json::Value;

use crate::coercion::parse_number;
use crate::db::escape::quoted_literals;
use crate::db::value::DatabaseValue;
use crate::error::{EngineError, Result};
use crate::types::{Column, ColumnType, Record, Relation, Schema};

use super::dialect::{Dialect, SqlDialect};

static NULL: Value = Value::Null;

fn cell<'a>(row: &'a Record, key: &str) -> &'a Value {
    row.get(key).unwrap_or(&NULL)
}

/// Assemble a schema from the three catalog result sets.
pub fn build_schema(
    dialect: &SqlDialect,
    table: &str,
    column_rows: &[Record],
    forward_rows: &[Record],
    backward_rows: &[Record],
) -> Result<Schema> {
    let mut columns: Vec<Column> = column_rows
        .iter()
        .filter_map(|row| column_from_row(dialect, row))
        .collect();
    if columns.is_empty() {
        return Err(EngineError::SchemaNotFound {
            table: table.to_string(),
        });
    }

    let forward: Vec<Relation> = forward_rows
        .iter()
        .filter_map(|row| relation_from_row(table, row))
        .collect();
    for relation in &forward {
        if let Some(column) = columns.iter_mut().find(|c| c.field == relation.org_column) {
            column.foreign_key = true;
        }
    }

    let mut schema = Schema::new(table, columns);
    for relation in forward {
        schema.add_relation(relation);
    }
    for relation in backward_rows
        .iter()
        .filter_map(|row| relation_from_row(table, row))
    {
        schema.add_relation(relation);
    }
    trace!(
        "catalog {}: {} columns, {} relations",
        table,
        schema.columns.len(),
        schema.relations.len()
    );
    Ok(schema)
}

fn column_from_row(dialect: &SqlDialect, row: &Record) -> Option<Column> {
    let field = cell(row, "field").as_string()?;
    let native = cell(row, "native_type").as_string_or("");
    let full = cell(row, "column_type").as_string_or("").to_ascii_lowercase();

    let enum_values = cell(row, "enum_values")
        .as_string()
        .map(|fragment| enum_values_from(&fragment))
        .unwrap_or_default();
    let column_type = if enum_values.is_empty() {
        dialect.column_type(&native.to_ascii_lowercase(), &full)
    } else {
        ColumnType::Enum
    };

    let key = cell(row, "key_type").as_string_or("").to_ascii_uppercase();
    let auto_increment = cell(row, "extra")
        .as_string_or("")
        .to_ascii_lowercase()
        .contains("auto_increment");
    let nullable = cell(row, "is_nullable").as_bool_or(true);
    let default = if auto_increment {
        None
    } else {
        cell(row, "default_value").as_string().and_then(|raw| clean_default(&raw))
    };

    let mut column = Column::new(field, column_type);
    column.nullable = nullable;
    column.primary_key = key == "PRI";
    column.unique_key = key == "UNI";
    column.required = !nullable && default.is_none() && !auto_increment;
    column.default = default;
    column.extra.auto_increment = auto_increment;
    column.extra.enum_values = enum_values;
    column.extra.length = cell(row, "char_length")
        .as_i64()
        .filter(|len| *len > 0)
        .and_then(|len| u32::try_from(len).ok());
    if !native.is_empty() {
        column.extra.native_type = Some(native);
    }
    Some(column)
}

/// Key rows are always expressed from `table`'s side.
fn relation_from_row(table: &str, row: &Record) -> Option<Relation> {
    let org_column = cell(row, "org_column").as_string()?;
    let ref_table = cell(row, "ref_table").as_string()?;
    let ref_column = cell(row, "ref_column").as_string()?;
    Some(Relation::new(ref_table, ref_column, table, org_column))
}

/// Enum members from `enum('a','b')`, a quoted list or an IN/OR check clause.
/// Range checks never describe an enum.
fn enum_values_from(fragment: &str) -> Vec<String> {
    if fragment.contains('<') || fragment.contains('>') {
        return Vec::new();
    }
    let values = quoted_literals(fragment);
    if values.iter().any(String::is_empty) {
        return Vec::new();
    }
    values
}

/// Strip catalog decoration from a default expression: wrapping parentheses,
/// quotes and `::type` casts. Function calls are kept verbatim.
fn clean_default(raw: &str) -> Option<Value> {
    let mut text = raw.trim();
    while text.len() >= 2 && text.starts_with('(') && text.ends_with(')') {
        text = text[1..text.len() - 1].trim();
    }
    if text.is_empty() || text.eq_ignore_ascii_case("null") || text.starts_with("NULL::") {
        return None;
    }
    if text.starts_with('\'') {
        return quoted_literals(text).into_iter().next().map(Value::String);
    }
    if let Some(number) = parse_number(text) {
        return Some(Value::Number(number));
    }
    Some(Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sql::dialect::{MsSqlDialect, MySqlDialect, PostgresDialect};
    use rstest::rstest;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn mysql_users() -> Vec<Record> {
        vec![
            record(json!({
                "field": "id", "native_type": "int", "column_type": "int(11)",
                "is_nullable": 0, "key_type": "PRI", "default_value": null,
                "extra": "auto_increment", "char_length": null, "enum_values": null
            })),
            record(json!({
                "field": "email", "native_type": "varchar", "column_type": "varchar(120)",
                "is_nullable": 0, "key_type": "UNI", "default_value": null,
                "extra": "", "char_length": 120, "enum_values": null
            })),
            record(json!({
                "field": "active", "native_type": "tinyint", "column_type": "tinyint(1)",
                "is_nullable": 1, "key_type": "", "default_value": "1",
                "extra": "", "char_length": null, "enum_values": null
            })),
            record(json!({
                "field": "role", "native_type": "enum", "column_type": "enum('USER','ADMIN')",
                "is_nullable": 0, "key_type": "", "default_value": "USER",
                "extra": "", "char_length": 5, "enum_values": "enum('USER','ADMIN')"
            })),
            record(json!({
                "field": "companyId", "native_type": "int", "column_type": "int(11)",
                "is_nullable": 1, "key_type": "MUL", "default_value": null,
                "extra": "", "char_length": null, "enum_values": null
            })),
        ]
    }

    #[rstest]
    fn test_mysql_columns() {
        let schema = build_schema(
            &MySqlDialect.into(),
            "users",
            &mysql_users(),
            &[record(json!({"org_column": "companyId", "ref_table": "companies", "ref_column": "id"}))],
            &[record(json!({"org_column": "id", "ref_table": "posts", "ref_column": "authorId"}))],
        )
        .unwrap();

        assert_eq!(schema.primary_key.as_deref(), Some("id"));
        let id = schema.column("id").unwrap();
        assert!(id.extra.auto_increment);
        assert!(!id.required);

        let email = schema.column("email").unwrap();
        assert!(email.unique_key);
        assert!(email.required);
        assert_eq!(email.extra.length, Some(120));

        let active = schema.column("active").unwrap();
        assert_eq!(active.column_type, ColumnType::Boolean);
        assert_eq!(active.default, Some(json!(1)));

        let role = schema.column("role").unwrap();
        assert_eq!(role.column_type, ColumnType::Enum);
        assert_eq!(role.extra.enum_values, vec!["USER", "ADMIN"]);
        assert!(!role.required);

        assert!(schema.column("companyId").unwrap().foreign_key);
        assert_eq!(schema.relations.len(), 2);
        let company = schema.relation("companies").unwrap();
        assert_eq!(company.org_table, "users");
        assert_eq!(company.org_column, "companyId");
        assert_eq!(company.column, "id");
        let posts = schema.relation("posts").unwrap();
        assert_eq!(posts.org_column, "id");
        assert_eq!(posts.column, "authorId");
    }

    #[rstest]
    fn test_empty_catalog_is_schema_not_found() {
        let err = build_schema(&MySqlDialect.into(), "ghost", &[], &[], &[]).unwrap_err();
        assert_eq!(err, EngineError::SchemaNotFound { table: "ghost".into() });
    }

    #[rstest]
    fn test_duplicate_key_rows_collapse() {
        let fk = record(json!({"org_column": "companyId", "ref_table": "companies", "ref_column": "id"}));
        let schema = build_schema(
            &MySqlDialect.into(),
            "users",
            &mysql_users(),
            &[fk.clone(), fk],
            &[],
        )
        .unwrap();
        assert_eq!(schema.relations.len(), 1);
    }

    #[rstest]
    fn test_postgres_enum_from_quote_literal_list() {
        let rows = vec![record(json!({
            "field": "status", "native_type": "order_status", "column_type": "USER-DEFINED",
            "is_nullable": 1, "key_type": "", "default_value": "'NEW'::order_status",
            "extra": "", "char_length": null, "enum_values": "'NEW','SHIPPED'"
        }))];
        let schema = build_schema(&PostgresDialect.into(), "orders", &rows, &[], &[]).unwrap();
        let status = schema.column("status").unwrap();
        assert_eq!(status.column_type, ColumnType::Enum);
        assert_eq!(status.native_type(), Some("order_status"));
        assert_eq!(status.default, Some(json!("NEW")));
    }

    #[rstest]
    fn test_mssql_check_clause() {
        let rows = vec![record(json!({
            "field": "role", "native_type": "nvarchar", "column_type": "nvarchar",
            "is_nullable": 1, "key_type": "", "default_value": "('USER')",
            "extra": "", "char_length": 255,
            "enum_values": "([role]='USER' OR [role]='ADMIN')"
        }))];
        let schema = build_schema(&MsSqlDialect.into(), "users", &rows, &[], &[]).unwrap();
        let role = schema.column("role").unwrap();
        assert_eq!(role.column_type, ColumnType::Enum);
        assert_eq!(role.default, Some(json!("USER")));
    }

    #[rstest]
    #[case("([age]>(0))", 0)]
    #[case("([name]<>'')", 0)]
    #[case("\"KIND\" IN ('A','B')", 2)]
    fn test_enum_values_from_checks(#[case] clause: &str, #[case] expected: usize) {
        assert_eq!(enum_values_from(clause).len(), expected);
    }

    #[rstest]
    #[case("((0))", Some(json!(0)))]
    #[case("NULL", None)]
    #[case("CURRENT_TIMESTAMP", Some(json!("CURRENT_TIMESTAMP")))]
    #[case("'it''s'", Some(json!("it's")))]
    fn test_clean_default(#[case] raw: &str, #[case] expected: Option<Value>) {
        assert_eq!(clean_default(raw), expected);
    }
}
