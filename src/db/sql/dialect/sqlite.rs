use crate::coercion::TypeCapabilities;
use crate::db::escape::quote_identifier;
use crate::types::{Column, ColumnType};

use super::{
    column_clause, is_generated_key, CatalogQueries, Dialect, IdentityReturn, PaginationStyle,
};

const COLUMNS: &str = "\
SELECT p.name AS field, \
lower(p.type) AS native_type, \
lower(p.type) AS column_type, \
CASE WHEN p.\"notnull\" = 1 OR p.pk > 0 THEN 0 ELSE 1 END AS is_nullable, \
CASE WHEN p.pk > 0 THEN 'PRI' \
WHEN EXISTS (SELECT 1 FROM pragma_index_list(?1) il \
JOIN pragma_index_info(il.name) ii \
WHERE il.\"unique\" = 1 AND il.origin <> 'pk' AND ii.name = p.name \
AND (SELECT COUNT(*) FROM pragma_index_info(il.name)) = 1) THEN 'UNI' \
ELSE '' END AS key_type, \
p.dflt_value AS default_value, \
CASE WHEN p.pk > 0 AND lower(p.type) = 'integer' THEN 'auto_increment' ELSE '' END AS extra, \
NULL AS char_length, \
NULL AS enum_values \
FROM pragma_table_info(?1) p \
ORDER BY p.cid";

const FORWARD_KEYS: &str = "\
SELECT f.\"from\" AS org_column, f.\"table\" AS ref_table, f.\"to\" AS ref_column \
FROM pragma_foreign_key_list(?1) f";

const BACKWARD_KEYS: &str = "\
SELECT f.\"to\" AS org_column, m.name AS ref_table, f.\"from\" AS ref_column \
FROM sqlite_master m JOIN pragma_foreign_key_list(m.name) f \
WHERE m.type = 'table' AND f.\"table\" = ?1";

const TABLES: &str = "\
SELECT name AS table_name FROM sqlite_master \
WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
ORDER BY name";

/// SQLite 3.16 and later (table-valued pragma functions).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_identifier(ident, '"', '"')
    }

    fn placeholder(&self, _index: usize, _column: Option<&Column>) -> String {
        "?".to_string()
    }

    fn capabilities(&self) -> TypeCapabilities {
        TypeCapabilities::new(false, false)
    }

    fn pagination_style(&self) -> PaginationStyle {
        PaginationStyle::LimitOffset
    }

    fn identity_return(&self) -> IdentityReturn {
        IdentityReturn::LastInsertId
    }

    fn catalog(&self) -> CatalogQueries {
        CatalogQueries {
            columns: COLUMNS,
            forward_keys: FORWARD_KEYS,
            backward_keys: BACKWARD_KEYS,
            tables: TABLES,
        }
    }

    fn ddl_type(&self, _table: &str, column: &Column) -> String {
        match column.column_type {
            ColumnType::String | ColumnType::Enum | ColumnType::Unknown => "TEXT",
            ColumnType::Number if column.primary_key || column.foreign_key => "INTEGER",
            ColumnType::Number => "REAL",
            ColumnType::Boolean => "BOOLEAN",
            ColumnType::Date => "DATETIME",
            ColumnType::Json => "JSON",
        }
        .to_string()
    }

    fn column_definition(&self, table: &str, column: &Column) -> String {
        let autoincrement = is_generated_key(column).then_some("AUTOINCREMENT");
        column_clause(self, column, &self.ddl_type(table, column), None, autoincrement)
    }

    fn enum_check_constraints(&self) -> bool {
        true
    }

    fn alter_foreign_keys(&self) -> bool {
        false
    }

    fn truncate_sql(&self, table: &str) -> String {
        format!("DELETE FROM {}", self.quote_identifier(table))
    }
}
