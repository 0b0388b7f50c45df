use crate::coercion::TypeCapabilities;
use crate::db::escape::quote_identifier;
use crate::types::{Column, ColumnType};

use super::{
    canonical_type, column_clause, enum_literal_list, is_generated_key, CatalogQueries, Dialect,
    IdentityReturn, PaginationStyle,
};

const COLUMNS: &str = "\
SELECT COLUMN_NAME AS field, \
DATA_TYPE AS native_type, \
COLUMN_TYPE AS column_type, \
CASE WHEN IS_NULLABLE = 'YES' THEN 1 ELSE 0 END AS is_nullable, \
COLUMN_KEY AS key_type, \
COLUMN_DEFAULT AS default_value, \
EXTRA AS extra, \
CHARACTER_MAXIMUM_LENGTH AS char_length, \
CASE WHEN DATA_TYPE = 'enum' THEN COLUMN_TYPE END AS enum_values \
FROM information_schema.COLUMNS \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? \
ORDER BY ORDINAL_POSITION";

const FORWARD_KEYS: &str = "\
SELECT COLUMN_NAME AS org_column, \
REFERENCED_TABLE_NAME AS ref_table, \
REFERENCED_COLUMN_NAME AS ref_column \
FROM information_schema.KEY_COLUMN_USAGE \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND REFERENCED_TABLE_NAME IS NOT NULL";

const BACKWARD_KEYS: &str = "\
SELECT REFERENCED_COLUMN_NAME AS org_column, \
TABLE_NAME AS ref_table, \
COLUMN_NAME AS ref_column \
FROM information_schema.KEY_COLUMN_USAGE \
WHERE TABLE_SCHEMA = DATABASE() AND REFERENCED_TABLE_NAME = ?";

const TABLES: &str = "\
SELECT TABLE_NAME AS table_name \
FROM information_schema.TABLES \
WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
ORDER BY TABLE_NAME";

/// MySQL and MariaDB.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_identifier(ident, '`', '`')
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

    fn column_type(&self, native: &str, full: &str) -> ColumnType {
        if full.starts_with("tinyint(1)") {
            return ColumnType::Boolean;
        }
        canonical_type(native)
    }

    fn ddl_type(&self, _table: &str, column: &Column) -> String {
        match column.column_type {
            ColumnType::String => format!("VARCHAR({})", column.extra.length.unwrap_or(255)),
            ColumnType::Number if column.primary_key || column.foreign_key => "INT".to_string(),
            ColumnType::Number => "DOUBLE".to_string(),
            ColumnType::Boolean => "TINYINT(1)".to_string(),
            ColumnType::Date => "DATETIME".to_string(),
            ColumnType::Json => "JSON".to_string(),
            ColumnType::Enum => format!("ENUM({})", enum_literal_list(column)),
            ColumnType::Unknown => "TEXT".to_string(),
        }
    }

    fn column_definition(&self, table: &str, column: &Column) -> String {
        let identity = is_generated_key(column).then_some("AUTO_INCREMENT");
        column_clause(self, column, &self.ddl_type(table, column), identity, None)
    }

    fn empty_insert_sql(&self, table: &str, _primary_key: &str) -> String {
        format!("INSERT INTO {} () VALUES ()", self.quote_identifier(table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_tinyint_one_is_boolean() {
        assert_eq!(MySqlDialect.column_type("tinyint", "tinyint(1)"), ColumnType::Boolean);
        assert_eq!(MySqlDialect.column_type("tinyint", "tinyint(4)"), ColumnType::Number);
    }

    #[rstest]
    fn test_generated_key_definition() {
        let column = Column::new("id", ColumnType::Number).primary();
        assert_eq!(
            MySqlDialect.column_definition("users", &column),
            "`id` INT AUTO_INCREMENT NOT NULL PRIMARY KEY"
        );
    }

    #[rstest]
    fn test_inline_enum() {
        let column = Column::new("role", ColumnType::Enum).with_enum_values(["USER", "ADMIN"]);
        assert_eq!(MySqlDialect.ddl_type("users", &column), "ENUM('USER', 'ADMIN')");
    }
}
