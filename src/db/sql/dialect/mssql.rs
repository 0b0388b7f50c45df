use crate::coercion::TypeCapabilities;
use crate::db::escape::quote_identifier;
use crate::types::{Column, ColumnType};

use super::{
    column_clause, is_generated_key, CatalogQueries, Dialect, IdentityReturn, PaginationStyle,
};

const COLUMNS: &str = "\
SELECT c.COLUMN_NAME AS field, \
c.DATA_TYPE AS native_type, \
c.DATA_TYPE AS column_type, \
CASE WHEN c.IS_NULLABLE = 'YES' THEN 1 ELSE 0 END AS is_nullable, \
COALESCE((SELECT TOP 1 CASE WHEN tc.CONSTRAINT_TYPE = 'PRIMARY KEY' THEN 'PRI' ELSE 'UNI' END \
FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE k \
JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc \
ON tc.CONSTRAINT_NAME = k.CONSTRAINT_NAME AND tc.TABLE_SCHEMA = k.TABLE_SCHEMA \
WHERE k.TABLE_SCHEMA = c.TABLE_SCHEMA AND k.TABLE_NAME = c.TABLE_NAME AND k.COLUMN_NAME = c.COLUMN_NAME \
AND tc.CONSTRAINT_TYPE IN ('PRIMARY KEY', 'UNIQUE') \
ORDER BY tc.CONSTRAINT_TYPE), '') AS key_type, \
c.COLUMN_DEFAULT AS default_value, \
CASE WHEN COLUMNPROPERTY(OBJECT_ID(QUOTENAME(c.TABLE_SCHEMA) + '.' + QUOTENAME(c.TABLE_NAME)), c.COLUMN_NAME, 'IsIdentity') = 1 \
THEN 'auto_increment' ELSE '' END AS extra, \
c.CHARACTER_MAXIMUM_LENGTH AS char_length, \
(SELECT TOP 1 cc.CHECK_CLAUSE \
FROM INFORMATION_SCHEMA.CONSTRAINT_COLUMN_USAGE ccu \
JOIN INFORMATION_SCHEMA.CHECK_CONSTRAINTS cc \
ON cc.CONSTRAINT_NAME = ccu.CONSTRAINT_NAME AND cc.CONSTRAINT_SCHEMA = ccu.CONSTRAINT_SCHEMA \
WHERE ccu.TABLE_SCHEMA = c.TABLE_SCHEMA AND ccu.TABLE_NAME = c.TABLE_NAME AND ccu.COLUMN_NAME = c.COLUMN_NAME) AS enum_values \
FROM INFORMATION_SCHEMA.COLUMNS c \
WHERE c.TABLE_SCHEMA = SCHEMA_NAME() AND c.TABLE_NAME = @P1 \
ORDER BY c.ORDINAL_POSITION";

const FORWARD_KEYS: &str = "\
SELECT pc.name AS org_column, rt.name AS ref_table, rc.name AS ref_column \
FROM sys.foreign_key_columns fkc \
JOIN sys.tables pt ON pt.object_id = fkc.parent_object_id \
JOIN sys.columns pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id \
JOIN sys.tables rt ON rt.object_id = fkc.referenced_object_id \
JOIN sys.columns rc ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id \
WHERE pt.name = @P1";

const BACKWARD_KEYS: &str = "\
SELECT rc.name AS org_column, pt.name AS ref_table, pc.name AS ref_column \
FROM sys.foreign_key_columns fkc \
JOIN sys.tables pt ON pt.object_id = fkc.parent_object_id \
JOIN sys.columns pc ON pc.object_id = fkc.parent_object_id AND pc.column_id = fkc.parent_column_id \
JOIN sys.tables rt ON rt.object_id = fkc.referenced_object_id \
JOIN sys.columns rc ON rc.object_id = fkc.referenced_object_id AND rc.column_id = fkc.referenced_column_id \
WHERE rt.name = @P1";

const TABLES: &str = "\
SELECT TABLE_NAME AS table_name \
FROM INFORMATION_SCHEMA.TABLES \
WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_SCHEMA = SCHEMA_NAME() \
ORDER BY TABLE_NAME";

/// Microsoft SQL Server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MsSqlDialect;

impl Dialect for MsSqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn like_wildcards(&self) -> &'static [char] {
        &['%', '_', '[']
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_identifier(ident, '[', ']')
    }

    fn placeholder(&self, index: usize, _column: Option<&Column>) -> String {
        format!("@P{index}")
    }

    fn capabilities(&self) -> TypeCapabilities {
        TypeCapabilities::new(false, false)
    }

    fn pagination_style(&self) -> PaginationStyle {
        PaginationStyle::OffsetFetch
    }

    fn identity_return(&self) -> IdentityReturn {
        IdentityReturn::ScopeIdentity
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
            ColumnType::String | ColumnType::Enum => {
                format!("NVARCHAR({})", column.extra.length.unwrap_or(255))
            }
            ColumnType::Number if column.primary_key || column.foreign_key => "INT".to_string(),
            ColumnType::Number => "FLOAT".to_string(),
            ColumnType::Boolean => "BIT".to_string(),
            ColumnType::Date => "DATETIME2".to_string(),
            ColumnType::Json | ColumnType::Unknown => "NVARCHAR(MAX)".to_string(),
        }
    }

    fn column_definition(&self, table: &str, column: &Column) -> String {
        let identity = is_generated_key(column).then_some("IDENTITY(1,1)");
        column_clause(self, column, &self.ddl_type(table, column), identity, None)
    }

    fn enum_check_constraints(&self) -> bool {
        true
    }

    /// TRUNCATE is refused on tables referenced by a foreign key.
    fn truncate_sql(&self, table: &str) -> String {
        format!("DELETE FROM {}", self.quote_identifier(table))
    }
}
