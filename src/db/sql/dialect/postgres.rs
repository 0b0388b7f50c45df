use crate::coercion::TypeCapabilities;
use crate::db::escape::quote_identifier;
use crate::types::{Column, ColumnType, Schema};

use super::{
    canonical_type, column_clause, enum_literal_list, is_generated_key, CatalogQueries, Dialect,
    IdentityReturn, PaginationStyle,
};

const COLUMNS: &str = "\
SELECT c.column_name::text AS field, \
c.udt_name::text AS native_type, \
c.data_type::text AS column_type, \
CASE WHEN c.is_nullable = 'YES' THEN 1 ELSE 0 END AS is_nullable, \
COALESCE((SELECT CASE WHEN tc.constraint_type = 'PRIMARY KEY' THEN 'PRI' ELSE 'UNI' END \
FROM information_schema.key_column_usage k \
JOIN information_schema.table_constraints tc \
ON tc.constraint_name = k.constraint_name AND tc.table_schema = k.table_schema AND tc.table_name = k.table_name \
WHERE k.table_schema = c.table_schema AND k.table_name = c.table_name AND k.column_name = c.column_name \
AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE') \
ORDER BY tc.constraint_type LIMIT 1), '') AS key_type, \
c.column_default::text AS default_value, \
CASE WHEN c.column_default LIKE 'nextval(%' OR c.is_identity = 'YES' THEN 'auto_increment' ELSE '' END AS extra, \
c.character_maximum_length::int AS char_length, \
(SELECT string_agg(quote_literal(e.enumlabel), ',' ORDER BY e.enumsortorder) \
FROM pg_type t JOIN pg_enum e ON e.enumtypid = t.oid \
WHERE t.typname = c.udt_name) AS enum_values \
FROM information_schema.columns c \
WHERE c.table_schema = current_schema() AND c.table_name = $1::text \
ORDER BY c.ordinal_position";

const FORWARD_KEYS: &str = "\
SELECT kcu.column_name::text AS org_column, \
ccu.table_name::text AS ref_table, \
ccu.column_name::text AS ref_column \
FROM information_schema.table_constraints tc \
JOIN information_schema.key_column_usage kcu \
ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
JOIN information_schema.constraint_column_usage ccu \
ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema \
WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = current_schema() AND tc.table_name = $1::text";

const BACKWARD_KEYS: &str = "\
SELECT ccu.column_name::text AS org_column, \
tc.table_name::text AS ref_table, \
kcu.column_name::text AS ref_column \
FROM information_schema.table_constraints tc \
JOIN information_schema.key_column_usage kcu \
ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
JOIN information_schema.constraint_column_usage ccu \
ON ccu.constraint_name = tc.constraint_name AND ccu.table_schema = tc.table_schema \
WHERE tc.constraint_type = 'FOREIGN KEY' AND tc.table_schema = current_schema() AND ccu.table_name = $1::text";

const TABLES: &str = "\
SELECT table_name::text AS table_name \
FROM information_schema.tables \
WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
ORDER BY table_name";

/// Native types the driver decodes directly; everything else is projected as text.
const READABLE_TYPES: [&str; 15] = [
    "bool", "int2", "int4", "int8", "float4", "float8", "text", "varchar", "bpchar", "name",
    "json", "jsonb", "timestamp", "timestamptz", "date",
];

/// PostgreSQL. Parameters are sent as text and cast to the target column type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostgresDialect;

impl PostgresDialect {
    fn enum_type_name(table: &str, column: &Column) -> String {
        format!("{}_{}_enum", table, column.field)
    }

    fn cast_for(&self, column: &Column) -> String {
        if column.column_type == ColumnType::Enum {
            return column
                .native_type()
                .map(|native| self.quote_identifier(native))
                .unwrap_or_else(|| "text".to_string());
        }
        if let Some(native) = column.native_type() {
            if is_plain_type_name(native) {
                return native.to_string();
            }
        }
        match column.column_type {
            ColumnType::Number => "numeric",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "timestamp",
            ColumnType::Json => "jsonb",
            _ => "text",
        }
        .to_string()
    }
}

fn is_plain_type_name(native: &str) -> bool {
    !native.is_empty()
        && native
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_identifier(ident, '"', '"')
    }

    fn placeholder(&self, index: usize, column: Option<&Column>) -> String {
        match column {
            Some(column) => format!("${}::{}", index, self.cast_for(column)),
            None => format!("${index}"),
        }
    }

    fn capabilities(&self) -> TypeCapabilities {
        TypeCapabilities::new(true, false)
    }

    fn pagination_style(&self) -> PaginationStyle {
        PaginationStyle::LimitOffset
    }

    fn identity_return(&self) -> IdentityReturn {
        IdentityReturn::Returning
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
        match canonical_type(native) {
            ColumnType::Unknown => canonical_type(full),
            known => known,
        }
    }

    fn ddl_type(&self, table: &str, column: &Column) -> String {
        match column.column_type {
            ColumnType::String => format!("VARCHAR({})", column.extra.length.unwrap_or(255)),
            ColumnType::Number if is_generated_key(column) => "SERIAL".to_string(),
            ColumnType::Number if column.primary_key || column.foreign_key => "INTEGER".to_string(),
            ColumnType::Number => "DOUBLE PRECISION".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
            ColumnType::Date => "TIMESTAMP".to_string(),
            ColumnType::Json => "JSONB".to_string(),
            ColumnType::Enum => self.quote_identifier(&Self::enum_type_name(table, column)),
            ColumnType::Unknown => "TEXT".to_string(),
        }
    }

    fn column_definition(&self, table: &str, column: &Column) -> String {
        column_clause(self, column, &self.ddl_type(table, column), None, None)
    }

    fn pre_create(&self, schema: &Schema) -> Vec<String> {
        schema
            .columns
            .iter()
            .filter(|c| c.column_type == ColumnType::Enum)
            .map(|c| {
                format!(
                    "CREATE TYPE {} AS ENUM ({})",
                    self.quote_identifier(&Self::enum_type_name(&schema.table, c)),
                    enum_literal_list(c)
                )
            })
            .collect()
    }

    fn like_expression(
        &self,
        expr: &str,
        placeholder: &str,
        negate: bool,
        case_insensitive: bool,
    ) -> String {
        let op = match (negate, case_insensitive) {
            (false, false) => "LIKE",
            (true, false) => "NOT LIKE",
            (false, true) => "ILIKE",
            (true, true) => "NOT ILIKE",
        };
        format!("{expr}::text {op} {placeholder}")
    }

    fn select_expression(&self, expr: &str, column: &Column) -> String {
        match column.native_type() {
            Some(native) if !READABLE_TYPES.contains(&native) => format!("{expr}::text"),
            _ => expr.to_string(),
        }
    }
}
