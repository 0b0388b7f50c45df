//! Dialect strategies for the SQL compiler.
//!
//! The compiler is written once; everything that differs between stores
//! (placeholder syntax, identifier quoting, pagination clause, identity
//! return, catalog queries, DDL types) is asked of a [`Dialect`].
//! [`SqlDialect`] dispatches statically over the concrete dialects.

mod mssql;
mod mysql;
mod oracle;
mod postgres;
mod sqlite;

pub use mssql::MsSqlDialect;
pub use mysql::MySqlDialect;
pub use oracle::OracleDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use enum_dispatch::enum_dispatch;
use serde_json::Value;

use crate::coercion::TypeCapabilities;
use crate::db::escape::escape_literal;
use crate::types::{Column, ColumnType, Schema};

/// How a page of rows is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationStyle {
    /// `LIMIT n OFFSET m`
    LimitOffset,
    /// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`, which requires an ORDER BY.
    OffsetFetch,
    /// Double-nested `ROWNUM` subquery.
    RowNum,
}

/// How the generated key of an inserted row is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityReturn {
    /// `INSERT ... RETURNING pk` yields a row.
    Returning,
    /// The driver reports the last insert id.
    LastInsertId,
    /// A trailing `SELECT SCOPE_IDENTITY()` yields a row.
    ScopeIdentity,
    /// `INSERT ... RETURNING pk INTO :out` with an out bind.
    ReturningInto,
}

/// Catalog statements, each parameterised by the table name.
///
/// Column rows expose `field`, `native_type`, `column_type`, `is_nullable`,
/// `key_type`, `default_value`, `extra`, `char_length` and `enum_values`.
/// Key rows expose `org_column`, `ref_table` and `ref_column`.
#[derive(Debug, Clone, Copy)]
pub struct CatalogQueries {
    pub columns: &'static str,
    /// Keys declared on the table, pointing elsewhere.
    pub forward_keys: &'static str,
    /// Keys declared elsewhere, pointing at the table.
    pub backward_keys: &'static str,
    /// Lists base tables; rows expose `table_name`.
    pub tables: &'static str,
}

#[enum_dispatch]
pub trait Dialect {
    fn name(&self) -> &'static str;

    fn quote_identifier(&self, ident: &str) -> String;

    /// Placeholder for the 1-based parameter `index`. `column` is the column
    /// the value is compared with or written to, when there is one.
    fn placeholder(&self, index: usize, column: Option<&Column>) -> String;

    fn capabilities(&self) -> TypeCapabilities;

    fn pagination_style(&self) -> PaginationStyle;

    fn identity_return(&self) -> IdentityReturn;

    fn catalog(&self) -> CatalogQueries;

    /// Canonical type of a catalog column. `native` is the bare lowercase
    /// type name, `full` the lowercase declaration (`tinyint(1)`, `number(1)`).
    fn column_type(&self, native: &str, full: &str) -> ColumnType {
        let _ = full;
        canonical_type(native)
    }

    /// DDL type of a canonical column.
    fn ddl_type(&self, table: &str, column: &Column) -> String;

    /// Full column clause of a CREATE TABLE.
    fn column_definition(&self, table: &str, column: &Column) -> String {
        column_clause(self, column, &self.ddl_type(table, column), None, None)
    }

    /// Statements that must run before CREATE TABLE.
    fn pre_create(&self, schema: &Schema) -> Vec<String> {
        let _ = schema;
        Vec::new()
    }

    /// Statements that must run after CREATE TABLE.
    fn post_create(&self, schema: &Schema) -> Vec<String> {
        let _ = schema;
        Vec::new()
    }

    /// Whether enum columns need a CHECK constraint.
    fn enum_check_constraints(&self) -> bool {
        false
    }

    /// Whether foreign keys can be added with ALTER TABLE after creation.
    fn alter_foreign_keys(&self) -> bool {
        true
    }

    /// Characters with wildcard meaning inside a LIKE pattern.
    fn like_wildcards(&self) -> &'static [char] {
        &['%', '_']
    }

    fn like_expression(
        &self,
        expr: &str,
        placeholder: &str,
        negate: bool,
        case_insensitive: bool,
    ) -> String {
        let _ = case_insensitive;
        let op = if negate { "NOT LIKE" } else { "LIKE" };
        format!("{expr} {op} {placeholder}")
    }

    /// Projection expression for a column; lets a dialect cast types its
    /// driver cannot read.
    fn select_expression(&self, expr: &str, column: &Column) -> String {
        let _ = column;
        expr.to_string()
    }

    fn ping_sql(&self) -> &'static str {
        "SELECT 1"
    }

    fn truncate_sql(&self, table: &str) -> String {
        format!("TRUNCATE TABLE {}", self.quote_identifier(table))
    }

    fn empty_insert_sql(&self, table: &str, primary_key: &str) -> String {
        let _ = primary_key;
        format!("INSERT INTO {} DEFAULT VALUES", self.quote_identifier(table))
    }

    /// Literal for DDL defaults.
    fn literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) if self.capabilities().native_boolean => {
                if *b { "TRUE" } else { "FALSE" }.to_string()
            }
            Value::Bool(b) => u8::from(*b).to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => escape_literal(s),
            other => escape_literal(&other.to_string()),
        }
    }
}

#[enum_dispatch(Dialect)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlDialect {
    MySqlDialect,
    PostgresDialect,
    MsSqlDialect,
    OracleDialect,
    SqliteDialect,
}

/// Canonical type from a native type name shared by most catalogs.
pub fn canonical_type(native: &str) -> ColumnType {
    let native = native.trim().to_ascii_lowercase();
    let base = native.split('(').next().unwrap_or_default().trim();
    match base {
        "bool" | "boolean" | "bit" => ColumnType::Boolean,
        "json" | "jsonb" => ColumnType::Json,
        "enum" => ColumnType::Enum,
        "date" | "datetime" | "datetime2" | "smalldatetime" | "datetimeoffset" | "timestamp"
        | "timestamptz" | "time" | "timetz" => ColumnType::Date,
        _ if base.starts_with("timestamp") => ColumnType::Date,
        "int" | "int2" | "int4" | "int8" | "integer" | "smallint" | "tinyint" | "mediumint"
        | "bigint" | "serial" | "bigserial" | "smallserial" | "numeric" | "decimal" | "real"
        | "double" | "double precision" | "float" | "float4" | "float8" | "number"
        | "binary_float" | "binary_double" | "money" | "smallmoney" | "year" => ColumnType::Number,
        "char" | "varchar" | "nchar" | "nvarchar" | "varchar2" | "nvarchar2" | "bpchar"
        | "text" | "tinytext" | "mediumtext" | "longtext" | "ntext" | "clob" | "nclob"
        | "character" | "character varying" | "uuid" | "uniqueidentifier" | "name"
        | "citext" | "string" => ColumnType::String,
        _ => ColumnType::Unknown,
    }
}

/// Assemble a column clause: name, type, identity, default, nullability, keys.
pub fn column_clause<D: Dialect + ?Sized>(
    dialect: &D,
    column: &Column,
    type_sql: &str,
    after_type: Option<&str>,
    trailing: Option<&str>,
) -> String {
    let mut clause = format!("{} {}", dialect.quote_identifier(&column.field), type_sql);
    if let Some(after_type) = after_type {
        clause.push(' ');
        clause.push_str(after_type);
    }
    if let Some(default) = &column.default {
        clause.push_str(" DEFAULT ");
        clause.push_str(&dialect.literal(default));
    }
    if column.primary_key || !column.nullable {
        clause.push_str(" NOT NULL");
    }
    if column.primary_key {
        clause.push_str(" PRIMARY KEY");
    } else if column.unique_key {
        clause.push_str(" UNIQUE");
    }
    if let Some(trailing) = trailing {
        clause.push(' ');
        clause.push_str(trailing);
    }
    clause
}

/// `'a', 'b'` list of enum values.
pub fn enum_literal_list(column: &Column) -> String {
    column
        .extra
        .enum_values
        .iter()
        .map(|v| escape_literal(v))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whether a primary key column is generated by the store.
pub fn is_generated_key(column: &Column) -> bool {
    column.primary_key
        && column.extra.auto_increment
        && column.column_type == ColumnType::Number
}
