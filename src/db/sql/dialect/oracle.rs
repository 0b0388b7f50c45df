use crate::coercion::TypeCapabilities;
use crate::db::escape::quote_identifier;
use crate::types::{Column, ColumnType, Schema};

use super::{
    canonical_type, column_clause, is_generated_key, CatalogQueries, Dialect, IdentityReturn,
    PaginationStyle,
};

const COLUMNS: &str = "\
SELECT c.COLUMN_NAME AS \"field\", \
LOWER(c.DATA_TYPE) AS \"native_type\", \
CASE WHEN c.DATA_TYPE = 'NUMBER' AND c.DATA_PRECISION IS NOT NULL \
THEN 'number(' || c.DATA_PRECISION || ')' ELSE LOWER(c.DATA_TYPE) END AS \"column_type\", \
CASE WHEN c.NULLABLE = 'Y' THEN 1 ELSE 0 END AS \"is_nullable\", \
(SELECT MIN(CASE k.CONSTRAINT_TYPE WHEN 'P' THEN 'PRI' ELSE 'UNI' END) \
FROM USER_CONSTRAINTS k JOIN USER_CONS_COLUMNS kc ON kc.CONSTRAINT_NAME = k.CONSTRAINT_NAME \
WHERE k.TABLE_NAME = c.TABLE_NAME AND kc.COLUMN_NAME = c.COLUMN_NAME AND k.CONSTRAINT_TYPE IN ('P', 'U')) AS \"key_type\", \
c.DATA_DEFAULT AS \"default_value\", \
CASE WHEN c.IDENTITY_COLUMN = 'YES' OR EXISTS (SELECT 1 FROM USER_SEQUENCES s \
WHERE s.SEQUENCE_NAME = c.TABLE_NAME || '_' || c.COLUMN_NAME || '_seq') \
THEN 'auto_increment' END AS \"extra\", \
c.CHAR_LENGTH AS \"char_length\", \
(SELECT MAX(ch.SEARCH_CONDITION_VC) FROM USER_CONSTRAINTS ch \
JOIN USER_CONS_COLUMNS chc ON chc.CONSTRAINT_NAME = ch.CONSTRAINT_NAME \
WHERE ch.TABLE_NAME = c.TABLE_NAME AND chc.COLUMN_NAME = c.COLUMN_NAME AND ch.CONSTRAINT_TYPE = 'C' \
AND ch.SEARCH_CONDITION_VC LIKE '%IN (%') AS \"enum_values\" \
FROM USER_TAB_COLUMNS c \
WHERE c.TABLE_NAME = :1 \
ORDER BY c.COLUMN_ID";

const FORWARD_KEYS: &str = "\
SELECT a.COLUMN_NAME AS \"org_column\", r.TABLE_NAME AS \"ref_table\", rc.COLUMN_NAME AS \"ref_column\" \
FROM USER_CONSTRAINTS c \
JOIN USER_CONS_COLUMNS a ON a.CONSTRAINT_NAME = c.CONSTRAINT_NAME \
JOIN USER_CONSTRAINTS r ON r.CONSTRAINT_NAME = c.R_CONSTRAINT_NAME \
JOIN USER_CONS_COLUMNS rc ON rc.CONSTRAINT_NAME = r.CONSTRAINT_NAME AND rc.POSITION = a.POSITION \
WHERE c.CONSTRAINT_TYPE = 'R' AND c.TABLE_NAME = :1";

const BACKWARD_KEYS: &str = "\
SELECT rc.COLUMN_NAME AS \"org_column\", c.TABLE_NAME AS \"ref_table\", a.COLUMN_NAME AS \"ref_column\" \
FROM USER_CONSTRAINTS c \
JOIN USER_CONS_COLUMNS a ON a.CONSTRAINT_NAME = c.CONSTRAINT_NAME \
JOIN USER_CONSTRAINTS r ON r.CONSTRAINT_NAME = c.R_CONSTRAINT_NAME \
JOIN USER_CONS_COLUMNS rc ON rc.CONSTRAINT_NAME = r.CONSTRAINT_NAME AND rc.POSITION = a.POSITION \
WHERE c.CONSTRAINT_TYPE = 'R' AND r.TABLE_NAME = :1";

const TABLES: &str = "SELECT TABLE_NAME AS \"table_name\" FROM USER_TABLES ORDER BY TABLE_NAME";

/// Oracle Database 12c and later.
///
/// Generated keys come from a `{table}_{pk}_seq` sequence filled in by a
/// before-insert trigger; the new key is read back with `RETURNING ... INTO`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OracleDialect;

impl OracleDialect {
    fn sequence_name(table: &str, column: &Column) -> String {
        format!("{}_{}_seq", table, column.field)
    }
}

impl Dialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn quote_identifier(&self, ident: &str) -> String {
        quote_identifier(ident, '"', '"')
    }

    fn placeholder(&self, index: usize, column: Option<&Column>) -> String {
        match column {
            Some(column) if column.column_type == ColumnType::Date => {
                format!("TO_TIMESTAMP(:{index}, 'YYYY-MM-DD HH24:MI:SS')")
            }
            _ => format!(":{index}"),
        }
    }

    fn capabilities(&self) -> TypeCapabilities {
        TypeCapabilities::new(false, false)
    }

    fn pagination_style(&self) -> PaginationStyle {
        PaginationStyle::RowNum
    }

    fn identity_return(&self) -> IdentityReturn {
        IdentityReturn::ReturningInto
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
        if full == "number(1)" {
            return ColumnType::Boolean;
        }
        canonical_type(native)
    }

    fn ddl_type(&self, _table: &str, column: &Column) -> String {
        match column.column_type {
            ColumnType::String | ColumnType::Enum => {
                format!("VARCHAR2({})", column.extra.length.unwrap_or(255))
            }
            ColumnType::Number if column.primary_key || column.foreign_key => {
                "NUMBER(10)".to_string()
            }
            ColumnType::Number => "NUMBER".to_string(),
            ColumnType::Boolean => "NUMBER(1)".to_string(),
            ColumnType::Date => "TIMESTAMP".to_string(),
            ColumnType::Json | ColumnType::Unknown => "CLOB".to_string(),
        }
    }

    fn column_definition(&self, table: &str, column: &Column) -> String {
        column_clause(self, column, &self.ddl_type(table, column), None, None)
    }

    fn post_create(&self, schema: &Schema) -> Vec<String> {
        let Some(key) = schema.columns.iter().find(|c| is_generated_key(c)) else {
            return Vec::new();
        };
        let table = self.quote_identifier(&schema.table);
        let sequence = self.quote_identifier(&Self::sequence_name(&schema.table, key));
        let trigger = self.quote_identifier(&format!("{}_{}_trg", schema.table, key.field));
        let column = self.quote_identifier(&key.field);
        vec![
            format!("CREATE SEQUENCE {sequence} START WITH 1 INCREMENT BY 1"),
            format!(
                "CREATE OR REPLACE TRIGGER {trigger} BEFORE INSERT ON {table} FOR EACH ROW \
                 WHEN (NEW.{column} IS NULL) \
                 BEGIN SELECT {sequence}.NEXTVAL INTO :NEW.{column} FROM DUAL; END;"
            ),
        ]
    }

    fn enum_check_constraints(&self) -> bool {
        true
    }

    fn like_expression(
        &self,
        expr: &str,
        placeholder: &str,
        negate: bool,
        case_insensitive: bool,
    ) -> String {
        let op = if negate { "NOT LIKE" } else { "LIKE" };
        if case_insensitive {
            format!("UPPER({expr}) {op} UPPER({placeholder})")
        } else {
            format!("{expr} {op} {placeholder}")
        }
    }

    fn ping_sql(&self) -> &'static str {
        "SELECT 1 FROM DUAL"
    }

    fn empty_insert_sql(&self, table: &str, primary_key: &str) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES (NULL)",
            self.quote_identifier(table),
            self.quote_identifier(primary_key)
        )
    }
}
