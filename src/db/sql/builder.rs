//! Dialect-independent statement compiler.
//!
//! Values are always bound as parameters; identifiers always go through the
//! dialect's quoting. Literal SQL is only produced for DDL defaults and enum
//! lists, which are escaped.

use serde_json::Value;

use crate::coercion::coerce_outbound;
use crate::db::query::CompiledQuery;
use crate::db::value::SqlValue;
use crate::error::{EngineError, Result};
use crate::relations::referenced_relations;
use crate::types::{split_reference, Column, FindOptions, Operator, Predicate, Record, Schema};

use super::dialect::{
    enum_literal_list, Dialect, IdentityReturn, PaginationStyle, SqlDialect,
};

/// Row-number column added by ROWNUM pagination; stripped from results.
pub const ROWNUM_COLUMN: &str = "RNUM_";

/// Alias of the count column.
pub const TOTAL_COLUMN: &str = "total";

struct Binder<'a> {
    dialect: &'a SqlDialect,
    params: Vec<SqlValue>,
}

impl<'a> Binder<'a> {
    fn new(dialect: &'a SqlDialect) -> Self {
        Self {
            dialect,
            params: Vec::new(),
        }
    }

    fn bind(&mut self, column: Option<&Column>, value: SqlValue) -> String {
        self.params.push(value);
        self.dialect.placeholder(self.params.len(), column)
    }

    fn finish(self, sql: String) -> CompiledQuery {
        CompiledQuery::with_params(sql, self.params)
    }
}

/// Compiles canonical options into SQL for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct SqlBuilder<'a> {
    dialect: &'a SqlDialect,
}

impl<'a> SqlBuilder<'a> {
    pub fn new(dialect: &'a SqlDialect) -> Self {
        Self { dialect }
    }

    fn quote(&self, ident: &str) -> String {
        self.dialect.quote_identifier(ident)
    }

    /// `table.column` for a plain or relation-qualified reference.
    fn column_ref(&self, options: &FindOptions, reference: &str) -> String {
        match split_reference(reference) {
            Some((table, column)) => format!("{}.{}", self.quote(table), self.quote(column)),
            None => format!("{}.{}", self.quote(options.table()), self.quote(reference)),
        }
    }

    /// SELECT for a page (or all rows when `paginate` is false).
    ///
    /// With `join_all` every to-one relation is JOINed and projected under
    /// `Table.column` aliases; otherwise only to-one relations referenced by
    /// filters are JOINed, for filtering. To-many relations are never JOINed,
    /// so every parent appears once; they are resolved by lookup.
    pub fn select(&self, options: &FindOptions, join_all: bool, paginate: bool) -> Result<CompiledQuery> {
        let table = self.quote(options.table());
        let mut projection: Vec<String> = options
            .projected_columns()
            .into_iter()
            .map(|column| {
                let expr = format!("{}.{}", table, self.quote(&column.field));
                format!(
                    "{} AS {}",
                    self.dialect.select_expression(&expr, column),
                    self.quote(&column.field)
                )
            })
            .collect();

        let mut lookup_keys: Vec<&str> = Vec::new();
        for request in &options.relations {
            if join_all && request.is_to_one() {
                let related = self.quote(request.table());
                for column in request.projected_columns() {
                    let expr = format!("{}.{}", related, self.quote(&column.field));
                    let alias = format!("{}.{}", request.table(), column.field);
                    projection.push(format!(
                        "{} AS {}",
                        self.dialect.select_expression(&expr, column),
                        self.quote(&alias)
                    ));
                }
                continue;
            }
            // Lookups need the join value of the parent row.
            let key = request.relation.org_column.as_str();
            let projected = options.fields.is_empty() || options.fields.iter().any(|f| f == key);
            if projected || lookup_keys.contains(&key) {
                continue;
            }
            lookup_keys.push(key);
            if let Some(column) = options.schema.column(key) {
                let expr = format!("{}.{}", table, self.quote(&column.field));
                projection.push(format!(
                    "{} AS {}",
                    self.dialect.select_expression(&expr, column),
                    self.quote(&column.field)
                ));
            }
        }

        let mut binder = Binder::new(self.dialect);
        let joins = self.joins(options, join_all);
        let where_clause = self.where_clause(options, &mut binder)?;
        let order = self.order_by(options);
        let mut sql = format!(
            "SELECT {} FROM {}{}{}",
            projection.join(", "),
            table,
            joins,
            where_clause
        );

        if !paginate {
            sql.push_str(&order);
            return Ok(binder.finish(sql));
        }

        match self.dialect.pagination_style() {
            PaginationStyle::LimitOffset => {
                sql.push_str(&order);
                sql.push_str(&format!(" LIMIT {} OFFSET {}", options.limit, options.offset));
            }
            PaginationStyle::OffsetFetch => {
                if order.is_empty() {
                    sql.push_str(" ORDER BY (SELECT NULL)");
                } else {
                    sql.push_str(&order);
                }
                sql.push_str(&format!(
                    " OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                    options.offset, options.limit
                ));
            }
            PaginationStyle::RowNum => {
                sql.push_str(&order);
                sql = format!(
                    "SELECT * FROM (SELECT inner_.*, ROWNUM AS {rownum} FROM ({sql}) inner_ \
                     WHERE ROWNUM <= {upper}) WHERE {rownum} > {offset}",
                    rownum = ROWNUM_COLUMN,
                    upper = options.offset.saturating_add(options.limit),
                    offset = options.offset,
                );
            }
        }
        Ok(binder.finish(sql))
    }

    /// COUNT of the filtered set; the count column is aliased `total`.
    pub fn count(&self, options: &FindOptions, join_all: bool) -> Result<CompiledQuery> {
        let mut binder = Binder::new(self.dialect);
        let joins = self.joins(options, join_all);
        let where_clause = self.where_clause(options, &mut binder)?;
        let sql = format!(
            "SELECT COUNT(*) AS {} FROM {}{}{}",
            self.quote(TOTAL_COLUMN),
            self.quote(options.table()),
            joins,
            where_clause
        );
        Ok(binder.finish(sql))
    }

    fn joins(&self, options: &FindOptions, join_all: bool) -> String {
        let referenced = referenced_relations(options);
        options
            .relations
            .iter()
            .filter(|r| r.is_to_one())
            .filter(|r| join_all || referenced.iter().any(|t| t == r.table()))
            .map(|r| {
                format!(
                    " {} {} ON {}.{} = {}.{}",
                    r.join.as_sql(),
                    self.quote(r.table()),
                    self.quote(&r.relation.org_table),
                    self.quote(&r.relation.org_column),
                    self.quote(r.table()),
                    self.quote(&r.relation.column)
                )
            })
            .collect()
    }

    fn where_clause(&self, options: &FindOptions, binder: &mut Binder<'_>) -> Result<String> {
        if options.filters.is_empty() {
            return Ok(String::new());
        }
        let conditions = options
            .filters
            .iter()
            .map(|p| self.predicate(options, p, binder))
            .collect::<Result<Vec<_>>>()?;
        Ok(format!(" WHERE {}", conditions.join(" AND ")))
    }

    /// A condition on a to-many relation becomes a correlated `EXISTS`, so the
    /// parent is matched once however many related rows qualify.
    fn predicate(
        &self,
        options: &FindOptions,
        predicate: &Predicate,
        binder: &mut Binder<'_>,
    ) -> Result<String> {
        let to_many = split_reference(&predicate.column)
            .and_then(|(table, _)| options.relation_request(table))
            .filter(|r| !r.is_to_one());
        let condition = self.condition(options, predicate, binder)?;
        Ok(match to_many {
            Some(request) => format!(
                "EXISTS (SELECT 1 FROM {related} WHERE {related}.{column} = {parent}.{key} AND {condition})",
                related = self.quote(request.table()),
                column = self.quote(&request.relation.column),
                parent = self.quote(options.table()),
                key = self.quote(&request.relation.org_column),
            ),
            None => condition,
        })
    }

    fn condition(
        &self,
        options: &FindOptions,
        predicate: &Predicate,
        binder: &mut Binder<'_>,
    ) -> Result<String> {
        let expr = self.column_ref(options, &predicate.column);
        let column = options.column_for(&predicate.column);
        let caps = self.dialect.capabilities();
        let coerce = |value: &Value| -> Result<SqlValue> {
            match column {
                Some(column) => Ok(SqlValue::from(coerce_outbound(column, value, caps)?)),
                None => Ok(SqlValue::from(value)),
            }
        };

        let sql = match predicate.operator {
            Operator::Null => format!("{expr} IS NULL"),
            Operator::NotNull => format!("{expr} IS NOT NULL"),
            Operator::In | Operator::NotIn => {
                let negate = predicate.operator == Operator::NotIn;
                let values = predicate.list_values();
                if values.is_empty() {
                    return Ok(if negate { "1 = 1" } else { "1 = 0" }.to_string());
                }
                let placeholders = values
                    .iter()
                    .map(|v| Ok(binder.bind(column, coerce(v)?)))
                    .collect::<Result<Vec<_>>>()?;
                let op = if negate { "NOT IN" } else { "IN" };
                format!("{} {} ({})", expr, op, placeholders.join(", "))
            }
            Operator::Like | Operator::NotLike => {
                let pattern = pattern_text(predicate);
                let placeholder = binder.bind(None, SqlValue::Text(pattern));
                let negate = predicate.operator == Operator::NotLike;
                self.dialect.like_expression(&expr, &placeholder, negate, false)
            }
            Operator::Search => {
                let term = escape_like(&pattern_text(predicate), self.dialect.like_wildcards());
                let placeholder = binder.bind(None, SqlValue::Text(format!("%{term}%")));
                format!(
                    "{} ESCAPE '{LIKE_ESCAPE}'",
                    self.dialect.like_expression(&expr, &placeholder, false, true)
                )
            }
            op => match &predicate.value {
                None | Some(Value::Null) => match op {
                    Operator::Equals => format!("{expr} IS NULL"),
                    Operator::NotEquals => format!("{expr} IS NOT NULL"),
                    _ => {
                        return Err(EngineError::InvalidValue {
                            column: predicate.column.clone(),
                            expected: "a value".to_string(),
                            value: "null".to_string(),
                        })
                    }
                },
                Some(value) => {
                    let placeholder = binder.bind(column, coerce(value)?);
                    format!("{} {} {}", expr, comparison_sql(op), placeholder)
                }
            },
        };
        Ok(sql)
    }

    fn order_by(&self, options: &FindOptions) -> String {
        let table = self.quote(options.table());
        let terms: Vec<String> = options
            .sort
            .iter()
            .filter(|s| split_reference(&s.column).is_none())
            .map(|s| format!("{}.{} {}", table, self.quote(&s.column), s.direction.as_sql()))
            .collect();
        if terms.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", terms.join(", "))
        }
    }

    /// INSERT of already coerced `data`. With `return_identity` the statement
    /// also yields the generated key the way the dialect reports it.
    pub fn insert(
        &self,
        schema: &Schema,
        primary_key: &str,
        data: &Record,
        return_identity: bool,
    ) -> CompiledQuery {
        let table = self.quote(&schema.table);
        let mut binder = Binder::new(self.dialect);
        let mut columns = Vec::with_capacity(data.len());
        let mut placeholders = Vec::with_capacity(data.len());
        for (field, value) in data {
            columns.push(self.quote(field));
            placeholders.push(binder.bind(schema.column(field), SqlValue::from(value)));
        }

        let mut sql = if columns.is_empty() {
            self.dialect.empty_insert_sql(&schema.table, primary_key)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                table,
                columns.join(", "),
                placeholders.join(", ")
            )
        };

        if return_identity {
            match self.dialect.identity_return() {
                IdentityReturn::Returning => {
                    sql.push_str(&format!(" RETURNING {}", self.quote(primary_key)));
                }
                IdentityReturn::ScopeIdentity => {
                    sql.push_str(&format!(
                        "; SELECT SCOPE_IDENTITY() AS {}",
                        self.quote(primary_key)
                    ));
                }
                IdentityReturn::ReturningInto => {
                    let out = self.dialect.placeholder(binder.params.len() + 1, None);
                    sql.push_str(&format!(" RETURNING {} INTO {}", self.quote(primary_key), out));
                }
                IdentityReturn::LastInsertId => {}
            }
        }
        binder.finish(sql)
    }

    /// UPDATE of already coerced `data` on the row whose key equals `id`.
    pub fn update(&self, schema: &Schema, primary_key: &str, data: &Record, id: &Value) -> CompiledQuery {
        let mut binder = Binder::new(self.dialect);
        let assignments: Vec<String> = data
            .iter()
            .map(|(field, value)| {
                let placeholder = binder.bind(schema.column(field), SqlValue::from(value));
                format!("{} = {}", self.quote(field), placeholder)
            })
            .collect();
        let key = binder.bind(schema.column(primary_key), SqlValue::from(id));
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = {}",
            self.quote(&schema.table),
            assignments.join(", "),
            self.quote(primary_key),
            key
        );
        binder.finish(sql)
    }

    pub fn delete(&self, schema: &Schema, primary_key: &str, id: &Value) -> CompiledQuery {
        let mut binder = Binder::new(self.dialect);
        let key = binder.bind(schema.column(primary_key), SqlValue::from(id));
        let sql = format!(
            "DELETE FROM {} WHERE {} = {}",
            self.quote(&schema.table),
            self.quote(primary_key),
            key
        );
        binder.finish(sql)
    }

    /// Count of rows holding `value` in `column`, other than the row keyed `exclude`.
    pub fn unique_count(
        &self,
        schema: &Schema,
        column: &Column,
        value: &Value,
        exclude: Option<(&str, &Value)>,
    ) -> CompiledQuery {
        let mut binder = Binder::new(self.dialect);
        let placeholder = binder.bind(Some(column), SqlValue::from(value));
        let mut sql = format!(
            "SELECT COUNT(*) AS {} FROM {} WHERE {} = {}",
            self.quote(TOTAL_COLUMN),
            self.quote(&schema.table),
            self.quote(&column.field),
            placeholder
        );
        if let Some((primary_key, id)) = exclude {
            let key = binder.bind(schema.column(primary_key), SqlValue::from(id));
            sql.push_str(&format!(" AND {} <> {}", self.quote(primary_key), key));
        }
        binder.finish(sql)
    }

    /// Catalog query bound to `table`.
    pub fn catalog(&self, sql: &str, table: &str) -> CompiledQuery {
        CompiledQuery::with_params(sql, vec![SqlValue::Text(table.to_string())])
    }

    /// CREATE TABLE plus whatever the dialect needs around it, in execution order.
    pub fn create_table(&self, schema: &Schema) -> Vec<CompiledQuery> {
        let table = self.quote(&schema.table);
        let mut definitions: Vec<String> = schema
            .columns
            .iter()
            .map(|c| self.dialect.column_definition(&schema.table, c))
            .collect();

        if self.dialect.enum_check_constraints() {
            for column in schema.columns.iter().filter(|c| !c.extra.enum_values.is_empty()) {
                definitions.push(format!(
                    "CONSTRAINT {} CHECK ({} IN ({}))",
                    self.quote(&format!("ck_{}_{}", schema.table, column.field)),
                    self.quote(&column.field),
                    enum_literal_list(column)
                ));
            }
        }

        let foreign: Vec<_> = schema
            .relations
            .iter()
            .filter(|r| r.org_table == schema.table)
            .filter(|r| schema.column(&r.org_column).is_some_and(|c| c.foreign_key))
            .collect();

        let mut statements = self.dialect.pre_create(schema);
        if !self.dialect.alter_foreign_keys() {
            for relation in &foreign {
                definitions.push(format!(
                    "FOREIGN KEY ({}) REFERENCES {}({})",
                    self.quote(&relation.org_column),
                    self.quote(&relation.table),
                    self.quote(&relation.column)
                ));
            }
        }
        statements.push(format!("CREATE TABLE {} ({})", table, definitions.join(", ")));
        statements.extend(self.dialect.post_create(schema));
        if self.dialect.alter_foreign_keys() {
            for relation in &foreign {
                statements.push(format!(
                    "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {}({})",
                    table,
                    self.quote(&format!("fk_{}_{}", schema.table, relation.org_column)),
                    self.quote(&relation.org_column),
                    self.quote(&relation.table),
                    self.quote(&relation.column)
                ));
            }
        }
        statements.into_iter().map(CompiledQuery::new).collect()
    }
}

fn comparison_sql(op: Operator) -> &'static str {
    match op {
        Operator::Equals => "=",
        Operator::NotEquals => "<>",
        Operator::Lt => "<",
        Operator::Lte => "<=",
        Operator::Gt => ">",
        _ => ">=",
    }
}

/// Escape character for search terms matched literally.
const LIKE_ESCAPE: char = '!';

fn escape_like(term: &str, wildcards: &[char]) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if c == LIKE_ESCAPE || wildcards.contains(&c) {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

fn pattern_text(predicate: &Predicate) -> String {
    match &predicate.value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}
