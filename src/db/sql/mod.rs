//! Relational backends.
//!
//! [`SqlDatasource`] implements the whole operation contract once. It compiles
//! with [`SqlBuilder`] for its [`SqlDialect`] and hands the statements to a
//! driver-specific [`SqlExecutor`].

mod builder;
mod catalog;
pub mod dialect;

pub use builder::{SqlBuilder, ROWNUM_COLUMN, TOTAL_COLUMN};
pub use catalog::build_schema;
pub use dialect::{Dialect, SqlDialect};

use log::{debug, error, warn};
use serde_json::Value;

use crate::coercion::{
    coerce_outbound, coerce_record_outbound, coerce_row_inbound, now_outbound,
};
use crate::config::EngineConfig;
use crate::db::query::{CompiledQuery, ExecResult};
use crate::db::value::DatabaseValue;
use crate::db::{Datasource, SchemaCatalog};
use crate::error::{EngineError, Result};
use crate::relations::{expand_by_lookup, unflatten_rows};
use crate::types::{
    get_primary_key, CreateOneOptions, DeleteOneOptions, DeleteResponse, FindOptions, Predicate,
    Record, RequestContext, Schema, UniqueCheckOptions, UniqueCheckResponse, UpdateOneOptions,
};

use dialect::IdentityReturn;

/// Runs compiled statements against one relational store.
pub trait SqlExecutor: Send + Sync {
    /// Run a row-returning statement. Column names become record keys.
    fn query(&self, query: &CompiledQuery) -> Result<Vec<Record>>;

    /// Run a statement that returns no rows.
    fn execute(&self, query: &CompiledQuery) -> Result<ExecResult>;

    /// Run an `INSERT ... RETURNING column INTO :n` and read the out bind.
    fn insert_returning(&self, query: &CompiledQuery, column: &str) -> Result<Option<Value>> {
        let _ = (query, column);
        Err(EngineError::unsupported("executor", "RETURNING INTO"))
    }
}

/// A relational store: one dialect, one executor.
pub struct SqlDatasource<E> {
    dialect: SqlDialect,
    executor: E,
    config: EngineConfig,
}

impl<E: SqlExecutor> SqlDatasource<E> {
    pub fn new(dialect: impl Into<SqlDialect>, executor: E, config: EngineConfig) -> Self {
        Self {
            dialect: dialect.into(),
            executor,
            config,
        }
    }

    pub fn dialect(&self) -> &SqlDialect {
        &self.dialect
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    fn builder(&self) -> SqlBuilder<'_> {
        SqlBuilder::new(&self.dialect)
    }

    fn run_query(&self, ctx: &RequestContext, query: &CompiledQuery) -> Result<Vec<Record>> {
        debug!("[{}] {}: {}", ctx.label(), self.dialect.name(), query);
        self.executor
            .query(query)
            .map_err(|e| self.log_failure(ctx, query, e))
    }

    fn run_execute(&self, ctx: &RequestContext, query: &CompiledQuery) -> Result<ExecResult> {
        debug!("[{}] {}: {}", ctx.label(), self.dialect.name(), query);
        self.executor
            .execute(query)
            .map_err(|e| self.log_failure(ctx, query, e))
    }

    fn log_failure(&self, ctx: &RequestContext, query: &CompiledQuery, err: EngineError) -> EngineError {
        error!(
            "[{}] {} statement failed: {}\n  sql: {}\n  params: {}",
            ctx.label(),
            self.dialect.name(),
            err,
            query.sql,
            query.params_display()
        );
        err
    }

    fn fetch(&self, ctx: &RequestContext, options: &FindOptions, paginate: bool) -> Result<Vec<Record>> {
        let join = self.config.join_relations;
        let query = self.builder().select(options, join, paginate)?;
        let rows: Vec<Record> = self
            .run_query(ctx, &query)?
            .into_iter()
            .map(|mut row| {
                row.remove(ROWNUM_COLUMN);
                coerce_row_inbound(options, row)
            })
            .collect();

        if options.relations.is_empty() {
            return Ok(rows);
        }
        let rows = if join { unflatten_rows(options, rows) } else { rows };
        let limit = self.config.max_limit;
        Ok(expand_by_lookup(ctx, options, rows, limit, join, |lookup| {
            self.fetch(ctx, lookup, true)
        }))
    }

    fn count(&self, ctx: &RequestContext, query: &CompiledQuery) -> Result<u64> {
        let rows = self.run_query(ctx, query)?;
        let cell = rows.first().and_then(|row| row.get(TOTAL_COLUMN));
        cell.and_then(DatabaseValue::as_i64)
            .and_then(|total| u64::try_from(total).ok())
            .ok_or_else(|| {
                EngineError::execution(format!(
                    "Count query returned no usable {TOTAL_COLUMN}: {}",
                    cell.map_or_else(|| "no row".to_string(), Value::to_string)
                ))
            })
    }

    fn find_by_key(&self, ctx: &RequestContext, schema: &Schema, key: &str, id: Value) -> Result<Record> {
        let options = FindOptions::new(schema.clone()).with_filter(Predicate::equals(key, id));
        Ok(self.find_one(ctx, &options)?.unwrap_or_default())
    }

    fn generated_key(
        &self,
        ctx: &RequestContext,
        query: &CompiledQuery,
        primary_key: &str,
    ) -> Result<Option<Value>> {
        match self.dialect.identity_return() {
            IdentityReturn::Returning | IdentityReturn::ScopeIdentity => {
                let rows = self.run_query(ctx, query)?;
                Ok(rows.into_iter().next().and_then(|mut row| {
                    row.remove(primary_key)
                        .or_else(|| row.into_iter().next().map(|(_, v)| v))
                }))
            }
            IdentityReturn::LastInsertId => {
                let result = self.run_execute(ctx, query)?;
                Ok(result.last_insert_id.map(Value::from))
            }
            IdentityReturn::ReturningInto => {
                debug!("[{}] {}: {}", ctx.label(), self.dialect.name(), query);
                self.executor
                    .insert_returning(query, primary_key)
                    .map_err(|e| self.log_failure(ctx, query, e))
            }
        }
    }
}

impl<E: SqlExecutor> SchemaCatalog for SqlDatasource<E> {
    fn get_schema(&self, ctx: &RequestContext, table: &str) -> Result<Schema> {
        let catalog = self.dialect.catalog();
        let builder = self.builder();
        let columns = self.run_query(ctx, &builder.catalog(catalog.columns, table))?;
        if columns.is_empty() {
            return Err(EngineError::SchemaNotFound {
                table: table.to_string(),
            });
        }
        let forward = self.run_query(ctx, &builder.catalog(catalog.forward_keys, table))?;
        let backward = self.run_query(ctx, &builder.catalog(catalog.backward_keys, table))?;
        build_schema(&self.dialect, table, &columns, &forward, &backward)
    }
}

impl<E: SqlExecutor> Datasource for SqlDatasource<E> {
    fn backend_name(&self) -> &'static str {
        self.dialect.name()
    }

    fn check_connection(&self, ctx: &RequestContext) -> Result<bool> {
        match self.run_query(ctx, &CompiledQuery::new(self.dialect.ping_sql())) {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("[{}] {} connection check failed: {}", ctx.label(), self.dialect.name(), e);
                Ok(false)
            }
        }
    }

    fn list_tables(&self, ctx: &RequestContext) -> Result<Vec<String>> {
        let rows = self.run_query(ctx, &CompiledQuery::new(self.dialect.catalog().tables))?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get("table_name").and_then(DatabaseValue::as_string))
            .collect())
    }

    fn create_one(&self, ctx: &RequestContext, options: &CreateOneOptions) -> Result<Record> {
        let schema = &options.schema;
        let primary_key = get_primary_key(schema)?;
        let caps = self.dialect.capabilities();
        let data = coerce_record_outbound(schema, &options.data, caps)?;

        let id = match data.get(primary_key).filter(|v| !v.is_null()) {
            Some(id) => {
                let query = self.builder().insert(schema, primary_key, &data, false);
                self.run_execute(ctx, &query)?;
                id.clone()
            }
            None => {
                let query = self.builder().insert(schema, primary_key, &data, true);
                self.generated_key(ctx, &query, primary_key)?.ok_or_else(|| {
                    EngineError::execution(format!(
                        "insert into {} returned no {}",
                        schema.table, primary_key
                    ))
                })?
            }
        };
        self.find_by_key(ctx, schema, primary_key, id)
    }

    fn find_one(&self, ctx: &RequestContext, options: &FindOptions) -> Result<Option<Record>> {
        let single = options.clone().with_page(1, 0);
        Ok(self.fetch(ctx, &single, true)?.into_iter().next())
    }

    fn find_many(&self, ctx: &RequestContext, options: &FindOptions) -> Result<Vec<Record>> {
        self.fetch(ctx, options, true)
    }

    fn find_total_records(&self, ctx: &RequestContext, options: &FindOptions) -> Result<u64> {
        let query = self.builder().count(options, self.config.join_relations)?;
        self.count(ctx, &query)
    }

    fn update_one(&self, ctx: &RequestContext, options: &UpdateOneOptions) -> Result<Record> {
        let schema = &options.schema;
        let primary_key = get_primary_key(schema)?;
        let caps = self.dialect.capabilities();

        let mut data = options.data.clone();
        data.remove(primary_key);
        let data = coerce_record_outbound(schema, &data, caps)?;
        let id = match schema.column(primary_key) {
            Some(column) => coerce_outbound(column, &options.id, caps)?,
            None => options.id.clone(),
        };

        if !data.is_empty() {
            let query = self.builder().update(schema, primary_key, &data, &id);
            self.run_execute(ctx, &query)?;
        }
        self.find_by_key(ctx, schema, primary_key, id)
    }

    fn delete_one(&self, ctx: &RequestContext, options: &DeleteOneOptions) -> Result<DeleteResponse> {
        let schema = &options.schema;
        let primary_key = get_primary_key(schema)?;

        if let Some(column) = &options.soft_delete {
            let mut data = Record::new();
            data.insert(column.clone(), Value::String(now_outbound()));
            let updated = self.update_one(
                ctx,
                &UpdateOneOptions {
                    schema: schema.clone(),
                    id: options.id.clone(),
                    data,
                },
            )?;
            return Ok(DeleteResponse {
                deleted: u64::from(!updated.is_empty()),
            });
        }

        let caps = self.dialect.capabilities();
        let id = match schema.column(primary_key) {
            Some(column) => coerce_outbound(column, &options.id, caps)?,
            None => options.id.clone(),
        };
        let query = self.builder().delete(schema, primary_key, &id);
        let result = self.run_execute(ctx, &query)?;
        Ok(DeleteResponse {
            deleted: result.affected,
        })
    }

    fn unique_check(
        &self,
        ctx: &RequestContext,
        options: &UniqueCheckOptions,
    ) -> Result<UniqueCheckResponse> {
        let schema = &options.schema;
        let caps = self.dialect.capabilities();
        let exclude = match (&options.id, schema.primary_key.as_deref()) {
            (Some(id), Some(primary_key)) => {
                let id = match schema.column(primary_key) {
                    Some(column) => coerce_outbound(column, id, caps)?,
                    None => id.clone(),
                };
                Some((primary_key, id))
            }
            _ => None,
        };

        for column in schema.unique_columns() {
            let Some(value) = options.data.get(&column.field).filter(|v| !v.is_null()) else {
                continue;
            };
            let bound = coerce_outbound(column, value, caps)?;
            let query = self.builder().unique_count(
                schema,
                column,
                &bound,
                exclude.as_ref().map(|(key, id)| (*key, id)),
            );
            if self.count(ctx, &query)? > 0 {
                debug!(
                    "[{}] duplicate {}.{} = {}",
                    ctx.label(),
                    schema.table,
                    column.field,
                    value
                );
                return Ok(UniqueCheckResponse::duplicate(&column.field, value));
            }
        }
        Ok(UniqueCheckResponse::valid())
    }

    fn create_table(&self, ctx: &RequestContext, schema: &Schema) -> Result<bool> {
        for statement in self.builder().create_table(schema) {
            self.run_execute(ctx, &statement)?;
        }
        Ok(true)
    }

    fn truncate(&self, ctx: &RequestContext, table: &str) -> Result<()> {
        let query = CompiledQuery::new(self.dialect.truncate_sql(table));
        self.run_execute(ctx, &query)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sql::dialect::{MySqlDialect, PostgresDialect};
    use crate::test_utils::RecordingExecutor;
    use crate::types::{Column, ColumnType, Relation, RelationRequest};
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn ctx() -> RequestContext {
        RequestContext::new(Some("req-1"))
    }

    fn users() -> Schema {
        Schema::new(
            "users",
            vec![
                Column::new("id", ColumnType::Number).primary(),
                Column::new("email", ColumnType::String).unique(),
                Column::new("active", ColumnType::Boolean),
                Column::new("deletedAt", ColumnType::Date),
            ],
        )
    }

    fn mysql(executor: RecordingExecutor) -> SqlDatasource<RecordingExecutor> {
        SqlDatasource::new(MySqlDialect, executor, EngineConfig::default())
    }

    #[rstest]
    fn test_create_reads_back_generated_key(ctx: RequestContext) {
        let executor = RecordingExecutor::new()
            .with_exec_result(ExecResult {
                affected: 1,
                last_insert_id: Some(7),
            })
            .with_rows(vec![json!({"id": 7, "email": "a@b.c", "active": 1, "deletedAt": null})]);
        let ds = mysql(executor);
        let mut data = Record::new();
        data.insert("email".into(), json!("a@b.c"));
        data.insert("active".into(), json!(true));

        let created = ds
            .create_one(&ctx, &CreateOneOptions { schema: users(), data })
            .unwrap();
        assert_eq!(created["id"], json!(7));
        assert_eq!(created["active"], json!(true));

        let sql = ds.executor().sql();
        assert_eq!(sql.len(), 2);
        assert!(sql[0].starts_with("INSERT INTO `users`"));
        assert!(sql[1].starts_with("SELECT"));
        assert_eq!(ds.executor().statements()[1].params, vec![crate::db::SqlValue::Int(7)]);
    }

    #[rstest]
    fn test_unknown_payload_field_rejected(ctx: RequestContext) {
        let ds = mysql(RecordingExecutor::new());
        let mut data = Record::new();
        data.insert("nickname".into(), json!("x"));
        let err = ds
            .create_one(&ctx, &CreateOneOptions { schema: users(), data })
            .unwrap_err();
        assert!(matches!(err, EngineError::ColumnNotFound { .. }));
        assert!(ds.executor().statements().is_empty());
    }

    #[rstest]
    fn test_soft_delete_updates_instead_of_deleting(ctx: RequestContext) {
        let executor = RecordingExecutor::new()
            .with_exec_result(ExecResult { affected: 1, last_insert_id: None })
            .with_rows(vec![json!({"id": 3, "deletedAt": "2024-01-01 00:00:00"})]);
        let ds = mysql(executor);
        let response = ds
            .delete_one(
                &ctx,
                &DeleteOneOptions {
                    schema: users(),
                    id: json!(3),
                    soft_delete: Some("deletedAt".into()),
                },
            )
            .unwrap();
        assert_eq!(response.deleted, 1);
        let sql = ds.executor().sql();
        assert!(sql[0].starts_with("UPDATE `users` SET `deletedAt` = ?"));
        assert!(!sql.iter().any(|s| s.starts_with("DELETE")));
    }

    #[rstest]
    #[case(json!(1), false)]
    #[case(json!(0), true)]
    fn test_unique_check_counts(ctx: RequestContext, #[case] total: Value, #[case] valid: bool) {
        let mut row = Record::new();
        row.insert(TOTAL_COLUMN.to_string(), total);
        let executor = RecordingExecutor::new().with_rows(vec![Value::Object(row)]);
        let ds = mysql(executor);
        let mut data = Record::new();
        data.insert("email".into(), json!("a@b.c"));
        data.insert("active".into(), json!(true));

        let response = ds
            .unique_check(
                &ctx,
                &UniqueCheckOptions {
                    schema: users(),
                    data,
                    id: Some(json!(4)),
                },
            )
            .unwrap();
        assert_eq!(response.valid, valid);
        // Only the unique-flagged column is checked.
        assert_eq!(ds.executor().statements().len(), 1);
    }

    #[rstest]
    #[case(vec![])]
    #[case(vec![json!({"count": 3})])]
    #[case(vec![json!({"total": "many"})])]
    #[case(vec![json!({"total": -1})])]
    fn test_unreadable_total_is_execution_error(ctx: RequestContext, #[case] rows: Vec<Value>) {
        let executor = RecordingExecutor::new().with_rows(rows);
        let ds = mysql(executor);
        let err = ds
            .find_total_records(&ctx, &FindOptions::new(users()))
            .unwrap_err();
        assert!(matches!(err, EngineError::QueryExecution { .. }), "{err:?}");
    }

    #[rstest]
    fn test_missing_table_is_schema_not_found(ctx: RequestContext) {
        let ds = SqlDatasource::new(PostgresDialect, RecordingExecutor::new(), EngineConfig::default());
        assert_eq!(
            ds.get_schema(&ctx, "ghosts").unwrap_err(),
            EngineError::SchemaNotFound { table: "ghosts".into() }
        );
    }

    #[rstest]
    fn test_joined_relation_rows_are_nested(ctx: RequestContext) {
        let companies = Schema::new(
            "companies",
            vec![
                Column::new("id", ColumnType::Number).primary(),
                Column::new("title", ColumnType::String),
            ],
        );
        let mut relation = Relation::new("companies", "id", "users", "companyId");
        relation.schema = Some(Box::new(companies));
        let mut schema = users();
        schema.columns.push(Column::new("companyId", ColumnType::Number).foreign());
        let options = FindOptions::new(schema).with_relation(RelationRequest::new(relation));

        let executor = RecordingExecutor::new().with_rows(vec![json!({
            "id": 1, "email": "a@b.c", "active": 0, "deletedAt": null, "companyId": 9,
            "companies.id": 9, "companies.title": "Acme"
        })]);
        let ds = mysql(executor);
        let rows = ds.find_many(&ctx, &options).unwrap();
        assert_eq!(rows[0]["companies"], json!([{"id": 9, "title": "Acme"}]));
        assert_eq!(rows[0]["active"], json!(false));
        assert!(ds.executor().sql()[0].contains("JOIN `companies`"));
    }
}
