//! PostgreSQL driver.
//!
//! Every parameter is sent as `TEXT`; the compiler casts placeholders to the
//! target column type (`$1::int4`), so one binding path serves all columns.

mod conversion;

use log::{debug, info};
use postgres::types::{ToSql, Type};
use postgres::{Client, Config, NoTls};

use crate::config::EngineConfig;
use crate::db::query::{CompiledQuery, ExecResult};
use crate::db::sql::dialect::PostgresDialect;
use crate::db::sql::{SqlDatasource, SqlExecutor};
use crate::error::{EngineError, Result};
use crate::types::Record;

pub use conversion::row_to_record;

/// Check the server is reachable and wrap the executor in the shared SQL datasource.
pub fn connect(url: &str, engine: &EngineConfig) -> Result<SqlDatasource<PostgresExecutor>> {
    let executor = PostgresExecutor::new(url)?;
    executor.open()?;
    info!("Connected to PostgreSQL");
    Ok(SqlDatasource::new(PostgresDialect, executor, engine.clone()))
}

/// Executes each statement on its own `postgres::Client`.
///
/// A client is opened per call and closed when the call returns, so a
/// connection dropped by the server never outlives one statement.
pub struct PostgresExecutor {
    config: Config,
}

impl PostgresExecutor {
    /// Parse the connection URL. No connection is opened yet.
    pub fn new(url: &str) -> Result<Self> {
        let config = url
            .parse::<Config>()
            .map_err(|e| EngineError::config(format!("Invalid PostgreSQL URL: {e}")))?;
        Ok(Self { config })
    }

    fn open(&self) -> Result<Client> {
        self.config
            .connect(NoTls)
            .map_err(|e| EngineError::connection(format!("Failed to connect to PostgreSQL: {e}")))
    }

    fn with_client<T>(&self, f: impl FnOnce(&mut Client) -> Result<T>) -> Result<T> {
        let mut client = self.open()?;
        debug!("Opened PostgreSQL connection");
        let result = f(&mut client);
        if let Err(e) = client.close() {
            debug!("Closing PostgreSQL connection failed: {e}");
        }
        result
    }
}

fn text_params(query: &CompiledQuery) -> Vec<Option<String>> {
    query.params.iter().map(|p| p.as_text()).collect()
}

fn execution_error(e: postgres::Error) -> EngineError {
    match e.as_db_error() {
        Some(db) => EngineError::execution(format!("{}: {}", db.code().code(), db.message())),
        None => EngineError::execution(e),
    }
}

impl SqlExecutor for PostgresExecutor {
    fn query(&self, query: &CompiledQuery) -> Result<Vec<Record>> {
        let params = text_params(query);
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        self.with_client(|client| {
            let types = vec![Type::TEXT; params.len()];
            let statement = client
                .prepare_typed(&query.sql, &types)
                .map_err(execution_error)?;
            let rows = client.query(&statement, &refs).map_err(execution_error)?;
            rows.iter().map(row_to_record).collect()
        })
    }

    fn execute(&self, query: &CompiledQuery) -> Result<ExecResult> {
        let params = text_params(query);
        let refs: Vec<&(dyn ToSql + Sync)> =
            params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        self.with_client(|client| {
            let affected = if params.is_empty() {
                // DDL and multi-statement scripts go through the simple protocol.
                client.batch_execute(&query.sql).map_err(execution_error)?;
                0
            } else {
                let types = vec![Type::TEXT; params.len()];
                let statement = client
                    .prepare_typed(&query.sql, &types)
                    .map_err(execution_error)?;
                client.execute(&statement, &refs).map_err(execution_error)?
            };
            Ok(ExecResult {
                affected,
                last_insert_id: None,
            })
        })
    }
}
