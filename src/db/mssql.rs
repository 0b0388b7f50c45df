//! Microsoft SQL Server driver (tiberius on a private current-thread runtime).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use log::info;
use serde_json::Value;
use tiberius::{Client, ColumnData, Config, FromSql, Query};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::coercion::INBOUND_DATE_FORMAT;
use crate::config::EngineConfig;
use crate::db::query::{CompiledQuery, ExecResult};
use crate::db::sql::dialect::MsSqlDialect;
use crate::db::sql::{SqlDatasource, SqlExecutor};
use crate::db::value::SqlValue;
use crate::error::{EngineError, Result};
use crate::types::Record;

type TdsClient = Client<Compat<TcpStream>>;

/// Check the server is reachable and wrap the executor in the shared SQL datasource.
pub fn connect(
    connection_string: &str,
    engine: &EngineConfig,
) -> Result<SqlDatasource<MsSqlExecutor>> {
    let executor = MsSqlExecutor::new(connection_string)?;
    executor.runtime.block_on(executor.open())?;
    info!("Connected to SQL Server");
    Ok(SqlDatasource::new(MsSqlDialect, executor, engine.clone()))
}

/// Opens a TDS connection per call on a private current-thread runtime.
pub struct MsSqlExecutor {
    runtime: Runtime,
    config: Config,
}

impl MsSqlExecutor {
    /// Parse an ADO.NET style connection string. No connection is opened yet.
    pub fn new(connection_string: &str) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| EngineError::connection(format!("Failed to start runtime: {e}")))?;
        let config = Config::from_ado_string(connection_string)
            .map_err(|e| EngineError::config(format!("Invalid SQL Server connection string: {e}")))?;
        Ok(Self { runtime, config })
    }

    async fn open(&self) -> Result<TdsClient> {
        let tcp = TcpStream::connect(self.config.get_addr())
            .await
            .map_err(|e| EngineError::connection(format!("Failed to reach SQL Server: {e}")))?;
        tcp.set_nodelay(true).map_err(EngineError::connection)?;
        Client::connect(self.config.clone(), tcp.compat_write())
            .await
            .map_err(|e| EngineError::connection(format!("Failed to connect to SQL Server: {e}")))
    }

    fn prepare<'a>(query: &'a CompiledQuery) -> Query<'a> {
        let mut prepared = Query::new(query.sql.as_str());
        for param in &query.params {
            match param {
                SqlValue::Null => prepared.bind(Option::<String>::None),
                SqlValue::Bool(b) => prepared.bind(*b),
                SqlValue::Int(i) => prepared.bind(*i),
                SqlValue::Float(f) => prepared.bind(*f),
                SqlValue::Text(s) => prepared.bind(s.as_str()),
            }
        }
        prepared
    }
}

fn cell(data: &ColumnData<'static>) -> Value {
    match data {
        ColumnData::U8(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I16(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I32(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::I64(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::F32(v) => v.map(|f| Value::from(f64::from(f))).unwrap_or(Value::Null),
        ColumnData::F64(v) => v.map(Value::from).unwrap_or(Value::Null),
        ColumnData::Bit(v) => v.map(Value::Bool).unwrap_or(Value::Null),
        ColumnData::String(v) => v
            .as_ref()
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::Guid(v) => v
            .map(|g| Value::String(g.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::Binary(v) => v
            .as_ref()
            .map(|b| Value::String(hex::encode(b)))
            .unwrap_or(Value::Null),
        ColumnData::Numeric(v) => v
            .map(|n| {
                if n.scale() == 0 {
                    i64::try_from(n.value()).map(Value::from).unwrap_or(Value::Null)
                } else {
                    Value::from(n.value() as f64 / 10f64.powi(i32::from(n.scale())))
                }
            })
            .unwrap_or(Value::Null),
        ColumnData::Date(_) => NaiveDate::from_sql(data)
            .ok()
            .flatten()
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null),
        ColumnData::DateTimeOffset(_) => DateTime::<Utc>::from_sql(data)
            .ok()
            .flatten()
            .map(|dt| Value::String(dt.format(INBOUND_DATE_FORMAT).to_string()))
            .unwrap_or(Value::Null),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)
                .ok()
                .flatten()
                .map(|dt| Value::String(dt.format(INBOUND_DATE_FORMAT).to_string()))
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

fn row_to_record(row: &tiberius::Row) -> Record {
    row.cells()
        .map(|(column, data)| (column.name().to_string(), cell(data)))
        .collect()
}

impl SqlExecutor for MsSqlExecutor {
    /// Rows of the last result set, so `INSERT ...; SELECT SCOPE_IDENTITY()` reads the key.
    fn query(&self, query: &CompiledQuery) -> Result<Vec<Record>> {
        let prepared = Self::prepare(query);
        let sets = self.runtime.block_on(async {
            let mut client = self.open().await?;
            prepared
                .query(&mut client)
                .await
                .map_err(EngineError::execution)?
                .into_results()
                .await
                .map_err(EngineError::execution)
        })?;
        Ok(sets
            .last()
            .map(|rows| rows.iter().map(row_to_record).collect())
            .unwrap_or_default())
    }

    fn execute(&self, query: &CompiledQuery) -> Result<ExecResult> {
        let prepared = Self::prepare(query);
        let result = self.runtime.block_on(async {
            let mut client = self.open().await?;
            prepared
                .execute(&mut client)
                .await
                .map_err(EngineError::execution)
        })?;
        Ok(ExecResult {
            affected: result.total(),
            last_insert_id: None,
        })
    }
}
