//! Oracle driver (ODPI-C through the `oracle` crate).

use chrono::{DateTime, NaiveDateTime, Utc};
use log::info;
use oracle::sql_type::{OracleType, ToSql};
use oracle::Connection;
use serde_json::Value;

use crate::coercion::{parse_number, INBOUND_DATE_FORMAT};
use crate::config::EngineConfig;
use crate::db::query::{CompiledQuery, ExecResult};
use crate::db::sql::dialect::OracleDialect;
use crate::db::sql::{SqlDatasource, SqlExecutor};
use crate::db::value::SqlValue;
use crate::error::{EngineError, Result};
use crate::types::Record;

/// Check the server is reachable and wrap the executor in the shared SQL datasource.
pub fn connect(
    username: &str,
    password: &str,
    connect_string: &str,
    engine: &EngineConfig,
) -> Result<SqlDatasource<OracleExecutor>> {
    let executor = OracleExecutor::new(username, password, connect_string);
    executor.open()?;
    info!("Connected to Oracle at {}", connect_string);
    Ok(SqlDatasource::new(OracleDialect, executor, engine.clone()))
}

/// Each call opens a session, runs one statement, commits writes and closes.
pub struct OracleExecutor {
    username: String,
    password: String,
    connect_string: String,
}

impl OracleExecutor {
    pub fn new(username: &str, password: &str, connect_string: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            connect_string: connect_string.to_string(),
        }
    }

    fn open(&self) -> Result<Connection> {
        Connection::connect(&self.username, &self.password, &self.connect_string)
            .map_err(|e| EngineError::connection(format!("Failed to connect to Oracle: {e}")))
    }
}

fn bind_values(query: &CompiledQuery) -> Vec<Box<dyn ToSql>> {
    query
        .params
        .iter()
        .map(|p| -> Box<dyn ToSql> {
            match p {
                SqlValue::Null => Box::new(Option::<String>::None),
                SqlValue::Bool(b) => Box::new(i64::from(*b)),
                SqlValue::Int(i) => Box::new(*i),
                SqlValue::Float(f) => Box::new(*f),
                SqlValue::Text(s) => Box::new(s.clone()),
            }
        })
        .collect()
}

fn cell(value: &oracle::SqlValue, ty: &OracleType) -> oracle::Result<Value> {
    let json = match ty {
        OracleType::Number(_, _) | OracleType::BinaryFloat | OracleType::BinaryDouble => value
            .get::<Option<String>>()?
            .map(|s| parse_number(&s).map(Value::Number).unwrap_or(Value::String(s))),
        OracleType::Date | OracleType::Timestamp(_) => value
            .get::<Option<NaiveDateTime>>()?
            .map(|dt| Value::String(dt.format(INBOUND_DATE_FORMAT).to_string())),
        OracleType::TimestampTZ(_) | OracleType::TimestampLTZ(_) => value
            .get::<Option<DateTime<Utc>>>()?
            .map(|dt| Value::String(dt.format(INBOUND_DATE_FORMAT).to_string())),
        _ => value.get::<Option<String>>()?.map(Value::String),
    };
    Ok(json.unwrap_or(Value::Null))
}

impl SqlExecutor for OracleExecutor {
    fn query(&self, query: &CompiledQuery) -> Result<Vec<Record>> {
        let conn = self.open()?;
        let values = bind_values(query);
        let binds: Vec<&dyn ToSql> = values.iter().map(|b| b.as_ref()).collect();
        let rows = conn.query(&query.sql, &binds).map_err(EngineError::execution)?;

        let mut records = Vec::new();
        for row in rows {
            let row = row.map_err(EngineError::execution)?;
            let mut record = Record::new();
            for (info, value) in row.column_info().iter().zip(row.sql_values()) {
                let cell = cell(value, info.oracle_type()).map_err(EngineError::execution)?;
                record.insert(info.name().to_string(), cell);
            }
            records.push(record);
        }
        Ok(records)
    }

    fn execute(&self, query: &CompiledQuery) -> Result<ExecResult> {
        let conn = self.open()?;
        let values = bind_values(query);
        let binds: Vec<&dyn ToSql> = values.iter().map(|b| b.as_ref()).collect();
        let statement = conn.execute(&query.sql, &binds).map_err(EngineError::execution)?;
        let affected = statement.row_count().map_err(EngineError::execution)?;
        conn.commit().map_err(EngineError::execution)?;
        Ok(ExecResult {
            affected,
            last_insert_id: None,
        })
    }

    fn insert_returning(&self, query: &CompiledQuery, _column: &str) -> Result<Option<Value>> {
        let conn = self.open()?;
        let values = bind_values(query);
        let out = OracleType::Number(0, 0);
        let mut binds: Vec<&dyn ToSql> = values.iter().map(|b| b.as_ref()).collect();
        binds.push(&out);
        let out_index = binds.len();

        let mut statement = conn
            .statement(&query.sql)
            .build()
            .map_err(EngineError::execution)?;
        statement.execute(&binds).map_err(EngineError::execution)?;
        let keys: Vec<i64> = statement
            .returned_values(out_index)
            .map_err(EngineError::execution)?;
        conn.commit().map_err(EngineError::execution)?;
        Ok(keys.into_iter().next().map(Value::from))
    }
}
