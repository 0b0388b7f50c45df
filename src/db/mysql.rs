//! MySQL and MariaDB driver.

use log::info;
use mysql::prelude::Queryable;
use mysql::{Opts, Params, Pool, PooledConn, Row};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::db::query::{CompiledQuery, ExecResult};
use crate::db::sql::dialect::MySqlDialect;
use crate::db::sql::{SqlDatasource, SqlExecutor};
use crate::db::value::SqlValue;
use crate::error::{EngineError, Result};
use crate::types::Record;

pub fn connect(url: &str, engine: &EngineConfig) -> Result<SqlDatasource<MySqlExecutor>> {
    let executor = MySqlExecutor::new(url)?;
    Ok(SqlDatasource::new(MySqlDialect, executor, engine.clone()))
}

/// Executes statements on a `mysql::Pool`; every call borrows one connection.
pub struct MySqlExecutor {
    pool: Pool,
}

impl MySqlExecutor {
    pub fn new(url: &str) -> Result<Self> {
        let opts = Opts::from_url(url)
            .map_err(|e| EngineError::connection(format!("Invalid MySQL URL: {e}")))?;
        let pool = Pool::new(opts)
            .map_err(|e| EngineError::connection(format!("Failed to connect to MySQL: {e}")))?;
        // Fail fast on bad credentials rather than on the first query.
        pool.get_conn()
            .map_err(|e| EngineError::connection(format!("Failed to connect to MySQL: {e}")))?;
        info!("Connected to MySQL");
        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConn> {
        self.pool
            .get_conn()
            .map_err(|e| EngineError::connection(format!("Failed to acquire MySQL connection: {e}")))
    }
}

fn params(query: &CompiledQuery) -> Params {
    if query.params.is_empty() {
        Params::Empty
    } else {
        Params::Positional(query.params.iter().map(to_mysql).collect())
    }
}

fn to_mysql(value: &SqlValue) -> mysql::Value {
    match value {
        SqlValue::Null => mysql::Value::NULL,
        SqlValue::Bool(b) => mysql::Value::Int(i64::from(*b)),
        SqlValue::Int(i) => mysql::Value::Int(*i),
        SqlValue::Float(f) => mysql::Value::Double(*f),
        SqlValue::Text(s) => mysql::Value::Bytes(s.clone().into_bytes()),
    }
}

fn from_mysql(value: &mysql::Value) -> Value {
    match value {
        mysql::Value::NULL => Value::Null,
        mysql::Value::Bytes(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        mysql::Value::Int(i) => Value::from(*i),
        mysql::Value::UInt(u) => Value::from(*u),
        mysql::Value::Float(f) => Value::from(f64::from(*f)),
        mysql::Value::Double(d) => Value::from(*d),
        mysql::Value::Date(year, month, day, hour, minute, second, micros) => Value::String(
            format!(
                "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
                year,
                month,
                day,
                hour,
                minute,
                second,
                micros / 1000
            ),
        ),
        mysql::Value::Time(negative, days, hours, minutes, seconds, _) => {
            let hours = u32::from(*hours) + days * 24;
            let sign = if *negative { "-" } else { "" };
            Value::String(format!("{sign}{hours:02}:{minutes:02}:{seconds:02}"))
        }
    }
}

fn row_to_record(row: &Row) -> Record {
    row.columns_ref()
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            let value = row.as_ref(idx).map(from_mysql).unwrap_or(Value::Null);
            (column.name_str().into_owned(), value)
        })
        .collect()
}

impl SqlExecutor for MySqlExecutor {
    fn query(&self, query: &CompiledQuery) -> Result<Vec<Record>> {
        let mut conn = self.conn()?;
        let result = conn
            .exec_iter(&query.sql, params(query))
            .map_err(EngineError::execution)?;
        let mut records = Vec::new();
        for row in result {
            let row = row.map_err(EngineError::execution)?;
            records.push(row_to_record(&row));
        }
        Ok(records)
    }

    fn execute(&self, query: &CompiledQuery) -> Result<ExecResult> {
        let mut conn = self.conn()?;
        if query.params.is_empty() {
            conn.query_drop(&query.sql)
        } else {
            conn.exec_drop(&query.sql, params(query))
        }
        .map_err(EngineError::execution)?;
        Ok(ExecResult {
            affected: conn.affected_rows(),
            last_insert_id: i64::try_from(conn.last_insert_id())
                .ok()
                .filter(|id| *id > 0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_datetime_rendered_as_iso() {
        let value = mysql::Value::Date(2024, 3, 9, 14, 5, 0, 250_000);
        assert_eq!(from_mysql(&value), Value::String("2024-03-09T14:05:00.250Z".into()));
    }

    #[rstest]
    fn test_bytes_become_text() {
        let value = mysql::Value::Bytes(b"hello".to_vec());
        assert_eq!(from_mysql(&value), Value::String("hello".into()));
    }

    #[rstest]
    fn test_bools_bound_as_integers() {
        assert_eq!(to_mysql(&SqlValue::Bool(true)), mysql::Value::Int(1));
    }
}
