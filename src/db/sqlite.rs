//! SQLite driver.
//!
//! Opens a file or an in-memory database; foreign keys are enforced.

use std::path::Path;
use std::sync::Mutex;

use log::info;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::db::query::{CompiledQuery, ExecResult};
use crate::db::sql::dialect::SqliteDialect;
use crate::db::sql::{SqlDatasource, SqlExecutor};
use crate::db::value::SqlValue;
use crate::error::{EngineError, Result};
use crate::types::Record;

pub fn connect(path: &Path, engine: &EngineConfig) -> Result<SqlDatasource<SqliteExecutor>> {
    let executor = SqliteExecutor::open(path)?;
    Ok(SqlDatasource::new(SqliteDialect, executor, engine.clone()))
}

pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = if path.as_os_str() == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| {
            EngineError::connection(format!("Failed to open SQLite database {}: {e}", path.display()))
        })?;
        conn.execute_batch("PRAGMA foreign_keys = ON")
            .map_err(EngineError::connection)?;
        info!("Opened SQLite database {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(Path::new(":memory:"))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| EngineError::connection(format!("Failed to acquire connection lock: {e}")))
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            SqlValue::Bool(b) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(i64::from(*b))),
            SqlValue::Int(i) => ToSqlOutput::Owned(rusqlite::types::Value::Integer(*i)),
            SqlValue::Float(f) => ToSqlOutput::Owned(rusqlite::types::Value::Real(*f)),
            SqlValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
        })
    }
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Value::from(f),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(hex::encode(bytes)),
    }
}

impl SqlExecutor for SqliteExecutor {
    fn query(&self, query: &CompiledQuery) -> Result<Vec<Record>> {
        let conn = self.lock()?;
        let mut statement = conn.prepare(&query.sql).map_err(EngineError::execution)?;
        let names: Vec<String> = statement
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();
        let mut rows = statement
            .query(params_from_iter(query.params.iter()))
            .map_err(EngineError::execution)?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().map_err(EngineError::execution)? {
            let mut record = Record::new();
            for (idx, name) in names.iter().enumerate() {
                let value = row.get_ref(idx).map_err(EngineError::execution)?;
                record.insert(name.clone(), from_sqlite(value));
            }
            records.push(record);
        }
        Ok(records)
    }

    fn execute(&self, query: &CompiledQuery) -> Result<ExecResult> {
        let conn = self.lock()?;
        let affected = if query.params.is_empty() {
            conn.execute_batch(&query.sql).map_err(EngineError::execution)?;
            0
        } else {
            conn.execute(&query.sql, params_from_iter(query.params.iter()))
                .map_err(EngineError::execution)?
        };
        let last_insert_id = conn.last_insert_rowid();
        Ok(ExecResult {
            affected: affected as u64,
            last_insert_id: (last_insert_id > 0).then_some(last_insert_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn test_query_returns_named_columns() {
        let executor = SqliteExecutor::in_memory().unwrap();
        let rows = executor
            .query(&CompiledQuery::with_params(
                "SELECT ? AS name, 2 AS n, NULL AS missing",
                vec![SqlValue::Text("ann".into())],
            ))
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["name"], Value::String("ann".into()));
        assert_eq!(rows[0]["n"], Value::from(2));
        assert_eq!(rows[0]["missing"], Value::Null);
    }

    #[rstest]
    fn test_execute_reports_insert_id() {
        let executor = SqliteExecutor::in_memory().unwrap();
        executor
            .execute(&CompiledQuery::new(
                "CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT)",
            ))
            .unwrap();
        let result = executor
            .execute(&CompiledQuery::with_params(
                "INSERT INTO t (v) VALUES (?)",
                vec![SqlValue::Text("x".into())],
            ))
            .unwrap();
        assert_eq!(result.affected, 1);
        assert_eq!(result.last_insert_id, Some(1));
    }

    #[rstest]
    fn test_blobs_hex_encoded() {
        assert_eq!(from_sqlite(ValueRef::Blob(&[0xde, 0xad])), Value::String("dead".into()));
    }
}
