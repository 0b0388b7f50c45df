//! `postgres::Row` to JSON records.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use postgres::types::Type;
use postgres::Row;
use serde_json::Value;

use crate::coercion::INBOUND_DATE_FORMAT;
use crate::error::{EngineError, Result};
use crate::types::Record;

/// Convert one row, keyed by column label.
pub fn row_to_record(row: &Row) -> Result<Record> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let value = cell(row, idx, column.type_()).map_err(|e| {
            EngineError::execution(format!("Failed to read column '{}': {}", column.name(), e))
        })?;
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

fn cell(row: &Row, idx: usize, ty: &Type) -> std::result::Result<Value, postgres::Error> {
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::Bool),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::from),
        Type::FLOAT4 => row
            .try_get::<_, Option<f32>>(idx)?
            .map(|f| Value::from(f64::from(f))),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::from),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx)?,
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|dt| Value::String(dt.format(INBOUND_DATE_FORMAT).to_string())),
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|dt| Value::String(dt.format(INBOUND_DATE_FORMAT).to_string())),
        Type::DATE => row
            .try_get::<_, Option<NaiveDate>>(idx)?
            .map(|d| Value::String(d.format("%Y-%m-%d").to_string())),
        // Anything else the driver can surface as text; unreadable types are
        // projected with ::text by the compiler.
        _ => row.try_get::<_, Option<String>>(idx).ok().flatten().map(Value::String),
    };
    Ok(value.unwrap_or(Value::Null))
}
