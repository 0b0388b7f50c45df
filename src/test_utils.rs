//! Shared test utilities.
//!
//! [`RecordingExecutor`] stands in for a SQL driver: it replays scripted result
//! sets and captures every statement. [`MemoryDocumentStore`] is a document
//! store that evaluates filter documents in memory.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Mutex;

use regex::Regex;
use serde_json::{json, Value};

use crate::config::EngineConfig;
use crate::db::document::{DocumentDatasource, DocumentQuery, DocumentStore};
use crate::db::sql::SqlExecutor;
use crate::db::{CompiledQuery, ExecResult};
use crate::error::{EngineError, Result};
use crate::query::Query;
use crate::types::Record;

// =============================================================================
// SQL
// =============================================================================

/// Replays scripted rows for queries in order and records every statement.
#[derive(Default)]
pub struct RecordingExecutor {
    results: Mutex<VecDeque<Vec<Record>>>,
    statements: Mutex<Vec<CompiledQuery>>,
    exec_result: ExecResult,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the rows returned by the next `query` call.
    pub fn with_rows(self, rows: Vec<Value>) -> Self {
        let rows = rows
            .into_iter()
            .map(|row| serde_json::from_value(row).expect("row must be an object"))
            .collect();
        self.results.lock().unwrap().push_back(rows);
        self
    }

    pub fn with_exec_result(mut self, result: ExecResult) -> Self {
        self.exec_result = result;
        self
    }

    /// Statements seen so far.
    pub fn statements(&self) -> Vec<CompiledQuery> {
        self.statements.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|q| q.sql).collect()
    }

    fn record(&self, query: &CompiledQuery) -> Result<()> {
        self.statements
            .lock()
            .map_err(|e| EngineError::execution(format!("Failed to acquire statements lock: {e}")))?
            .push(query.clone());
        Ok(())
    }
}

impl SqlExecutor for RecordingExecutor {
    fn query(&self, query: &CompiledQuery) -> Result<Vec<Record>> {
        self.record(query)?;
        let mut results = self
            .results
            .lock()
            .map_err(|e| EngineError::execution(format!("Failed to acquire results lock: {e}")))?;
        Ok(results.pop_front().unwrap_or_default())
    }

    fn execute(&self, query: &CompiledQuery) -> Result<ExecResult> {
        self.record(query)?;
        Ok(self.exec_result)
    }
}

// =============================================================================
// Documents
// =============================================================================

/// Collections of extended JSON documents kept in insertion order.
#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<Vec<(String, Vec<Record>)>>,
    next_id: Mutex<u64>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add documents to a collection, creating it if needed.
    pub fn with_documents(self, collection: &str, documents: Vec<Value>) -> Self {
        {
            let mut collections = self.collections.lock().unwrap();
            let index = match collections.iter().position(|(name, _)| name == collection) {
                Some(index) => index,
                None => {
                    collections.push((collection.to_string(), Vec::new()));
                    collections.len() - 1
                }
            };
            for document in documents {
                let document = serde_json::from_value(document).expect("document must be an object");
                collections[index].1.push(document);
            }
        }
        self
    }

    fn with_collection<T>(&self, name: &str, f: impl FnOnce(&mut Vec<Record>) -> T) -> Result<T> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|e| EngineError::execution(format!("Failed to acquire collections lock: {e}")))?;
        match collections.iter_mut().find(|(n, _)| n == name) {
            Some((_, documents)) => Ok(f(documents)),
            None => Ok(f(&mut Vec::new())),
        }
    }

    fn generate_id(&self) -> Result<Value> {
        let mut next = self
            .next_id
            .lock()
            .map_err(|e| EngineError::execution(format!("Failed to acquire id lock: {e}")))?;
        *next += 1;
        Ok(json!({ "$oid": format!("{:024x}", 0xfeed_0000_u64 + *next) }))
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Object(x), Value::Object(y)) => match (x.get("$date"), y.get("$date")) {
            (Some(x), Some(y)) => compare(x, y),
            _ => None,
        },
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Null, _) => Some(Ordering::Less),
        (_, Value::Null) => Some(Ordering::Greater),
        _ => None,
    }
}

fn regex_match(pattern: &str, options: Option<&str>, value: Option<&Value>) -> bool {
    let pattern = match options {
        Some(o) if o.contains('i') => format!("(?i){pattern}"),
        _ => pattern.to_string(),
    };
    match (Regex::new(&pattern), value.and_then(Value::as_str)) {
        (Ok(regex), Some(text)) => regex.is_match(text),
        _ => false,
    }
}

fn is_operator_map(map: &Record) -> bool {
    !map.is_empty() && map.keys().all(|k| k.starts_with('$')) && !map.contains_key("$oid") && !map.contains_key("$date")
}

fn field_matches(value: Option<&Value>, condition: &Value) -> bool {
    let Value::Object(ops) = condition else {
        return equal(value, condition);
    };
    if !is_operator_map(ops) {
        return equal(value, condition);
    }
    ops.iter().all(|(op, operand)| match op.as_str() {
        "$ne" => !equal(value, operand),
        "$lt" => value.and_then(|v| compare(v, operand)) == Some(Ordering::Less),
        "$lte" => matches!(value.and_then(|v| compare(v, operand)), Some(Ordering::Less | Ordering::Equal)),
        "$gt" => value.and_then(|v| compare(v, operand)) == Some(Ordering::Greater),
        "$gte" => matches!(value.and_then(|v| compare(v, operand)), Some(Ordering::Greater | Ordering::Equal)),
        "$regex" => regex_match(
            operand.as_str().unwrap_or_default(),
            ops.get("$options").and_then(Value::as_str),
            value,
        ),
        "$options" => true,
        "$not" => !field_matches(value, operand),
        "$in" => operand.as_array().is_some_and(|items| items.iter().any(|i| equal(value, i))),
        "$nin" => operand.as_array().is_none_or(|items| !items.iter().any(|i| equal(value, i))),
        _ => false,
    })
}

fn equal(value: Option<&Value>, expected: &Value) -> bool {
    match (value, expected) {
        (None | Some(Value::Null), Value::Null) => true,
        (Some(v), e) => v == e || compare(v, e) == Some(Ordering::Equal) && !v.is_null(),
        (None, _) => false,
    }
}

/// Evaluate a filter document against one document.
pub fn matches_filter(document: &Record, filter: &Record) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => condition.as_array().is_some_and(|clauses| {
            clauses.iter().all(|c| match c {
                Value::Object(clause) => matches_filter(document, clause),
                _ => false,
            })
        }),
        field => field_matches(document.get(field), condition),
    })
}

impl DocumentStore for MemoryDocumentStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn list_collections(&self) -> Result<Vec<String>> {
        let collections = self
            .collections
            .lock()
            .map_err(|e| EngineError::execution(format!("Failed to acquire collections lock: {e}")))?;
        Ok(collections.iter().map(|(name, _)| name.clone()).collect())
    }

    fn find(&self, query: &DocumentQuery) -> Result<Vec<Record>> {
        let mut found: Vec<Record> = self.with_collection(&query.collection, |documents| {
            documents
                .iter()
                .filter(|d| matches_filter(d, &query.filter))
                .cloned()
                .collect()
        })?;
        found.sort_by(|a, b| {
            query
                .sort
                .iter()
                .map(|(field, direction)| {
                    let ordering = compare(
                        a.get(field).unwrap_or(&Value::Null),
                        b.get(field).unwrap_or(&Value::Null),
                    )
                    .unwrap_or(Ordering::Equal);
                    if *direction < 0 { ordering.reverse() } else { ordering }
                })
                .find(|o| *o != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = if query.limit == 0 {
            usize::MAX
        } else {
            usize::try_from(query.limit).unwrap_or(usize::MAX)
        };
        Ok(found
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| {
                if query.projection.is_empty() {
                    return document;
                }
                document
                    .into_iter()
                    .filter(|(k, _)| k == "_id" || query.projection.contains(k))
                    .collect()
            })
            .collect())
    }

    fn count(&self, collection: &str, filter: &Record) -> Result<u64> {
        self.with_collection(collection, |documents| {
            documents.iter().filter(|d| matches_filter(d, filter)).count() as u64
        })
    }

    fn insert_one(&self, collection: &str, mut document: Record) -> Result<Value> {
        if !document.contains_key("_id") {
            document.insert("_id".to_string(), self.generate_id()?);
        }
        let id = document.get("_id").cloned().unwrap_or(Value::Null);
        self.create_collection(collection)?;
        self.with_collection(collection, |documents| documents.push(document))?;
        Ok(id)
    }

    fn update_one(&self, collection: &str, filter: &Record, set: Record) -> Result<u64> {
        self.with_collection(collection, |documents| {
            match documents.iter_mut().find(|d| matches_filter(d, filter)) {
                Some(document) => {
                    for (key, value) in set {
                        document.insert(key, value);
                    }
                    1
                }
                None => 0,
            }
        })
    }

    fn delete_one(&self, collection: &str, filter: &Record) -> Result<u64> {
        self.with_collection(collection, |documents| {
            match documents.iter().position(|d| matches_filter(d, filter)) {
                Some(index) => {
                    documents.remove(index);
                    1
                }
                None => 0,
            }
        })
    }

    fn delete_many(&self, collection: &str, filter: &Record) -> Result<u64> {
        self.with_collection(collection, |documents| {
            let before = documents.len();
            documents.retain(|d| !matches_filter(d, filter));
            (before - documents.len()) as u64
        })
    }

    fn create_collection(&self, name: &str) -> Result<()> {
        let mut collections = self
            .collections
            .lock()
            .map_err(|e| EngineError::execution(format!("Failed to acquire collections lock: {e}")))?;
        if !collections.iter().any(|(n, _)| n == name) {
            collections.push((name.to_string(), Vec::new()));
        }
        Ok(())
    }
}

/// Three customers (two owned by `u1`) plus an empty relation registry.
pub fn seeded_store() -> MemoryDocumentStore {
    let customer = |n: u64, name: &str, owner: &str| {
        json!({
            "_id": {"$oid": format!("{n:024x}")},
            "name": name,
            "vip": false,
            "owner": owner,
            "deletedAt": null
        })
    };
    MemoryDocumentStore::new()
        .with_documents(
            "customers",
            vec![
                customer(1, "Globex", "u1"),
                customer(2, "Acme", "u1"),
                customer(3, "Initech", "u2"),
            ],
        )
        .with_documents("_relations", Vec::new())
}

/// A façade over an in-memory document store.
pub fn memory_query(store: MemoryDocumentStore, config: EngineConfig) -> Query {
    let datasource = DocumentDatasource::new(store, config.clone());
    Query::new(Box::new(datasource), config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn doc(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    #[rstest]
    #[case(json!({"n": 5}), true)]
    #[case(json!({"n": {"$gte": 5, "$lt": 6}}), true)]
    #[case(json!({"n": {"$in": [1, 2]}}), false)]
    #[case(json!({"s": {"$regex": "^AB", "$options": "i"}}), true)]
    #[case(json!({"s": {"$not": {"$regex": "^ab"}}}), false)]
    #[case(json!({"missing": null}), true)]
    #[case(json!({"s": {"$ne": null}}), true)]
    #[case(json!({"$and": [{"n": 5}, {"s": "abc"}]}), true)]
    fn test_matches_filter(#[case] filter: Value, #[case] expected: bool) {
        let document = doc(json!({"n": 5, "s": "abc"}));
        assert_eq!(matches_filter(&document, &doc(filter)), expected);
    }
}
