//! Document store backend.
//!
//! [`DocumentDatasource`] implements the operation contract over any
//! [`DocumentStore`]. Predicates compile to filter documents, there is no JOIN
//! step (relations are expanded with a second lookup per parent document) and
//! DDL is limited to creating an empty collection.

mod filter;
mod inference;

pub use filter::{
    compile_filter, compile_sort, is_object_id, like_to_regex, to_document, to_document_value,
    DOCUMENT_CAPS, OBJECT_ID,
};
pub use inference::{infer_schema, ID_FIELD};

use std::fmt;

use chrono::DateTime;
use log::{debug, error, warn};
use serde_json::Value;

use crate::coercion::{coerce_schema_row_inbound, now_outbound, INBOUND_DATE_FORMAT};
use crate::config::EngineConfig;
use crate::db::{Datasource, SchemaCatalog};
use crate::error::{EngineError, Result};
use crate::relations::expand_by_lookup;
use crate::types::{
    get_primary_key, Column, ColumnType, CreateOneOptions, DeleteOneOptions, DeleteResponse,
    FindOptions, Operator, Predicate, Record, RequestContext, Schema, UniqueCheckOptions,
    UniqueCheckResponse, UpdateOneOptions,
};

/// A compiled read against one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentQuery {
    pub collection: String,
    pub filter: Record,
    /// Fields to return; empty means the whole document.
    pub projection: Vec<String>,
    /// `(field, 1 | -1)` pairs.
    pub sort: Vec<(String, i32)>,
    pub skip: u64,
    pub limit: u64,
}

impl DocumentQuery {
    pub fn new(collection: impl Into<String>, filter: Record) -> Self {
        Self {
            collection: collection.into(),
            filter,
            projection: Vec::new(),
            sort: Vec::new(),
            skip: 0,
            limit: 0,
        }
    }
}

impl fmt::Display for DocumentQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "find {} filter={} sort={:?} skip={} limit={}",
            self.collection,
            Value::Object(self.filter.clone()),
            self.sort,
            self.skip,
            self.limit
        )
    }
}

/// Driver seam for document stores. Documents travel as extended JSON.
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &'static str {
        "mongodb"
    }

    fn ping(&self) -> Result<()>;

    fn list_collections(&self) -> Result<Vec<String>>;

    /// A `limit` of 0 means no limit.
    fn find(&self, query: &DocumentQuery) -> Result<Vec<Record>>;

    fn count(&self, collection: &str, filter: &Record) -> Result<u64>;

    /// Insert and return the stored `_id`.
    fn insert_one(&self, collection: &str, document: Record) -> Result<Value>;

    /// Apply `$set` to the first match; returns the matched count.
    fn update_one(&self, collection: &str, filter: &Record, set: Record) -> Result<u64>;

    fn delete_one(&self, collection: &str, filter: &Record) -> Result<u64>;

    fn delete_many(&self, collection: &str, filter: &Record) -> Result<u64>;

    fn create_collection(&self, name: &str) -> Result<()>;
}

/// Replace extended JSON wrappers with the caller-facing forms: object ids
/// become hex strings, timestamps ISO-8601 strings.
pub fn surface(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.len() == 1 => {
            if let Some(Value::String(oid)) = map.get("$oid") {
                return Value::String(oid.clone());
            }
            if let Some(date) = map.remove("$date") {
                return surface_date(date);
            }
            if let Some(Value::String(n)) = map.get("$numberLong").or_else(|| map.get("$numberDecimal")) {
                return crate::coercion::parse_number(n)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(n.clone()));
            }
            Value::Object(map.into_iter().map(|(k, v)| (k, surface(v))).collect())
        }
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, surface(v))).collect()),
        Value::Array(items) => Value::Array(items.into_iter().map(surface).collect()),
        other => other,
    }
}

fn surface_date(date: Value) -> Value {
    let parsed = match &date {
        Value::String(s) => DateTime::parse_from_rfc3339(s).ok().map(|d| d.naive_utc()),
        Value::Object(map) => map
            .get("$numberLong")
            .and_then(Value::as_str)
            .and_then(|ms| ms.parse::<i64>().ok())
            .and_then(DateTime::from_timestamp_millis)
            .map(|d| d.naive_utc()),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|d| d.naive_utc()),
        _ => None,
    };
    match parsed {
        Some(dt) => Value::String(dt.format(INBOUND_DATE_FORMAT).to_string()),
        None => date,
    }
}

pub fn surface_record(record: Record) -> Record {
    record.into_iter().map(|(k, v)| (k, surface(v))).collect()
}

/// The operation contract over a [`DocumentStore`].
pub struct DocumentDatasource<S> {
    store: S,
    config: EngineConfig,
}

impl<S: DocumentStore> DocumentDatasource<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn log_failure(&self, ctx: &RequestContext, operation: &str, detail: &str, err: EngineError) -> EngineError {
        error!(
            "[{}] {} {} failed: {}\n  {}",
            ctx.label(),
            self.store.name(),
            operation,
            err,
            detail
        );
        err
    }

    fn compile(&self, options: &FindOptions) -> Result<DocumentQuery> {
        let mut query = DocumentQuery::new(
            options.table(),
            compile_filter(&options.schema, &options.filters)?,
        );
        if !options.fields.is_empty() {
            query.projection = options.fields.clone();
            for request in &options.relations {
                let column = &request.relation.org_column;
                if !query.projection.contains(column) {
                    query.projection.push(column.clone());
                }
            }
        }
        query.sort = compile_sort(&options.sort);
        query.skip = options.offset;
        query.limit = options.limit;
        Ok(query)
    }

    fn fetch(&self, ctx: &RequestContext, options: &FindOptions) -> Result<Vec<Record>> {
        let query = self.compile(options)?;
        debug!("[{}] {}: {}", ctx.label(), self.store.name(), query);
        let rows: Vec<Record> = self
            .store
            .find(&query)
            .map_err(|e| self.log_failure(ctx, "find", &query.to_string(), e))?
            .into_iter()
            .map(|row| coerce_schema_row_inbound(&options.schema, surface_record(row)))
            .collect();
        if options.relations.is_empty() {
            return Ok(rows);
        }
        Ok(expand_by_lookup(ctx, options, rows, self.config.max_limit, false, |lookup| {
            self.fetch(ctx, lookup)
        }))
    }

    fn key_filter(schema: &Schema, primary_key: &str, id: &Value) -> Result<Record> {
        compile_filter(schema, &[Predicate::equals(primary_key, id.clone())])
    }

    fn find_by_key(&self, ctx: &RequestContext, schema: &Schema, primary_key: &str, id: Value) -> Result<Record> {
        let options = FindOptions::new(schema.clone()).with_filter(Predicate::equals(primary_key, id));
        Ok(self.find_one(ctx, &options)?.unwrap_or_default())
    }
}

impl<S: DocumentStore> SchemaCatalog for DocumentDatasource<S> {
    /// Infer from one sampled document. An existing but empty collection only
    /// reports its `_id`.
    fn get_schema(&self, ctx: &RequestContext, table: &str) -> Result<Schema> {
        let collections = self.store.list_collections()?;
        if !collections.iter().any(|c| c == table) {
            return Err(EngineError::SchemaNotFound {
                table: table.to_string(),
            });
        }

        let mut sample_query = DocumentQuery::new(table, Record::new());
        sample_query.limit = 1;
        debug!("[{}] {}: {}", ctx.label(), self.store.name(), sample_query);
        let sample = self.store.find(&sample_query)?.into_iter().next();

        let registry_name = &self.config.relation_registry;
        let registry = if collections.iter().any(|c| c == registry_name) {
            self.store
                .find(&DocumentQuery::new(registry_name.as_str(), Record::new()))
                .unwrap_or_else(|e| {
                    warn!("[{}] relation registry unreadable: {}", ctx.label(), e);
                    Vec::new()
                })
        } else {
            Vec::new()
        };

        Ok(match sample {
            Some(sample) => infer_schema(table, &sample, &collections, &registry),
            None => {
                let mut id = Column::new(ID_FIELD, ColumnType::String).with_native_type(OBJECT_ID);
                id.primary_key = true;
                id.nullable = false;
                let mut schema = Schema::new(table, vec![id]);
                for relation in infer_schema(table, &Record::new(), &collections, &registry).relations {
                    schema.add_relation(relation);
                }
                schema
            }
        })
    }
}

impl<S: DocumentStore> Datasource for DocumentDatasource<S> {
    fn backend_name(&self) -> &'static str {
        self.store.name()
    }

    fn check_connection(&self, ctx: &RequestContext) -> Result<bool> {
        match self.store.ping() {
            Ok(()) => Ok(true),
            Err(e) => {
                warn!("[{}] {} connection check failed: {}", ctx.label(), self.store.name(), e);
                Ok(false)
            }
        }
    }

    fn list_tables(&self, _ctx: &RequestContext) -> Result<Vec<String>> {
        let registry = &self.config.relation_registry;
        Ok(self
            .store
            .list_collections()?
            .into_iter()
            .filter(|c| c != registry)
            .collect())
    }

    fn create_one(&self, ctx: &RequestContext, options: &CreateOneOptions) -> Result<Record> {
        let schema = &options.schema;
        let primary_key = get_primary_key(schema)?;
        let mut document = to_document(schema, &options.data)?;
        if document.get(primary_key).is_some_and(Value::is_null) {
            document.remove(primary_key);
        }

        debug!("[{}] {}: insert into {}", ctx.label(), self.store.name(), schema.table);
        let id = self
            .store
            .insert_one(&schema.table, document)
            .map_err(|e| self.log_failure(ctx, "insert", &schema.table, e))?;
        self.find_by_key(ctx, schema, primary_key, surface(id))
    }

    fn find_one(&self, ctx: &RequestContext, options: &FindOptions) -> Result<Option<Record>> {
        let single = options.clone().with_page(1, 0);
        Ok(self.fetch(ctx, &single)?.into_iter().next())
    }

    fn find_many(&self, ctx: &RequestContext, options: &FindOptions) -> Result<Vec<Record>> {
        self.fetch(ctx, options)
    }

    fn find_total_records(&self, ctx: &RequestContext, options: &FindOptions) -> Result<u64> {
        let filter = compile_filter(&options.schema, &options.filters)?;
        debug!(
            "[{}] {}: count {} filter={}",
            ctx.label(),
            self.store.name(),
            options.table(),
            Value::Object(filter.clone())
        );
        self.store
            .count(options.table(), &filter)
            .map_err(|e| self.log_failure(ctx, "count", options.table(), e))
    }

    fn update_one(&self, ctx: &RequestContext, options: &UpdateOneOptions) -> Result<Record> {
        let schema = &options.schema;
        let primary_key = get_primary_key(schema)?;
        let mut data = options.data.clone();
        data.remove(primary_key);
        let set = to_document(schema, &data)?;

        if !set.is_empty() {
            let filter = Self::key_filter(schema, primary_key, &options.id)?;
            debug!(
                "[{}] {}: update {} filter={} set={}",
                ctx.label(),
                self.store.name(),
                schema.table,
                Value::Object(filter.clone()),
                Value::Object(set.clone())
            );
            self.store
                .update_one(&schema.table, &filter, set)
                .map_err(|e| self.log_failure(ctx, "update", &schema.table, e))?;
        }
        self.find_by_key(ctx, schema, primary_key, options.id.clone())
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

        let filter = Self::key_filter(schema, primary_key, &options.id)?;
        debug!(
            "[{}] {}: delete from {} filter={}",
            ctx.label(),
            self.store.name(),
            schema.table,
            Value::Object(filter.clone())
        );
        let deleted = self
            .store
            .delete_one(&schema.table, &filter)
            .map_err(|e| self.log_failure(ctx, "delete", &schema.table, e))?;
        Ok(DeleteResponse { deleted })
    }

    fn unique_check(
        &self,
        ctx: &RequestContext,
        options: &UniqueCheckOptions,
    ) -> Result<UniqueCheckResponse> {
        let schema = &options.schema;
        for column in schema.unique_columns() {
            let Some(value) = options.data.get(&column.field).filter(|v| !v.is_null()) else {
                continue;
            };
            let mut predicates = vec![Predicate::equals(&column.field, value.clone())];
            if let (Some(id), Some(primary_key)) = (&options.id, schema.primary_key.as_deref()) {
                predicates.push(Predicate::new(primary_key, Operator::NotEquals, id.clone()));
            }
            let filter = compile_filter(schema, &predicates)?;
            if self.store.count(&schema.table, &filter)? > 0 {
                debug!("[{}] duplicate {}.{} = {}", ctx.label(), schema.table, column.field, value);
                return Ok(UniqueCheckResponse::duplicate(&column.field, value));
            }
        }
        Ok(UniqueCheckResponse::valid())
    }

    fn create_table(&self, ctx: &RequestContext, schema: &Schema) -> Result<bool> {
        debug!("[{}] {}: create collection {}", ctx.label(), self.store.name(), schema.table);
        self.store.create_collection(&schema.table)?;
        Ok(true)
    }

    fn truncate(&self, ctx: &RequestContext, table: &str) -> Result<()> {
        debug!("[{}] {}: delete all from {}", ctx.label(), self.store.name(), table);
        self.store.delete_many(table, &Record::new())?;
        Ok(())
    }
}
