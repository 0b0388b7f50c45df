//! REST-backed tables (Airtable).
//!
//! Predicates compile to a formula string sent as `filterByFormula`. The list
//! endpoint pages with an opaque offset token, so pagination is applied on the
//! client after every page has been fetched. Record links are expanded by
//! fetching the linked records by id.

mod formula;
#[cfg(feature = "airtable")]
mod http;
mod metadata;

pub use formula::{compile_formula, RECORD_ID, REST_CAPS};
#[cfg(feature = "airtable")]
pub use http::HttpTransport;
pub use metadata::{
    field_definition, find_table, schema_from_table, FieldMeta, TableMeta, TablesResponse,
    RECORD_ID_TYPE,
};

use log::{debug, error, warn};
use serde_json::{json, Value};

use crate::coercion::{coerce_outbound, coerce_schema_row_inbound, now_outbound, parse_datetime, INBOUND_DATE_FORMAT};
use crate::config::EngineConfig;
use crate::db::{Datasource, SchemaCatalog};
use crate::error::{EngineError, Result};
use crate::types::{
    ColumnType, CreateOneOptions, DeleteOneOptions, DeleteResponse, FindOptions, Operator,
    Predicate, Record, RelationRequest, RequestContext, Schema, SortCondition, SortDirection,
    UniqueCheckOptions, UniqueCheckResponse, UpdateOneOptions,
};

/// Records per list request; the API maximum.
pub const PAGE_SIZE: u64 = 100;

/// Records per batch delete request; the API maximum.
pub const DELETE_BATCH: usize = 10;

/// HTTP seam. Paths are relative to the API root; bodies are JSON.
pub trait RestTransport: Send + Sync {
    fn get(&self, path: &str, query: &[(String, String)]) -> Result<Value>;

    fn post(&self, path: &str, body: &Value) -> Result<Value>;

    fn patch(&self, path: &str, body: &Value) -> Result<Value>;

    fn delete(&self, path: &str, query: &[(String, String)]) -> Result<Value>;
}

#[cfg(feature = "airtable")]
pub type AirtableDatasource = RestDatasource<HttpTransport>;

#[cfg(feature = "airtable")]
pub fn connect(
    api_key: &str,
    base_id: &str,
    endpoint: &str,
    engine: &EngineConfig,
) -> Result<AirtableDatasource> {
    let transport = HttpTransport::new(api_key, endpoint)?;
    log::info!("Using Airtable base {} at {}", base_id, endpoint);
    Ok(RestDatasource::new(transport, base_id, engine.clone()))
}

/// A flattened list query.
#[derive(Debug, Clone, Default)]
struct ListQuery<'a> {
    formula: Option<String>,
    sort: &'a [SortCondition],
    fields: Vec<String>,
    max_records: Option<u64>,
}

impl ListQuery<'_> {
    fn params(&self) -> Vec<(String, String)> {
        let mut params = vec![("pageSize".to_string(), PAGE_SIZE.to_string())];
        if let Some(formula) = &self.formula {
            params.push(("filterByFormula".to_string(), formula.clone()));
        }
        let sortable = self.sort.iter().filter(|s| !s.column.contains('.'));
        for (i, sort) in sortable.enumerate() {
            let direction = match sort.direction {
                SortDirection::Asc => "asc",
                SortDirection::Desc => "desc",
            };
            params.push((format!("sort[{i}][field]"), sort.column.clone()));
            params.push((format!("sort[{i}][direction]"), direction.to_string()));
        }
        for field in &self.fields {
            params.push(("fields[]".to_string(), field.clone()));
        }
        if let Some(max) = self.max_records {
            params.push(("maxRecords".to_string(), max.to_string()));
        }
        params
    }
}

/// `{"id": .., "fields": {..}}` to a flat record with the id under [`RECORD_ID`].
fn flatten(record: &Value) -> Record {
    let mut out = Record::new();
    out.insert(
        RECORD_ID.to_string(),
        record.get("id").cloned().unwrap_or(Value::Null),
    );
    if let Some(Value::Object(fields)) = record.get("fields") {
        for (key, value) in fields {
            out.insert(key.clone(), value.clone());
        }
    }
    out
}

fn id_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Payload fields for a create or update. The record id is never written.
fn to_fields(schema: &Schema, data: &Record) -> Result<Record> {
    let mut fields = Record::new();
    for (key, value) in data {
        if key == RECORD_ID {
            continue;
        }
        let column = schema
            .column(key)
            .ok_or_else(|| EngineError::ColumnNotFound {
                table: schema.table.clone(),
                column: key.clone(),
            })?;
        let mut value = coerce_outbound(column, value, REST_CAPS)?;
        if column.column_type == ColumnType::Date {
            if let Some(dt) = value.as_str().and_then(parse_datetime) {
                value = Value::String(dt.format(INBOUND_DATE_FORMAT).to_string());
            }
        }
        if column.foreign_key && value.is_string() {
            value = Value::Array(vec![value]);
        }
        fields.insert(key.clone(), value);
    }
    Ok(fields)
}

/// Linked record ids held by a link field.
fn linked_ids(value: Option<&Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).cloned().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other.clone()],
    }
}

/// The operation contract over a [`RestTransport`].
pub struct RestDatasource<T> {
    transport: T,
    base_id: String,
    config: EngineConfig,
}

impl<T: RestTransport> RestDatasource<T> {
    pub fn new(transport: T, base_id: impl Into<String>, config: EngineConfig) -> Self {
        Self {
            transport,
            base_id: base_id.into(),
            config,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn table_path(&self, table: &str) -> String {
        format!("v0/{}/{}", self.base_id, table)
    }

    fn record_path(&self, table: &str, id: &Value) -> String {
        format!("{}/{}", self.table_path(table), id_text(id))
    }

    fn meta_path(&self) -> String {
        format!("v0/meta/bases/{}/tables", self.base_id)
    }

    fn log_failure(&self, ctx: &RequestContext, operation: &str, detail: &str, err: EngineError) -> EngineError {
        error!("[{}] airtable {} failed: {}\n  {}", ctx.label(), operation, err, detail);
        err
    }

    fn tables(&self) -> Result<Vec<TableMeta>> {
        let body = self.transport.get(&self.meta_path(), &[])?;
        serde_json::from_value::<TablesResponse>(body)
            .map(|response| response.tables)
            .map_err(|e| EngineError::execution(format!("unexpected tables payload: {e}")))
    }

    /// Fetch every page of a list query.
    fn list(&self, ctx: &RequestContext, table: &str, query: &ListQuery<'_>) -> Result<Vec<Record>> {
        let path = self.table_path(table);
        let params = query.params();
        debug!("[{}] airtable: GET {} {:?}", ctx.label(), path, params);

        let mut records = Vec::new();
        let mut offset: Option<String> = None;
        loop {
            let mut page_params = params.clone();
            if let Some(token) = &offset {
                page_params.push(("offset".to_string(), token.clone()));
            }
            let body = self
                .transport
                .get(&path, &page_params)
                .map_err(|e| self.log_failure(ctx, "list", &path, e))?;
            if let Some(items) = body.get("records").and_then(Value::as_array) {
                records.extend(items.iter().map(flatten));
            }
            offset = body.get("offset").and_then(Value::as_str).map(str::to_string);
            if offset.is_none() {
                break;
            }
        }
        Ok(records)
    }

    fn list_query<'a>(&self, options: &'a FindOptions) -> Result<ListQuery<'a>> {
        let mut fields: Vec<String> = options
            .fields
            .iter()
            .filter(|f| f.as_str() != RECORD_ID)
            .cloned()
            .collect();
        if !fields.is_empty() {
            for request in &options.relations {
                let column = &request.relation.org_column;
                if !fields.contains(column) {
                    fields.push(column.clone());
                }
            }
        }
        Ok(ListQuery {
            formula: compile_formula(&options.schema, &options.filters)?,
            sort: &options.sort,
            fields,
            max_records: None,
        })
    }

    /// One page of rows; pagination is sliced out of the full result.
    fn fetch(&self, ctx: &RequestContext, options: &FindOptions) -> Result<Vec<Record>> {
        let mut query = self.list_query(options)?;
        if options.limit > 0 {
            query.max_records = Some(options.offset.saturating_add(options.limit));
        }
        let offset = usize::try_from(options.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(options.limit).unwrap_or(usize::MAX);

        let rows: Vec<Record> = self
            .list(ctx, options.table(), &query)?
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| coerce_schema_row_inbound(&options.schema, row))
            .collect();
        Ok(rows
            .into_iter()
            .map(|row| self.expand_links(ctx, options, row))
            .collect())
    }

    fn expand_links(&self, ctx: &RequestContext, options: &FindOptions, mut row: Record) -> Record {
        for request in &options.relations {
            let ids = linked_ids(row.get(&request.relation.org_column));
            let related = if ids.is_empty() {
                Vec::new()
            } else {
                self.fetch_linked(ctx, request, ids).unwrap_or_else(|e| {
                    warn!("[{}] relation lookup {} failed: {}", ctx.label(), request.table(), e);
                    Vec::new()
                })
            };
            row.insert(
                request.table().to_string(),
                Value::Array(related.into_iter().map(Value::Object).collect()),
            );
        }
        row
    }

    fn fetch_linked(&self, ctx: &RequestContext, request: &RelationRequest, ids: Vec<Value>) -> Result<Vec<Record>> {
        let Some(schema) = request.schema() else {
            return Ok(Vec::new());
        };
        let predicate = Predicate::new(&request.relation.column, Operator::In, Value::Array(ids));
        let query = ListQuery {
            formula: compile_formula(schema, &[predicate])?,
            fields: request.fields.iter().filter(|f| f.as_str() != RECORD_ID).cloned().collect(),
            max_records: Some(self.config.max_limit),
            ..ListQuery::default()
        };
        Ok(self
            .list(ctx, &schema.table, &query)?
            .into_iter()
            .map(|row| coerce_schema_row_inbound(schema, row))
            .collect())
    }

    fn find_by_id(&self, ctx: &RequestContext, schema: &Schema, id: &Value) -> Result<Record> {
        let path = self.record_path(&schema.table, id);
        debug!("[{}] airtable: GET {}", ctx.label(), path);
        let body = self
            .transport
            .get(&path, &[])
            .map_err(|e| self.log_failure(ctx, "get", &path, e))?;
        Ok(coerce_schema_row_inbound(schema, flatten(&body)))
    }
}

impl<T: RestTransport> SchemaCatalog for RestDatasource<T> {
    fn get_schema(&self, _ctx: &RequestContext, table: &str) -> Result<Schema> {
        let tables = self.tables()?;
        find_table(&tables, table)
            .map(|meta| schema_from_table(meta, &tables))
            .ok_or_else(|| EngineError::SchemaNotFound {
                table: table.to_string(),
            })
    }
}

impl<T: RestTransport> Datasource for RestDatasource<T> {
    fn backend_name(&self) -> &'static str {
        "airtable"
    }

    fn check_connection(&self, ctx: &RequestContext) -> Result<bool> {
        match self.tables() {
            Ok(_) => Ok(true),
            Err(e) => {
                warn!("[{}] airtable connection check failed: {}", ctx.label(), e);
                Ok(false)
            }
        }
    }

    fn list_tables(&self, _ctx: &RequestContext) -> Result<Vec<String>> {
        Ok(self.tables()?.into_iter().map(|t| t.name).collect())
    }

    fn create_one(&self, ctx: &RequestContext, options: &CreateOneOptions) -> Result<Record> {
        let schema = &options.schema;
        let body = json!({
            "fields": to_fields(schema, &options.data)?,
            "typecast": true
        });
        let path = self.table_path(&schema.table);
        debug!("[{}] airtable: POST {} {}", ctx.label(), path, body);
        let created = self
            .transport
            .post(&path, &body)
            .map_err(|e| self.log_failure(ctx, "create", &path, e))?;
        Ok(coerce_schema_row_inbound(schema, flatten(&created)))
    }

    fn find_one(&self, ctx: &RequestContext, options: &FindOptions) -> Result<Option<Record>> {
        let single = options.clone().with_page(1, 0);
        Ok(self.fetch(ctx, &single)?.into_iter().next())
    }

    fn find_many(&self, ctx: &RequestContext, options: &FindOptions) -> Result<Vec<Record>> {
        self.fetch(ctx, options)
    }

    fn find_total_records(&self, ctx: &RequestContext, options: &FindOptions) -> Result<u64> {
        let mut query = self.list_query(options)?;
        query.sort = &[];
        let total = self.list(ctx, options.table(), &query)?.len();
        Ok(u64::try_from(total).unwrap_or(u64::MAX))
    }

    fn update_one(&self, ctx: &RequestContext, options: &UpdateOneOptions) -> Result<Record> {
        let schema = &options.schema;
        let fields = to_fields(schema, &options.data)?;
        if fields.is_empty() {
            return self.find_by_id(ctx, schema, &options.id);
        }
        let body = json!({ "fields": fields, "typecast": true });
        let path = self.record_path(&schema.table, &options.id);
        debug!("[{}] airtable: PATCH {} {}", ctx.label(), path, body);
        let updated = self
            .transport
            .patch(&path, &body)
            .map_err(|e| self.log_failure(ctx, "update", &path, e))?;
        Ok(coerce_schema_row_inbound(schema, flatten(&updated)))
    }

    fn delete_one(&self, ctx: &RequestContext, options: &DeleteOneOptions) -> Result<DeleteResponse> {
        let schema = &options.schema;
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

        let path = self.record_path(&schema.table, &options.id);
        debug!("[{}] airtable: DELETE {}", ctx.label(), path);
        let body = self
            .transport
            .delete(&path, &[])
            .map_err(|e| self.log_failure(ctx, "delete", &path, e))?;
        let deleted = body.get("deleted").and_then(Value::as_bool).unwrap_or(false);
        Ok(DeleteResponse {
            deleted: u64::from(deleted),
        })
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
            if let Some(id) = &options.id {
                predicates.push(Predicate::new(RECORD_ID, Operator::NotEquals, id.clone()));
            }
            let query = ListQuery {
                formula: compile_formula(schema, &predicates)?,
                fields: vec![column.field.clone()],
                max_records: Some(1),
                ..ListQuery::default()
            };
            if !self.list(ctx, &schema.table, &query)?.is_empty() {
                return Ok(UniqueCheckResponse::duplicate(&column.field, value));
            }
        }
        Ok(UniqueCheckResponse::valid())
    }

    /// Create a table through the meta API. The record id is implicit; link
    /// fields are created for relations whose target table exists.
    fn create_table(&self, ctx: &RequestContext, schema: &Schema) -> Result<bool> {
        let tables = self.tables()?;
        let fields: Vec<Value> = schema
            .columns
            .iter()
            .filter(|c| c.field != RECORD_ID)
            .map(|column| {
                let linked = schema
                    .relations
                    .iter()
                    .filter(|r| r.org_column == column.field)
                    .find_map(|r| find_table(&tables, &r.table))
                    .map(|t| t.id.as_str());
                field_definition(column, linked)
            })
            .collect();
        if fields.is_empty() {
            return Err(EngineError::InvalidValue {
                column: "columns".to_string(),
                expected: "at least one field besides the record id".to_string(),
                value: schema.table.clone(),
            });
        }

        let body = json!({ "name": schema.table, "fields": fields });
        let path = self.meta_path();
        debug!("[{}] airtable: POST {} {}", ctx.label(), path, body);
        self.transport
            .post(&path, &body)
            .map_err(|e| self.log_failure(ctx, "create table", &schema.table, e))?;
        Ok(true)
    }

    /// Delete every record in batches.
    fn truncate(&self, ctx: &RequestContext, table: &str) -> Result<()> {
        let query = ListQuery {
            fields: Vec::new(),
            ..ListQuery::default()
        };
        let ids: Vec<String> = self
            .list(ctx, table, &query)?
            .iter()
            .filter_map(|r| r.get(RECORD_ID).and_then(Value::as_str).map(str::to_string))
            .collect();
        let path = self.table_path(table);
        for batch in ids.chunks(DELETE_BATCH) {
            let params: Vec<(String, String)> = batch
                .iter()
                .map(|id| ("records[]".to_string(), id.clone()))
                .collect();
            debug!("[{}] airtable: DELETE {} ({} records)", ctx.label(), path, batch.len());
            self.transport
                .delete(&path, &params)
                .map_err(|e| self.log_failure(ctx, "truncate", &path, e))?;
        }
        Ok(())
    }
}
