//! The query façade.
//!
//! [`Query::perform`] is the single entry point callers use. It resolves the
//! table schema, turns flat request parameters into validated options,
//! attaches relation schemas, folds in permission restrictions and routes the
//! verb to the configured [`Datasource`].

use log::{debug, info};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::db::{DatabaseConfig, Datasource};
use crate::error::{EngineError, Result};
use crate::pagination::Pagination;
use crate::relations::{referenced_relations, resolve_relations};
use crate::restriction::{
    restrict_predicates, restrict_record, restriction_for, AccessLevel, PermissionSource,
    Restriction,
};
use crate::types::{
    get_primary_key, CreateOneOptions, DeleteOneOptions, DeleteResponse, FindManyResponse,
    FindOptions, Predicate, Record, RequestContext, Schema, UniqueCheckOptions,
    UniqueCheckResponse, UpdateOneOptions,
};
use crate::validation::{
    parse_fields, parse_filters, parse_relations, parse_sort, validate_find, RequestParams,
    RequestedRelation,
};

/// One canonical verb with its inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryRequest {
    Create { table: String, data: Record },
    Find { table: String, params: RequestParams },
    FindMany { table: String, params: RequestParams },
    Update { table: String, id: Value, data: Record },
    Delete { table: String, id: Value },
    Unique { table: String, data: Record, id: Option<Value> },
    Truncate { table: String },
    CreateTable { schema: Schema },
    CheckConnection,
    ListTables,
}

impl QueryRequest {
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Find { .. } => "find",
            Self::FindMany { .. } => "find_many",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Unique { .. } => "unique",
            Self::Truncate { .. } => "truncate",
            Self::CreateTable { .. } => "create_table",
            Self::CheckConnection => "check_connection",
            Self::ListTables => "list_tables",
        }
    }

    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Create { table, .. }
            | Self::Find { table, .. }
            | Self::FindMany { table, .. }
            | Self::Update { table, .. }
            | Self::Delete { table, .. }
            | Self::Unique { table, .. }
            | Self::Truncate { table } => Some(table),
            Self::CreateTable { schema } => Some(&schema.table),
            Self::CheckConnection | Self::ListTables => None,
        }
    }

    /// Access level checked against the permission source; `None` for
    /// verbs that touch no table data.
    pub fn access(&self) -> Option<AccessLevel> {
        match self {
            Self::Find { .. } | Self::FindMany { .. } | Self::Unique { .. } => Some(AccessLevel::Read),
            Self::Create { .. } | Self::CreateTable { .. } => Some(AccessLevel::Create),
            Self::Update { .. } => Some(AccessLevel::Update),
            Self::Delete { .. } | Self::Truncate { .. } => Some(AccessLevel::Delete),
            Self::CheckConnection | Self::ListTables => None,
        }
    }
}

/// Typed result of [`Query::perform`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryResponse {
    Record(Record),
    /// A miss serializes as an empty object.
    #[serde(serialize_with = "found_or_empty")]
    Found(Option<Record>),
    Page(FindManyResponse),
    Deleted(DeleteResponse),
    Unique(UniqueCheckResponse),
    Done(bool),
    Tables(Vec<String>),
}

fn found_or_empty<S: Serializer>(
    found: &Option<Record>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match found {
        Some(record) => record.serialize(serializer),
        None => Record::new().serialize(serializer),
    }
}

pub struct Query {
    datasource: Box<dyn Datasource>,
    config: EngineConfig,
}

impl Query {
    pub fn new(datasource: Box<dyn Datasource>, config: EngineConfig) -> Self {
        Self { datasource, config }
    }

    /// Connect the configured backend.
    pub fn connect(database: &DatabaseConfig, config: EngineConfig) -> Result<Self> {
        let datasource = database.connect(&config)?;
        info!("Using {} backend", datasource.backend_name());
        Ok(Self::new(datasource, config))
    }

    pub fn datasource(&self) -> &dyn Datasource {
        self.datasource.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn get_schema(&self, ctx: &RequestContext, table: &str) -> Result<Schema> {
        self.datasource.get_schema(ctx, table)
    }

    /// Run a request without permission checks.
    pub fn perform(&self, request: QueryRequest, request_id: Option<&str>) -> Result<QueryResponse> {
        let ctx = RequestContext::new(request_id);
        self.execute(&ctx, request, None)
    }

    /// Run a request on behalf of `identity`. A denied request never reaches
    /// the datasource.
    pub fn perform_authorized(
        &self,
        request: QueryRequest,
        request_id: Option<&str>,
        permissions: &dyn PermissionSource,
        identity: &str,
    ) -> Result<QueryResponse> {
        let ctx = RequestContext::new(request_id);
        let restriction = match (request.table(), request.access()) {
            (Some(table), Some(access)) => {
                let outcome = permissions.table_permission(identity, table, access)?;
                debug!("[{}] {} {} on {}: {:?}", ctx.label(), identity, request.verb(), table, outcome);
                restriction_for(outcome, table)?
            }
            _ => None,
        };
        self.execute(&ctx, request, restriction.as_ref())
    }

    /// Turn flat request parameters into validated find options.
    ///
    /// Relations referenced only through dotted filters, sorts or fields are
    /// attached as well.
    pub fn prepare_find(
        &self,
        ctx: &RequestContext,
        table: &str,
        params: &RequestParams,
    ) -> Result<FindOptions> {
        let schema = self.get_schema(ctx, table)?;
        let filters = parse_filters(&schema, params)?;
        let sort = match params.get("sort") {
            Some(raw) => parse_sort(&schema, raw)?,
            None => Vec::new(),
        };
        let (fields, relation_fields) = match params.get("fields") {
            Some(raw) => parse_fields(&schema, raw)?,
            None => (Vec::new(), Vec::new()),
        };
        let mut requested = match params.get("relations") {
            Some(raw) => parse_relations(&schema, raw)?,
            None => Vec::new(),
        };
        let page = self.config.pagination().get(params)?;

        let mut options = FindOptions::new(schema)
            .with_fields(fields)
            .with_filters(filters)
            .with_sort(sort)
            .with_page(page.limit, page.offset);
        for table in referenced_relations(&options) {
            if !requested.iter().any(|r| r.table.eq_ignore_ascii_case(&table)) {
                requested.push(RequestedRelation {
                    table,
                    join: Default::default(),
                });
            }
        }
        options.relations = resolve_relations(
            self.datasource.as_ref(),
            ctx,
            &options.schema,
            &requested,
            &relation_fields,
        )?;
        validate_find(&options)?;
        Ok(options)
    }

    fn execute(
        &self,
        ctx: &RequestContext,
        request: QueryRequest,
        restriction: Option<&Restriction>,
    ) -> Result<QueryResponse> {
        debug!("[{}] perform {}", ctx.label(), request.verb());
        match request {
            QueryRequest::Create { table, mut data } => {
                let schema = self.get_schema(ctx, &table)?;
                restrict_record(&mut data, restriction);
                let created = self
                    .datasource
                    .create_one(ctx, &CreateOneOptions { schema, data })?;
                Ok(QueryResponse::Record(created))
            }
            QueryRequest::Find { table, params } => {
                let mut options = self.prepare_find(ctx, &table, &params)?;
                restrict_predicates(&mut options.filters, restriction);
                Ok(QueryResponse::Found(self.datasource.find_one(ctx, &options)?))
            }
            QueryRequest::FindMany { table, params } => {
                let mut options = self.prepare_find(ctx, &table, &params)?;
                restrict_predicates(&mut options.filters, restriction);
                Ok(QueryResponse::Page(self.find_many(ctx, &options)?))
            }
            QueryRequest::Update { table, id, data } => {
                let schema = self.get_schema(ctx, &table)?;
                self.check_restricted_row(ctx, &schema, &id, restriction)?;
                let mut data = data;
                if let Some(restriction) = restriction {
                    data.remove(&restriction.column);
                }
                let updated = self
                    .datasource
                    .update_one(ctx, &UpdateOneOptions { schema, id, data })?;
                Ok(QueryResponse::Record(updated))
            }
            QueryRequest::Delete { table, id } => {
                let schema = self.get_schema(ctx, &table)?;
                self.check_restricted_row(ctx, &schema, &id, restriction)?;
                let soft_delete = self
                    .config
                    .soft_delete_column
                    .as_ref()
                    .filter(|column| schema.has_column(column))
                    .cloned();
                let deleted = self.datasource.delete_one(
                    ctx,
                    &DeleteOneOptions {
                        schema,
                        id,
                        soft_delete,
                    },
                )?;
                Ok(QueryResponse::Deleted(deleted))
            }
            QueryRequest::Unique { table, data, id } => {
                let schema = self.get_schema(ctx, &table)?;
                let response = self
                    .datasource
                    .unique_check(ctx, &UniqueCheckOptions { schema, data, id })?;
                Ok(QueryResponse::Unique(response))
            }
            QueryRequest::Truncate { table } => {
                if restriction.is_some() {
                    return Err(EngineError::PermissionDenied { table });
                }
                self.datasource.truncate(ctx, &table)?;
                Ok(QueryResponse::Done(true))
            }
            QueryRequest::CreateTable { schema } => {
                if restriction.is_some() {
                    return Err(EngineError::PermissionDenied { table: schema.table });
                }
                Ok(QueryResponse::Done(self.datasource.create_table(ctx, &schema)?))
            }
            QueryRequest::CheckConnection => {
                Ok(QueryResponse::Done(self.datasource.check_connection(ctx)?))
            }
            QueryRequest::ListTables => Ok(QueryResponse::Tables(self.datasource.list_tables(ctx)?)),
        }
    }

    /// Count, then fetch the page unless the count is zero.
    pub fn find_many(&self, ctx: &RequestContext, options: &FindOptions) -> Result<FindManyResponse> {
        let total = self.datasource.find_total_records(ctx, options)?;
        let data = if total == 0 {
            Vec::new()
        } else {
            self.datasource.find_many(ctx, options)?
        };
        Ok(FindManyResponse {
            limit: options.limit,
            offset: options.offset,
            total,
            pagination: Pagination::page(options.limit, options.offset, total),
            data,
        })
    }

    /// A restricted write must target a row the restriction lets the caller see.
    fn check_restricted_row(
        &self,
        ctx: &RequestContext,
        schema: &Schema,
        id: &Value,
        restriction: Option<&Restriction>,
    ) -> Result<()> {
        let Some(restriction) = restriction else {
            return Ok(());
        };
        let primary_key = get_primary_key(schema)?;
        let options = FindOptions::new(schema.clone())
            .with_filter(Predicate::equals(primary_key, id.clone()))
            .with_filter(restriction.predicate());
        match self.datasource.find_one(ctx, &options)? {
            Some(_) => Ok(()),
            None => Err(EngineError::PermissionDenied {
                table: schema.table.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::restriction::{PermissionOutcome, StaticPermissions};
    use crate::test_utils::{memory_query, seeded_store};
    use rstest::{fixture, rstest};
    use serde_json::json;

    #[fixture]
    fn query() -> Query {
        memory_query(seeded_store(), EngineConfig::default())
    }

    fn record(value: Value) -> Record {
        serde_json::from_value(value).unwrap()
    }

    fn params(pairs: &[(&str, &str)]) -> RequestParams {
        RequestParams::from_pairs(pairs.iter().copied())
    }

    fn find_many(query: &Query, request: QueryRequest) -> FindManyResponse {
        match query.perform(request, Some("t")).unwrap() {
            QueryResponse::Page(page) => page,
            other => panic!("expected a page, got {other:?}"),
        }
    }

    #[rstest]
    fn test_find_many_counts_then_pages(query: Query) {
        let page = find_many(
            &query,
            QueryRequest::FindMany {
                table: "customers".into(),
                params: params(&[("limit", "2"), ("sort", "name.asc")]),
            },
        );
        assert_eq!(page.total, 3);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.data[0]["name"], json!("Acme"));
        assert!(page.pagination.page.next.is_some());
        assert!(page.pagination.page.prev.is_none());
    }

    #[rstest]
    fn test_cursor_overrides_limit(query: Query) {
        let cursor = Pagination::set(1, 2);
        let page = find_many(
            &query,
            QueryRequest::FindMany {
                table: "customers".into(),
                params: params(&[("limit", "50"), ("page", cursor.as_str()), ("sort", "name.asc")]),
            },
        );
        assert_eq!((page.limit, page.offset), (1, 2));
        assert_eq!(page.data[0]["name"], json!("Initech"));
        assert!(page.pagination.page.next.is_none());
    }

    #[rstest]
    fn test_unknown_relation_fails_before_query(query: Query) {
        let err = query
            .perform(
                QueryRequest::FindMany {
                    table: "customers".into(),
                    params: params(&[("relations", "suppliers")]),
                },
                None,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::RelationNotFound { .. }));
    }

    #[rstest]
    fn test_find_with_operator_filter(query: Query) {
        let response = query
            .perform(
                QueryRequest::Find {
                    table: "customers".into(),
                    params: params(&[("name[like]", "Glob%")]),
                },
                None,
            )
            .unwrap();
        match response {
            QueryResponse::Found(Some(row)) => assert_eq!(row["name"], json!("Globex")),
            other => panic!("expected a row, got {other:?}"),
        }
    }

    #[rstest]
    fn test_missing_find_serializes_as_empty_object(query: Query) {
        let response = query
            .perform(
                QueryRequest::Find {
                    table: "customers".into(),
                    params: params(&[("name", "Nobody")]),
                },
                None,
            )
            .unwrap();
        assert_eq!(response, QueryResponse::Found(None));
        assert_eq!(serde_json::to_value(&response).unwrap(), json!({}));
    }

    #[rstest]
    fn test_create_then_find_round_trip(query: Query) {
        let created = match query
            .perform(
                QueryRequest::Create {
                    table: "customers".into(),
                    data: record(json!({"name": "Umbrella", "vip": "true"})),
                },
                None,
            )
            .unwrap()
        {
            QueryResponse::Record(row) => row,
            other => panic!("expected a record, got {other:?}"),
        };
        assert_eq!(created["vip"], json!(true));
        let id = created["_id"].as_str().unwrap().to_string();

        let found = query
            .perform(
                QueryRequest::Find {
                    table: "customers".into(),
                    params: params(&[("_id", id.as_str())]),
                },
                None,
            )
            .unwrap();
        assert_eq!(found, QueryResponse::Found(Some(created)));
    }

    #[rstest]
    fn test_soft_delete_keeps_row() {
        let config = EngineConfig {
            soft_delete_column: Some("deletedAt".into()),
            ..EngineConfig::default()
        };
        let query = memory_query(seeded_store(), config);
        let ctx = RequestContext::default();
        let options = query
            .prepare_find(&ctx, "customers", &params(&[("name", "Acme")]))
            .unwrap();
        let row = query.datasource().find_one(&ctx, &options).unwrap().unwrap();

        let response = query
            .perform(
                QueryRequest::Delete {
                    table: "customers".into(),
                    id: row["_id"].clone(),
                },
                None,
            )
            .unwrap();
        assert_eq!(response, QueryResponse::Deleted(DeleteResponse { deleted: 1 }));

        let row = query.datasource().find_one(&ctx, &options).unwrap().unwrap();
        assert!(row["deletedAt"].is_string());
    }

    #[rstest]
    fn test_denied_request_never_runs(query: Query) {
        let permissions = StaticPermissions::new();
        let err = query
            .perform_authorized(QueryRequest::Truncate { table: "customers".into() }, None, &permissions, "u1")
            .unwrap_err();
        assert!(matches!(err, EngineError::PermissionDenied { .. }));
        let page = find_many(
            &query,
            QueryRequest::FindMany {
                table: "customers".into(),
                params: RequestParams::new(),
            },
        );
        assert_eq!(page.total, 3);
    }

    #[rstest]
    fn test_restriction_narrows_reads_and_guards_writes(query: Query) {
        let permissions = StaticPermissions::new().rule(
            Some("u1"),
            "customers",
            None,
            PermissionOutcome::Restricted(crate::restriction::Restriction::new("owner", "u1")),
        );
        let page = match query
            .perform_authorized(
                QueryRequest::FindMany {
                    table: "customers".into(),
                    params: RequestParams::new(),
                },
                None,
                &permissions,
                "u1",
            )
            .unwrap()
        {
            QueryResponse::Page(page) => page,
            other => panic!("expected a page, got {other:?}"),
        };
        assert_eq!(page.total, 2);

        let ctx = RequestContext::default();
        let foreign = query
            .prepare_find(&ctx, "customers", &params(&[("owner", "u2")]))
            .unwrap();
        let foreign = query.datasource().find_one(&ctx, &foreign).unwrap().unwrap();
        let err = query
            .perform_authorized(
                QueryRequest::Update {
                    table: "customers".into(),
                    id: foreign["_id"].clone(),
                    data: record(json!({"name": "Stolen"})),
                },
                None,
                &permissions,
                "u1",
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::PermissionDenied { .. }));

        let created = query
            .perform_authorized(
                QueryRequest::Create {
                    table: "customers".into(),
                    data: record(json!({"name": "Hooli", "owner": "u2"})),
                },
                None,
                &permissions,
                "u1",
            )
            .unwrap();
        match created {
            QueryResponse::Record(row) => assert_eq!(row["owner"], json!("u1")),
            other => panic!("expected a record, got {other:?}"),
        }
    }

    #[rstest]
    fn test_list_tables_hides_registry(query: Query) {
        let response = query.perform(QueryRequest::ListTables, None).unwrap();
        assert_eq!(
            response,
            QueryResponse::Tables(vec!["customers".to_string()])
        );
    }
}
