//! End-to-end tests of the query façade over an in-memory SQLite database.
//!
//! Run with: cargo test --features sqlite (enabled by default)

#![cfg(feature = "sqlite")]

use datasource_engine::config::EngineConfig;
use datasource_engine::db::sql::dialect::SqliteDialect;
use datasource_engine::db::sql::SqlDatasource;
use datasource_engine::db::sqlite::SqliteExecutor;
use datasource_engine::restriction::{
    AccessLevel, PermissionOutcome, Restriction, StaticPermissions,
};
use datasource_engine::types::{Column, ColumnType, FindManyResponse, Record, Relation, Schema};
use datasource_engine::validation::RequestParams;
use datasource_engine::{EngineError, Query, QueryRequest, QueryResponse};
use rstest::{fixture, rstest};
use serde_json::{json, Value};

fn customers() -> Schema {
    Schema::new(
        "customers",
        vec![
            Column::new("id", ColumnType::Number).primary(),
            Column::new("name", ColumnType::String).required().unique(),
            Column::new("vip", ColumnType::Boolean),
            Column::new("deletedAt", ColumnType::Date),
        ],
    )
}

fn orders() -> Schema {
    Schema::new(
        "orders",
        vec![
            Column::new("id", ColumnType::Number).primary(),
            Column::new("customerId", ColumnType::Number).foreign(),
            Column::new("total", ColumnType::Number),
        ],
    )
    .with_relation(Relation::new("customers", "id", "orders", "customerId"))
}

fn record(value: Value) -> Record {
    serde_json::from_value(value).unwrap()
}

fn params(pairs: &[(&str, &str)]) -> RequestParams {
    RequestParams::from_pairs(pairs.iter().copied())
}

fn open(config: EngineConfig) -> Query {
    let executor = SqliteExecutor::in_memory().unwrap();
    let datasource = SqlDatasource::new(SqliteDialect, executor, config.clone());
    let query = Query::new(Box::new(datasource), config);
    for schema in [customers(), orders()] {
        query
            .perform(QueryRequest::CreateTable { schema }, None)
            .unwrap();
    }
    query
}

fn create(query: &Query, table: &str, data: Value) -> Record {
    match query
        .perform(
            QueryRequest::Create {
                table: table.into(),
                data: record(data),
            },
            None,
        )
        .unwrap()
    {
        QueryResponse::Record(row) => row,
        other => panic!("expected a record, got {other:?}"),
    }
}

fn page(query: &Query, table: &str, pairs: &[(&str, &str)]) -> FindManyResponse {
    match query
        .perform(
            QueryRequest::FindMany {
                table: table.into(),
                params: params(pairs),
            },
            Some("e2e"),
        )
        .unwrap()
    {
        QueryResponse::Page(page) => page,
        other => panic!("expected a page, got {other:?}"),
    }
}

fn seed(query: &Query) {
    let acme = create(query, "customers", json!({"name": "Acme", "vip": true}));
    let globex = create(query, "customers", json!({"name": "Globex", "vip": false}));
    create(query, "customers", json!({"name": "Initech", "vip": false}));
    create(query, "orders", json!({"customerId": acme["id"], "total": 250}));
    create(query, "orders", json!({"customerId": acme["id"], "total": 40}));
    create(query, "orders", json!({"customerId": globex["id"], "total": 99.5}));
}

#[fixture]
fn query() -> Query {
    let query = open(EngineConfig::default());
    seed(&query);
    query
}

#[rstest]
fn test_tables_and_schema(query: Query) {
    assert_eq!(
        query.perform(QueryRequest::ListTables, None).unwrap(),
        QueryResponse::Tables(vec!["customers".to_string(), "orders".to_string()])
    );

    let schema = query
        .get_schema(&Default::default(), "orders")
        .unwrap();
    assert_eq!(schema.primary_key.as_deref(), Some("id"));
    assert!(schema.column("customerId").is_some_and(|c| c.foreign_key));
    assert!(schema.relation("customers").is_some());

    let customers = query.get_schema(&Default::default(), "customers").unwrap();
    assert!(customers.column("name").is_some_and(|c| c.unique_key));
    assert_eq!(
        customers.column("vip").map(|c| c.column_type),
        Some(ColumnType::Boolean)
    );
    assert!(customers.relation("orders").is_some());
}

#[rstest]
fn test_check_connection(query: Query) {
    assert_eq!(
        query.perform(QueryRequest::CheckConnection, None).unwrap(),
        QueryResponse::Done(true)
    );
}

#[rstest]
fn test_create_reads_back_generated_key(query: Query) {
    let row = create(&query, "customers", json!({"name": "Hooli", "vip": "yes"}));
    assert_eq!(row["id"], json!(4));
    assert_eq!(row["vip"], json!(true));
}

#[rstest]
fn test_unknown_payload_field_rejected(query: Query) {
    let err = query
        .perform(
            QueryRequest::Create {
                table: "customers".into(),
                data: record(json!({"name": "Hooli", "nickname": "H"})),
            },
            None,
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::ColumnNotFound { .. }));
}

#[rstest]
fn test_find_many_pages_with_cursor(query: Query) {
    let first = page(&query, "customers", &[("sort", "name.asc"), ("limit", "2")]);
    assert_eq!(first.total, 3);
    assert_eq!(first.data.len(), 2);
    assert_eq!(first.data[0]["name"], json!("Acme"));
    assert_eq!(first.data[0]["vip"], json!(true));

    let next = first.pagination.page.next.clone().unwrap();
    let second = page(&query, "customers", &[("sort", "name.asc"), ("page", &next)]);
    assert_eq!(second.offset, 2);
    assert_eq!(second.data.len(), 1);
    assert_eq!(second.data[0]["name"], json!("Initech"));
    assert!(second.pagination.page.next.is_none());
}

#[rstest]
#[case(&[("total[gte]", "99.5")], 2)]
#[case(&[("total[lt]", "50")], 1)]
#[case(&[("total[lte]", "99.5"), ("total[gt]", "40")], 1)]
#[case(&[("customerId[in]", "1,2")], 3)]
#[case(&[("customerId[not_in]", "1")], 1)]
fn test_operator_filters(query: Query, #[case] pairs: &[(&str, &str)], #[case] expected: u64) {
    assert_eq!(page(&query, "orders", pairs).total, expected);
}

#[rstest]
fn test_like_filter(query: Query) {
    let result = page(&query, "customers", &[("name[like]", "%tech")]);
    assert_eq!(result.total, 1);
    assert_eq!(result.data[0]["name"], json!("Initech"));
}

#[rstest]
#[case("50%", 1)]
#[case("a_b", 1)]
#[case("cme", 1)]
fn test_search_matches_term_literally(query: Query, #[case] term: &str, #[case] expected: u64) {
    create(&query, "customers", json!({"name": "Save 50% today", "vip": false}));
    create(&query, "customers", json!({"name": "Tab 5000", "vip": false}));
    create(&query, "customers", json!({"name": "a_b corp", "vip": false}));
    create(&query, "customers", json!({"name": "axb corp", "vip": false}));
    assert_eq!(page(&query, "customers", &[("name[search]", term)]).total, expected);
}

#[rstest]
fn test_empty_result_skips_page(query: Query) {
    let result = page(&query, "customers", &[("name", "Hooli")]);
    assert_eq!(result.total, 0);
    assert!(result.data.is_empty());
}

#[rstest]
fn test_relation_nested_under_table(query: Query) {
    let result = page(
        &query,
        "orders",
        &[("relations", "customers"), ("sort", "total.desc")],
    );
    assert_eq!(result.total, 3);
    let first = &result.data[0];
    assert_eq!(first["total"], json!(250));
    assert_eq!(first["customers"][0]["name"], json!("Acme"));
}

#[rstest]
fn test_dotted_filter_attaches_relation(query: Query) {
    let result = page(&query, "orders", &[("customers.name", "Globex")]);
    assert_eq!(result.total, 1);
    assert_eq!(result.data[0]["total"], json!(99.5));
}

#[rstest]
fn test_relation_lookup_mode() {
    let config = EngineConfig {
        join_relations: false,
        ..EngineConfig::default()
    };
    let query = open(config);
    seed(&query);
    let result = page(
        &query,
        "customers",
        &[("relations", "orders"), ("name", "Acme")],
    );
    assert_eq!(result.total, 1);
    let orders = result.data[0]["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 2);
}

#[rstest]
fn test_to_many_relation_same_in_both_modes(#[values(true, false)] join_relations: bool) {
    let query = open(EngineConfig {
        join_relations,
        ..EngineConfig::default()
    });
    seed(&query);
    let result = page(
        &query,
        "customers",
        &[("relations", "orders"), ("name", "Acme")],
    );
    assert_eq!(result.total, 1);
    assert_eq!(result.data.len(), 1);
    assert_eq!(result.data[0]["orders"].as_array().map(Vec::len), Some(2));
}

#[rstest]
#[case("10", 2)]
#[case("200", 1)]
fn test_to_many_filter_matches_parent_once(
    #[values(true, false)] join_relations: bool,
    #[case] threshold: &str,
    #[case] expected: u64,
) {
    let query = open(EngineConfig {
        join_relations,
        ..EngineConfig::default()
    });
    seed(&query);
    let result = page(&query, "customers", &[("orders.total[gt]", threshold)]);
    assert_eq!(result.total, expected);
    assert_eq!(result.data.len() as u64, expected);
}

#[rstest]
fn test_update_and_find(query: Query) {
    let response = query
        .perform(
            QueryRequest::Update {
                table: "customers".into(),
                id: json!(3),
                data: record(json!({"vip": true})),
            },
            None,
        )
        .unwrap();
    match response {
        QueryResponse::Record(row) => {
            assert_eq!(row["name"], json!("Initech"));
            assert_eq!(row["vip"], json!(true));
        }
        other => panic!("expected a record, got {other:?}"),
    }
    assert_eq!(page(&query, "customers", &[("vip", "true")]).total, 2);
}

#[rstest]
#[case(json!({"name": "Acme"}), None, false)]
#[case(json!({"name": "Acme"}), Some(json!(1)), true)]
#[case(json!({"name": "Hooli"}), None, true)]
fn test_unique_check(
    query: Query,
    #[case] data: Value,
    #[case] id: Option<Value>,
    #[case] valid: bool,
) {
    let response = query
        .perform(
            QueryRequest::Unique {
                table: "customers".into(),
                data: record(data),
                id,
            },
            None,
        )
        .unwrap();
    match response {
        QueryResponse::Unique(unique) => assert_eq!(unique.valid, valid),
        other => panic!("expected a unique check, got {other:?}"),
    }
}

#[rstest]
fn test_hard_delete(query: Query) {
    let response = query
        .perform(
            QueryRequest::Delete {
                table: "orders".into(),
                id: json!(2),
            },
            None,
        )
        .unwrap();
    assert_eq!(response, QueryResponse::Deleted(datasource_engine::types::DeleteResponse { deleted: 1 }));
    assert_eq!(page(&query, "orders", &[]).total, 2);
}

#[rstest]
fn test_soft_delete_stamps_column() {
    let config = EngineConfig {
        soft_delete_column: Some("deletedAt".into()),
        ..EngineConfig::default()
    };
    let query = open(config);
    seed(&query);
    query
        .perform(
            QueryRequest::Delete {
                table: "customers".into(),
                id: json!(3),
            },
            None,
        )
        .unwrap();
    let result = page(&query, "customers", &[("deletedAt[not_null]", "")]);
    assert_eq!(result.total, 1);
    assert_eq!(result.data[0]["name"], json!("Initech"));
}

#[rstest]
fn test_truncate(query: Query) {
    query
        .perform(QueryRequest::Truncate { table: "orders".into() }, None)
        .unwrap();
    assert_eq!(page(&query, "orders", &[]).total, 0);
}

#[rstest]
fn test_restricted_reads_and_writes(query: Query) {
    let permissions = StaticPermissions::new()
        .rule(
            Some("acme"),
            "orders",
            None,
            PermissionOutcome::Restricted(Restriction::new("customerId", 1)),
        )
        .rule(None, "customers", Some(AccessLevel::Read), PermissionOutcome::Allow);

    let visible = query
        .perform_authorized(
            QueryRequest::FindMany {
                table: "orders".into(),
                params: RequestParams::new(),
            },
            None,
            &permissions,
            "acme",
        )
        .unwrap();
    match visible {
        QueryResponse::Page(page) => assert_eq!(page.total, 2),
        other => panic!("expected a page, got {other:?}"),
    }

    // Order 3 belongs to customer 2.
    let err = query
        .perform_authorized(
            QueryRequest::Delete {
                table: "orders".into(),
                id: json!(3),
            },
            None,
            &permissions,
            "acme",
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::PermissionDenied { .. }));

    let err = query
        .perform_authorized(
            QueryRequest::Create {
                table: "customers".into(),
                data: record(json!({"name": "Hooli"})),
            },
            None,
            &permissions,
            "acme",
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::PermissionDenied { .. }));
}
