//! Storage backends behind one `Datasource` contract.
//!
//! # Architecture
//!
//! Every backend implements [`Datasource`]. The relational backends share a
//! single compiler ([`sql::SqlDatasource`]) parameterised by a dialect
//! strategy and a driver-specific [`sql::SqlExecutor`]. The document store
//! ([`document::DocumentDatasource`]) compiles predicates to filter documents
//! and the REST backend ([`rest::RestDatasource`]) compiles them to formula
//! strings. Drivers are optional cargo features; the compilers are always built.

mod config;
mod escape;
mod query;
mod value;

pub mod document;
pub mod rest;
pub mod sql;

#[cfg(feature = "mongodb")]
pub mod mongo;
#[cfg(feature = "mssql")]
pub mod mssql;
#[cfg(feature = "mysql")]
pub mod mysql;
#[cfg(feature = "oracle")]
pub mod oracle;
#[cfg(feature = "postgres")]
pub mod postgres;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::DatabaseConfig;
pub use escape::{escape_literal, escape_string_for_quote, quote_identifier, quoted_literals};
pub use query::{CompiledQuery, ExecResult};
pub use value::{DatabaseValue, SqlValue};

use crate::error::Result;
use crate::types::{
    CreateOneOptions, DeleteOneOptions, FindOptions, Record, RequestContext, Schema,
    UniqueCheckOptions, UniqueCheckResponse, UpdateOneOptions, DeleteResponse,
};

/// Runtime schema introspection.
pub trait SchemaCatalog {
    /// Introspect one table. Fails with `SchemaNotFound` when it has no columns.
    fn get_schema(&self, ctx: &RequestContext, table: &str) -> Result<Schema>;
}

/// The operation contract every backend implements.
///
/// Options arrive validated, with relation schemas attached and limits
/// resolved to concrete integers.
pub trait Datasource: SchemaCatalog + Send + Sync {
    /// Backend name for logging.
    fn backend_name(&self) -> &'static str;

    /// Cheap round trip; `Ok(false)` when the store answered but is unusable.
    fn check_connection(&self, ctx: &RequestContext) -> Result<bool>;

    fn list_tables(&self, ctx: &RequestContext) -> Result<Vec<String>>;

    /// Insert one row and return it as stored.
    fn create_one(&self, ctx: &RequestContext, options: &CreateOneOptions) -> Result<Record>;

    fn find_one(&self, ctx: &RequestContext, options: &FindOptions) -> Result<Option<Record>>;

    /// One page of rows honouring `limit`/`offset`.
    fn find_many(&self, ctx: &RequestContext, options: &FindOptions) -> Result<Vec<Record>>;

    /// Row count of the filtered set, ignoring pagination.
    fn find_total_records(&self, ctx: &RequestContext, options: &FindOptions) -> Result<u64>;

    /// Update one row by primary key and return it as stored.
    fn update_one(&self, ctx: &RequestContext, options: &UpdateOneOptions) -> Result<Record>;

    fn delete_one(&self, ctx: &RequestContext, options: &DeleteOneOptions)
        -> Result<DeleteResponse>;

    fn unique_check(
        &self,
        ctx: &RequestContext,
        options: &UniqueCheckOptions,
    ) -> Result<UniqueCheckResponse>;

    fn create_table(&self, ctx: &RequestContext, schema: &Schema) -> Result<bool>;

    fn truncate(&self, ctx: &RequestContext, table: &str) -> Result<()>;
}
