//! Command definitions and implementations.
//!
//! Each command is defined in its own module with:
//! - The command struct with clap attributes for CLI parsing
//! - An `Execute` implementation mapping it onto one façade verb
//! - CLI parsing tests built from the declarative test macros

mod check;
mod create;
mod create_table;
mod delete;
mod find;
mod find_many;
mod schema;
mod tables;
mod truncate;
mod unique;
mod update;

pub use check::CheckCmd;
pub use create::CreateCmd;
pub use create_table::CreateTableCmd;
pub use delete::DeleteCmd;
pub use find::FindCmd;
pub use find_many::FindManyCmd;
pub use schema::SchemaCmd;
pub use tables::TablesCmd;
pub use truncate::TruncateCmd;
pub use unique::UniqueCmd;
pub use update::UpdateCmd;

use std::error::Error;

use clap::{Args, Subcommand};
use enum_dispatch::enum_dispatch;
use serde_json::Value;

use crate::output::OutputFormat;
use crate::query::Query;
use crate::types::{Record, RequestContext};
use crate::validation::RequestParams;

/// Trait for executing commands with command-specific result types.
pub trait Execute {
    type Output: crate::output::Outputable;

    fn execute(self, query: &Query, ctx: &RequestContext) -> Result<Self::Output, Box<dyn Error>>;
}

/// Execute a command and format its result.
#[enum_dispatch]
pub trait CommandRunner {
    fn run(
        self,
        query: &Query,
        ctx: &RequestContext,
        format: OutputFormat,
    ) -> Result<String, Box<dyn Error>>;
}

#[enum_dispatch(CommandRunner)]
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check that the backend is reachable
    Check(CheckCmd),

    /// List the tables or collections of the backend
    Tables(TablesCmd),

    /// Show the introspected schema of a table
    Schema(SchemaCmd),

    /// Fetch the first record matching the filters
    Find(FindCmd),

    /// Fetch one page of records matching the filters
    FindMany(FindManyCmd),

    /// Insert one record
    Create(CreateCmd),

    /// Update one record by primary key
    Update(UpdateCmd),

    /// Delete one record by primary key (soft delete when configured)
    Delete(DeleteCmd),

    /// Check a payload against the table's unique columns
    Unique(UniqueCmd),

    /// Remove every record of a table
    Truncate(TruncateCmd),

    /// Create a table from a JSON schema definition
    CreateTable(CreateTableCmd),
}

/// Directives shared by the read commands.
///
/// They are folded into the request parameters after the positional
/// `key=value` filters, so they take precedence over a filter argument
/// with the same reserved key.
#[derive(Args, Debug, Clone, Default)]
pub struct ReadArgs {
    /// Comma-separated columns to return (dotted names select relation columns)
    #[arg(short, long)]
    pub fields: Option<String>,

    /// Comma-separated related tables to attach, optionally `table:inner|left|right`
    #[arg(short, long)]
    pub relations: Option<String>,

    /// Comma-separated sort directives, e.g. `name.asc,createdAt.desc`
    #[arg(short, long)]
    pub sort: Option<String>,
}

impl ReadArgs {
    /// Build request parameters from positional filters plus these directives.
    pub fn params(&self, filters: &[String]) -> crate::error::Result<RequestParams> {
        let mut params = RequestParams::from_args(filters)?;
        if let Some(fields) = &self.fields {
            params.insert("fields", fields.as_str());
        }
        if let Some(relations) = &self.relations {
            params.insert("relations", relations.as_str());
        }
        if let Some(sort) = &self.sort {
            params.insert("sort", sort.as_str());
        }
        Ok(params)
    }
}

/// Parse a JSON object argument into a record.
pub fn parse_record(raw: &str) -> Result<Record, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {other}")),
        Err(e) => Err(format!("invalid JSON: {e}")),
    }
}

/// Interpret a primary key argument: canonical integers become numbers,
/// anything else (including zero-padded hex ids) stays a string.
pub fn parse_id(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(n) if n.to_string() == raw => Value::from(n),
        _ => Value::String(raw.to_string()),
    }
}
