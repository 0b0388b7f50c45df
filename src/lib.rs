//! datasource_engine library - backend-agnostic data access
//!
//! One query contract (filters, sorts, projections, relations, pagination)
//! compiled for SQL dialects, document stores and REST-backed tables, plus
//! the command and output infrastructure of the operator CLI.

pub mod cli;
pub mod coercion;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod output;
pub mod pagination;
pub mod query;
pub mod relations;
pub mod restriction;
pub mod types;
pub mod validation;

pub use error::{EngineError, Result};
pub use query::{Query, QueryRequest, QueryResponse};

#[macro_use]
pub mod test_macros;

#[cfg(test)]
pub mod test_utils;
