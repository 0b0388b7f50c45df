//! CLI argument definitions.
//!
//! This module contains the top-level CLI structure and shared types.
//! Individual command definitions are in the `commands` module.

use clap::Parser;

use crate::commands::Command;
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Connection URL of the backend
    ///
    /// If not specified, the database is taken from:
    ///   1. .datasource_engine.json (current directory)
    ///   2. the DATABASE_URL environment variable
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Output format
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    pub format: OutputFormat,

    /// Log filter, e.g. `debug` or `datasource_engine=trace` (defaults to RUST_LOG, then info)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Request id prefixed to every log line of this invocation
    #[arg(long, global = true)]
    pub request_id: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}
