mod cli_tests;
mod execute;

use std::error::Error;

use clap::Args;

use crate::commands::{CommandRunner, Execute};
use crate::output::{OutputFormat, Outputable};
use crate::query::Query;
use crate::types::RequestContext;

/// Remove every record of a table
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  datasource_engine truncate audit_log --yes")]
pub struct TruncateCmd {
    /// Table or collection name
    pub table: String,

    /// Confirm the removal; nothing is deleted without it
    #[arg(long)]
    pub yes: bool,
}

impl CommandRunner for TruncateCmd {
    fn run(
        self,
        query: &Query,
        ctx: &RequestContext,
        format: OutputFormat,
    ) -> Result<String, Box<dyn Error>> {
        let result = self.execute(query, ctx)?;
        Ok(result.format(format))
    }
}
