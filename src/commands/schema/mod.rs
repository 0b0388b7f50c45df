mod execute;

use std::error::Error;

use clap::Args;

use crate::commands::{CommandRunner, Execute};
use crate::output::{OutputFormat, Outputable};
use crate::query::Query;
use crate::types::RequestContext;

/// Show the introspected schema of a table
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  datasource_engine schema customers
  datasource_engine schema orders -o json")]
pub struct SchemaCmd {
    /// Table or collection name
    pub table: String,
}

impl CommandRunner for SchemaCmd {
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
