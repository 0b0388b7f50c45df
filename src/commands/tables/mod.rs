mod execute;

use std::error::Error;

use clap::Args;

use crate::commands::{CommandRunner, Execute};
use crate::output::{OutputFormat, Outputable};
use crate::query::Query;
use crate::types::RequestContext;

/// List the tables or collections of the backend
#[derive(Args, Debug, Default)]
#[command(after_help = "\
Examples:
  datasource_engine tables
  datasource_engine tables -o json")]
pub struct TablesCmd {}

impl CommandRunner for TablesCmd {
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
