mod execute;

use std::error::Error;

use clap::Args;

use crate::commands::{CommandRunner, Execute, ReadArgs};
use crate::output::{OutputFormat, Outputable};
use crate::query::Query;
use crate::types::RequestContext;

/// Fetch the first record matching the filters
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  datasource_engine find customers id=7
  datasource_engine find customers 'email[like]=%@acme.com' -f id,email
  datasource_engine find orders id=12 -r customers -f id,customers.name")]
pub struct FindCmd {
    /// Table or collection name
    pub table: String,

    /// Filters as `column=value` or `column[operator]=value`
    #[arg(value_name = "FILTER")]
    pub filters: Vec<String>,

    #[command(flatten)]
    pub read: ReadArgs,
}

impl CommandRunner for FindCmd {
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
