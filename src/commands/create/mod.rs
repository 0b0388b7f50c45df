mod execute;

use std::error::Error;

use clap::Args;

use crate::commands::{parse_record, CommandRunner, Execute};
use crate::output::{OutputFormat, Outputable};
use crate::query::Query;
use crate::types::{Record, RequestContext};

/// Insert one record
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  datasource_engine create customers -d '{\"name\": \"Acme\", \"vip\": true}'
  datasource_engine create orders --data '{\"customerId\": 7, \"total\": 99.5}' -o json")]
pub struct CreateCmd {
    /// Table or collection name
    pub table: String,

    /// Record as a JSON object
    #[arg(short, long, value_parser = parse_record)]
    pub data: Record,
}

impl CommandRunner for CreateCmd {
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
