mod execute;

use std::error::Error;

use clap::Args;

use crate::commands::{parse_record, CommandRunner, Execute};
use crate::output::{OutputFormat, Outputable};
use crate::query::Query;
use crate::types::{Record, RequestContext};

/// Check a payload against the table's unique columns
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  datasource_engine unique customers -d '{\"email\": \"ops@acme.com\"}'
  datasource_engine unique customers -d '{\"email\": \"ops@acme.com\"}' --id 7   # Ignore record 7")]
pub struct UniqueCmd {
    /// Table or collection name
    pub table: String,

    /// Candidate values as a JSON object
    #[arg(short, long, value_parser = parse_record)]
    pub data: Record,

    /// Primary key of the record being edited, excluded from the check
    #[arg(long)]
    pub id: Option<String>,
}

impl CommandRunner for UniqueCmd {
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
