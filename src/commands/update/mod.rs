mod execute;

use std::error::Error;

use clap::Args;

use crate::commands::{parse_record, CommandRunner, Execute};
use crate::output::{OutputFormat, Outputable};
use crate::query::Query;
use crate::types::{Record, RequestContext};

/// Update one record by primary key
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  datasource_engine update customers 7 -d '{\"vip\": false}'
  datasource_engine update customers 5f1d7e2a9b1c4a0012345678 --data '{\"name\": \"Acme Corp\"}'")]
pub struct UpdateCmd {
    /// Table or collection name
    pub table: String,

    /// Primary key of the record
    pub id: String,

    /// Changed columns as a JSON object
    #[arg(short, long, value_parser = parse_record)]
    pub data: Record,
}

impl CommandRunner for UpdateCmd {
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
