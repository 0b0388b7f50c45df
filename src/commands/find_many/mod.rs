mod execute;

use std::error::Error;

use clap::Args;

use crate::commands::{CommandRunner, Execute, ReadArgs};
use crate::output::{OutputFormat, Outputable};
use crate::query::Query;
use crate::types::RequestContext;

/// Fetch one page of records matching the filters
///
/// The response carries the total count and opaque `page` cursors; pass one
/// back with `--page` to move through the result set.
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  datasource_engine find-many customers                        # First page
  datasource_engine find-many customers vip=true -s name.asc   # Filtered and sorted
  datasource_engine find-many orders 'total[gte]=100' -l 50    # Operator filter, 50 per page
  datasource_engine find-many orders --page eyJsaW1pdCI6...    # Continue from a cursor
  datasource_engine find-many orders -r customers -f id,customers.name")]
pub struct FindManyCmd {
    /// Table or collection name
    pub table: String,

    /// Filters as `column=value` or `column[operator]=value`
    #[arg(value_name = "FILTER")]
    pub filters: Vec<String>,

    #[command(flatten)]
    pub read: ReadArgs,

    /// Page size (clamped to the configured maximum)
    #[arg(short, long)]
    pub limit: Option<u64>,

    /// Number of records to skip
    #[arg(long)]
    pub offset: Option<u64>,

    /// Cursor from a previous response; overrides --limit and --offset
    #[arg(short, long)]
    pub page: Option<String>,
}

impl CommandRunner for FindManyCmd {
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
