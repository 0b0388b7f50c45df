mod execute;

use std::error::Error;

use clap::Args;

use crate::commands::{CommandRunner, Execute};
use crate::output::{OutputFormat, Outputable};
use crate::query::Query;
use crate::types::RequestContext;

/// Delete one record by primary key
///
/// When a soft-delete column is configured and the table has it, the record
/// is stamped instead of removed.
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  datasource_engine delete customers 7
  SOFT_DELETE_COLUMN=deletedAt datasource_engine delete customers 7")]
pub struct DeleteCmd {
    /// Table or collection name
    pub table: String,

    /// Primary key of the record
    pub id: String,
}

impl CommandRunner for DeleteCmd {
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
