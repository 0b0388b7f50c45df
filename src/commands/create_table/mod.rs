mod execute;

use std::error::Error;
use std::path::PathBuf;

use clap::Args;

use crate::commands::{CommandRunner, Execute};
use crate::output::{OutputFormat, Outputable};
use crate::query::Query;
use crate::types::RequestContext;

/// Create a table from a JSON schema definition
///
/// The file holds a schema in the same shape `schema -o json` prints:
/// `table`, `columns` (field, type, flags) and optional `relations`.
#[derive(Args, Debug)]
#[command(after_help = "\
Examples:
  datasource_engine create-table schemas/customers.json
  datasource_engine schema customers -o json > customers.json   # Copy a table definition
  datasource_engine --database-url sqlite://copy.db create-table customers.json")]
pub struct CreateTableCmd {
    /// Path to the JSON schema definition
    pub file: PathBuf,
}

impl CommandRunner for CreateTableCmd {
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
