mod execute;

use std::error::Error;

use clap::Args;

use crate::commands::{CommandRunner, Execute};
use crate::output::{OutputFormat, Outputable};
use crate::query::Query;
use crate::types::RequestContext;

/// Check that the backend is reachable
#[derive(Args, Debug, Default)]
#[command(after_help = "\
Examples:
  datasource_engine check
  datasource_engine --database-url postgres://app@localhost/shop check")]
pub struct CheckCmd {}

impl CommandRunner for CheckCmd {
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
