use clap::Parser;

use datasource_engine::cli::Args;
use datasource_engine::commands::CommandRunner;
use datasource_engine::db::DatabaseConfig;
use datasource_engine::logging::init_logging;
use datasource_engine::query::Query;
use datasource_engine::types::RequestContext;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.log_level.as_deref())?;
    let (database, engine) = DatabaseConfig::resolve(args.database_url.as_deref())?;
    let query = Query::connect(&database, engine)?;
    let ctx = RequestContext::new(args.request_id.as_deref());
    let output = args.command.run(&query, &ctx, args.format)?;
    println!("{}", output);
    Ok(())
}
