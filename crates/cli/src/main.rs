mod args;
mod output;
mod runner;

use anyhow::Result;
use clap::Parser;

use args::{Cli, Commands};
use runner::{run_lookup, run_sites};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    namehunt_telemetry::init_logging(cli.verbose, cli.json_logs);

    match cli.command {
        Commands::Lookup(args) => run_lookup(args).await?,
        Commands::Sites { catalog, category } => {
            run_sites(&catalog, category.as_deref()).await?;
        }
    }

    Ok(())
}
