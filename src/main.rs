//! metaswarm CLI entry point.

use anyhow::{Context, Result};
use clap::Parser;

use metaswarm::cli::{commands, handle_error, Cli, Commands};
use metaswarm::infrastructure::config::ConfigLoader;
use metaswarm::infrastructure::logging::LoggerImpl;

async fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConfigLoader::load().context("Failed to load config")?,
    };
    let _logger = LoggerImpl::init(&config.logging)?;

    match cli.command {
        Commands::Algorithms(args) => commands::algorithms::execute(args, cli.json),
        Commands::Problems => commands::problems::execute(cli.json),
        Commands::Run(args) => commands::run::execute(args, cli.json).await,
        Commands::Dispatch(args) => commands::dispatch::execute(args, &config).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.json;
    if let Err(err) = run(cli).await {
        handle_error(err, json_mode);
    }
}
