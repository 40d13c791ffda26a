//! sitemapper CLI - bilingual XML sitemaps from a search index
//!
//! This is the main entry point for the sitemapper command-line interface.
//! Command implementations live in [`commands`]; the `serve` HTTP listener
//! lives in [`server`].

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod server;
mod utils;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    utils::initialize_logging(&cli)?;

    execute_command(cli).await
}

async fn execute_command(cli: Cli) -> Result<()> {
    let config = utils::load_config(&cli)?;

    match cli.command {
        Commands::Generate { format } => commands::generate(&config, format).await,
        Commands::Update {
            uri,
            release_date,
            format,
        } => commands::update(&config, &uri, release_date.as_deref(), format).await,
        Commands::Robots { publish } => commands::robots(&config, publish),
        Commands::Serve { bind } => commands::serve(config, bind).await,
    }
}
