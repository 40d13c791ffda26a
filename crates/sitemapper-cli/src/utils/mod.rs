//! Shared helpers for the CLI.

pub mod logging;

use anyhow::{Context, Result};
use sitemapper_core::Config;

use crate::cli::Cli;

pub use logging::initialize_logging;

/// Load configuration from `--config` or the default lookup chain.
pub fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Config::load().context("failed to load config"),
    }
}
