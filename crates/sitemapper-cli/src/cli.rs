//! # CLI Structure and Argument Parsing
//!
//! Command-line interface for `sitemapper`, built with `clap` derive macros.
//!
//! ```bash
//! # One full rebuild, then exit
//! sitemapper generate
//!
//! # Merge a single published page into the current sitemaps
//! sitemapper update --uri /economy/inflation --release-date 2024-06-01
//!
//! # Print robots.txt, or publish it to the store
//! sitemapper robots
//! sitemapper robots --publish
//!
//! # Long-running service: scheduled rebuilds, /health and /events
//! sitemapper serve --bind 127.0.0.1:8080
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Main CLI structure for the `sitemapper` command
#[derive(Parser, Clone, Debug)]
#[command(name = "sitemapper")]
#[command(version)]
#[command(about = "sitemapper - bilingual XML sitemaps from a search index", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (defaults to `SITEMAPPER_CONFIG`, then the platform config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages (only show errors)
    #[arg(short = 'q', long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Emit logs as JSON lines
    #[arg(long = "json-logs", global = true)]
    pub json_logs: bool,
}

/// Available subcommands
#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Rebuild both sitemaps from the index and publish them with robots.txt
    Generate {
        /// Output format for the summary
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Merge one published document into the current sitemaps
    Update {
        /// Content path, e.g. `/economy/inflation`
        #[arg(long)]
        uri: String,

        /// Release date of the content (date or RFC 3339 timestamp)
        #[arg(long = "release-date", value_name = "DATE")]
        release_date: Option<String>,

        /// Output format for the summary
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Render robots.txt from the configured rules
    Robots {
        /// Save to the file store instead of printing
        #[arg(long)]
        publish: bool,
    },

    /// Run scheduled rebuilds with health and event endpoints until signalled
    Serve {
        /// Listen address (overrides `server.bind`)
        #[arg(long, value_name = "ADDR")]
        bind: Option<SocketAddr>,
    },
}

/// Summary output format
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}
