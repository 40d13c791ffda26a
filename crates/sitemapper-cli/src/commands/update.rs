//! Incremental update of a single document.

use anyhow::{Context, Result};
use serde_json::json;
use sitemapper_core::{Config, Document, Generator};

use crate::cli::OutputFormat;

/// Merge one document into the published sitemaps.
pub async fn execute(
    config: &Config,
    uri: &str,
    release_date: Option<&str>,
    format: OutputFormat,
) -> Result<()> {
    let generator = Generator::from_config(config).context("failed to set up generator")?;
    let doc = Document::new(uri, release_date);
    let resolution = generator
        .update_content(&doc)
        .await
        .with_context(|| format!("failed to update sitemap entry for {uri}"))?;

    let alternate = resolution.alternate.as_ref().map(|r| r.loc.as_str());
    match format {
        OutputFormat::Text => {
            println!("Updated {}", resolution.primary.loc);
            if let Some(loc) = alternate {
                println!("Updated {loc}");
            }
        },
        OutputFormat::Json => {
            let summary = json!({
                "primary": resolution.primary,
                "alternate": resolution.alternate,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        },
    }
    Ok(())
}
