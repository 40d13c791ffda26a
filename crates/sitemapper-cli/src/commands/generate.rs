//! One-shot full rebuild.

use anyhow::{Context, Result};
use serde_json::json;
use sitemapper_core::{Config, Generator};

use crate::cli::OutputFormat;

/// Rebuild both sitemaps, publish them and regenerate robots.txt.
pub async fn execute(config: &Config, format: OutputFormat) -> Result<()> {
    let generator = Generator::from_config(config).context("failed to set up generator")?;
    let stats = generator
        .generate_full()
        .await
        .context("sitemap generation failed")?;

    match format {
        OutputFormat::Text => {
            println!(
                "Published {} ({} URLs) and {} ({} URLs) from {} pages",
                config.store.primary_sitemap,
                stats.primary,
                config.store.alternate_sitemap,
                stats.alternate,
                stats.pages
            );
        },
        OutputFormat::Json => {
            let mut files = serde_json::Map::new();
            files.insert(config.store.primary_sitemap.clone(), json!(stats.primary));
            files.insert(config.store.alternate_sitemap.clone(), json!(stats.alternate));
            let summary = json!({
                "pages": stats.pages,
                "files": files,
                "robots": config.store.robots,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        },
    }
    Ok(())
}
