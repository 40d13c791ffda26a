//! robots.txt rendering and publishing.

use anyhow::{Context, Result};
use sitemapper_core::Config;
use sitemapper_core::store::file_store;
use tracing::info;

/// Print robots.txt, or save it to the configured store.
pub fn execute(config: &Config, publish: bool) -> Result<()> {
    let rendered = config.robots.render();

    if !publish {
        print!("{rendered}");
        return Ok(());
    }

    let store = file_store(&config.store).context("failed to open file store")?;
    store
        .save(&config.store.robots, &mut rendered.as_bytes())
        .context("failed to publish robots.txt")?;
    info!(name = %config.store.robots, "Published robots.txt");
    Ok(())
}
