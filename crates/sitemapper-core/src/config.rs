//! Configuration for the sitemap pipeline.
//!
//! A single [`Config`] value is loaded once at startup and handed to each
//! component constructor; nothing reads configuration from ambient state.
//!
//! ## Lookup order
//!
//! 1. An explicit path passed to [`Config::load_from`]
//! 2. The `SITEMAPPER_CONFIG` environment variable
//! 3. `config.toml` in the platform config directory
//! 4. Built-in defaults
//!
//! `SITEMAPPER_SEARCH_URL` and `SITEMAPPER_STORE_ROOT` override the matching keys
//! after the file is read.
//!
//! ## Example Configuration File
//!
//! ```toml
//! [search]
//! url = "http://localhost:9200"
//! index = "ons"
//! page_size = 10000
//! scroll_timeout = 60
//!
//! [languages]
//! primary = { lang = "en", host = "https://www.example.com" }
//! alternate = { lang = "cy", host = "https://cy.example.com" }
//!
//! [schedule]
//! interval = 3600
//! timeout = 600
//! max_concurrent = 1
//!
//! [[robots.rules]]
//! user_agent = "*"
//! allow = ["/"]
//! disallow = ["/search"]
//! ```

use crate::robots::RobotsConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "SITEMAPPER_CONFIG";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Search backend connection and scroll parameters.
    pub search: SearchConfig,
    /// Primary and alternate site languages.
    pub languages: LanguagesConfig,
    /// Translation existence check.
    pub translation: TranslationConfig,
    /// Destination file store.
    pub store: StoreConfig,
    /// Periodic rebuild schedule.
    pub schedule: ScheduleConfig,
    /// robots.txt rule table.
    pub robots: RobotsConfig,
    /// HTTP listener and shutdown settings.
    pub server: ServerConfig,
}

/// Search backend connection and scroll parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base URL of the search backend.
    pub url: String,
    /// Index (or alias) to scroll.
    pub index: String,
    /// Documents per page.
    pub page_size: usize,
    /// Cursor lifetime in seconds, renewed with every page.
    pub scroll_timeout: u64,
    /// Sort key; `_doc` gives the cheapest deterministic order.
    pub sort: String,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            index: "ons".to_string(),
            page_size: 10_000,
            scroll_timeout: 60,
            sort: "_doc".to_string(),
            request_timeout: 30,
        }
    }
}

impl SearchConfig {
    /// Cursor lifetime as a [`Duration`].
    #[must_use]
    pub const fn scroll_keep_alive(&self) -> Duration {
        Duration::from_secs(self.scroll_timeout)
    }
}

/// A language and the host its pages are served from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    /// Language tag, e.g. `en`.
    pub lang: String,
    /// Scheme and host, without trailing slash.
    pub host: String,
}

/// Primary and alternate site languages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguagesConfig {
    /// Language every document is published in.
    pub primary: Site,
    /// Language translations are published in.
    pub alternate: Site,
}

impl Default for LanguagesConfig {
    fn default() -> Self {
        Self {
            primary: Site {
                lang: "en".to_string(),
                host: "https://www.example.com".to_string(),
            },
            alternate: Site {
                lang: "cy".to_string(),
                host: "https://cy.example.com".to_string(),
            },
        }
    }
}

/// Translation existence check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    /// Metadata endpoint; `None` disables translation lookups entirely.
    pub url: Option<String>,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout: u64,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            url: None,
            request_timeout: 10,
        }
    }
}

/// Which [`crate::store::FileStore`] backs publishing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Files in `root` on the local filesystem.
    #[default]
    Local,
    /// Process memory; nothing survives exit.
    Memory,
}

/// Destination file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store backend.
    pub kind: StoreKind,
    /// Directory published files are written to.
    pub root: PathBuf,
    /// Directory for temp files; the system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    /// Name of the primary-language sitemap.
    pub primary_sitemap: String,
    /// Name of the alternate-language sitemap.
    pub alternate_sitemap: String,
    /// Name of the robots file.
    pub robots: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let root = directories::ProjectDirs::from("dev", "sitemapper", "sitemapper").map_or_else(
            || PathBuf::from(".sitemapper"),
            |dirs| dirs.data_dir().to_path_buf(),
        );
        Self {
            kind: StoreKind::Local,
            root,
            temp_dir: None,
            primary_sitemap: "sitemap_en.xml".to_string(),
            alternate_sitemap: "sitemap_cy.xml".to_string(),
            robots: "robots.txt".to_string(),
        }
    }
}

/// Periodic rebuild schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds between rebuild ticks.
    pub interval: u64,
    /// Upper bound on one rebuild, in seconds.
    pub timeout: u64,
    /// Concurrent rebuilds allowed; extra ticks are dropped.
    pub max_concurrent: usize,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: 3600,
            timeout: 1800,
            max_concurrent: 1,
        }
    }
}

/// HTTP listener and shutdown settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address for `/health` and `/events`.
    pub bind: SocketAddr,
    /// Seconds the whole shutdown sequence may take.
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            shutdown_timeout: 10,
        }
    }
}

impl Config {
    /// Load configuration from the environment-selected or default location.
    ///
    /// A missing file yields the defaults; a present but malformed file is an error.
    pub fn load() -> Result<Self> {
        let path = match std::env::var(CONFIG_ENV) {
            Ok(value) if !value.trim().is_empty() => Some(PathBuf::from(value.trim())),
            _ => Self::config_path(),
        };
        let mut config = match path {
            Some(path) if path.exists() => Self::read(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::read(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string without env overrides.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config: {e}")))?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("Failed to parse config: {e}")))
    }

    fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("dev", "sitemapper", "sitemapper")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SITEMAPPER_SEARCH_URL") {
            let trimmed = url.trim();
            if !trimmed.is_empty() {
                self.search.url = trimmed.to_string();
            }
        }
        if let Ok(root) = std::env::var("SITEMAPPER_STORE_ROOT") {
            let trimmed = root.trim();
            if !trimmed.is_empty() {
                self.store.root = PathBuf::from(trimmed);
            }
        }
    }

    /// Check values that would otherwise fail deep inside a rebuild.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.search.url)
            .map_err(|e| Error::Config(format!("Invalid search.url '{}': {e}", self.search.url)))?;

        if self.search.index.trim().is_empty() {
            return Err(Error::Config("search.index cannot be empty".into()));
        }
        if self.search.page_size == 0 {
            return Err(Error::Config("search.page_size must be at least 1".into()));
        }
        if self.search.scroll_timeout == 0 {
            return Err(Error::Config(
                "search.scroll_timeout must be at least 1 second".into(),
            ));
        }

        for (key, site) in [
            ("languages.primary", &self.languages.primary),
            ("languages.alternate", &self.languages.alternate),
        ] {
            if site.lang.trim().is_empty() {
                return Err(Error::Config(format!("{key}.lang cannot be empty")));
            }
            url::Url::parse(&site.host)
                .map_err(|e| Error::Config(format!("Invalid {key}.host '{}': {e}", site.host)))?;
        }
        if self.languages.primary.lang == self.languages.alternate.lang {
            return Err(Error::Config(
                "primary and alternate languages must differ".into(),
            ));
        }

        if let Some(url) = &self.translation.url {
            url::Url::parse(url)
                .map_err(|e| Error::Config(format!("Invalid translation.url '{url}': {e}")))?;
        }

        if self.store.primary_sitemap == self.store.alternate_sitemap {
            return Err(Error::Config(
                "store.primary_sitemap and store.alternate_sitemap must differ".into(),
            ));
        }

        if self.schedule.interval == 0 {
            return Err(Error::Config("schedule.interval must be at least 1".into()));
        }
        if self.schedule.max_concurrent == 0 {
            return Err(Error::Config(
                "schedule.max_concurrent must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
