//! # sitemapper-core
//!
//! Core functionality for sitemapper - bilingual XML sitemap generation from a
//! search index.
//!
//! The crate scrolls every indexed document, resolves a primary-language and an
//! optional alternate-language URL for each one, and streams the result into two
//! sitemap files without holding the index in memory. Single documents can be
//! merged into already published sitemaps without a full rebuild.
//!
//! ## Architecture
//!
//! - **Scroll**: cursor-based pagination over the search backend
//! - **Resolver**: primary/alternate URL pairs with mutual `xhtml:link` entries
//! - **Builder**: streaming full rebuild into temp files
//! - **Merge**: decode, upsert and re-encode for incremental updates
//! - **Limiter / Scheduler**: load-shedding periodic rebuilds
//! - **Generator**: publishes results through a [`store::FileStore`]
//! - **Shutdown**: ordered, best-effort shutdown with an aggregated outcome
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use sitemapper_core::{Config, Generator};
//!
//! # async fn run() -> sitemapper_core::Result<()> {
//! let config = Config::load()?;
//! let generator = Generator::from_config(&config)?;
//!
//! let stats = generator.generate_full().await?;
//! println!("Published {} URLs", stats.primary);
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use sitemapper_core::Error;
//!
//! let err = Error::Decode("unexpected end of document".into());
//! match &err {
//!     Error::Decode(msg) => eprintln!("existing sitemap is corrupt: {msg}"),
//!     e if e.is_recoverable() => eprintln!("will retry next tick: {e}"),
//!     e => eprintln!("fatal: {e}"),
//! }
//! ```

/// Full-sitemap builder streaming to temp files
pub mod builder;
/// Configuration loading and validation
pub mod config;
/// Content-published event queue
pub mod consumer;
/// Elasticsearch scroll transport
pub mod elastic;
/// Error types and result aliases
pub mod error;
/// Full rebuild and incremental update pipelines
pub mod generator;
/// Health reporting
pub mod health;
/// Concurrency limit for recurring jobs
pub mod limiter;
/// Incremental sitemap merge
pub mod merge;
/// Alternate-language resolution
pub mod resolver;
/// robots.txt rendering
pub mod robots;
/// Periodic job trigger
pub mod scheduler;
/// Cursor-based pagination
pub mod scroll;
/// Lifecycle and ordered shutdown
pub mod shutdown;
/// Destination file stores
pub mod store;
/// Core data types and structures
pub mod types;
/// Sitemap XML encoding and decoding
pub mod xml;

// Re-export commonly used types
pub use builder::{BuildStats, BuiltSitemaps, SitemapBuilder};
pub use config::{Config, LanguagesConfig, ScheduleConfig, SearchConfig, Site, StoreConfig, StoreKind};
pub use consumer::{ContentConsumer, ContentHandler};
pub use elastic::ElasticScroll;
pub use error::{Error, Result};
pub use generator::Generator;
pub use health::{HealthMonitor, HealthReport, HealthStatus};
pub use limiter::JobLimiter;
pub use merge::merge;
pub use resolver::{AlternateResolver, HttpTranslationCheck, NoTranslations, Resolution, TranslationCheck};
pub use robots::{RobotsConfig, RobotsRule};
pub use scheduler::Scheduler;
pub use scroll::{Cursor, Page, ScrollQuery, ScrollTransport, Scroller};
pub use shutdown::{Lifecycle, LifecycleState, ShutdownSequence};
pub use store::{FileStore, LocalStore, MemoryStore};
pub use types::*;
