//! Error types and handling for sitemapper-core operations.
//!
//! Every failure in the sitemap pipeline maps to one variant of [`Error`]. Messages
//! carry a short static prefix naming the phase that failed so a single log line is
//! enough to tell a broken scroll from a broken upload.
//!
//! ## Error Categories
//!
//! - **Query / Cursor**: the search backend rejected the scroll start or continuation
//! - **Decode / Encode**: sitemap XML could not be read or written
//! - **Io / Store**: temp files and the destination file store
//! - **Network**: HTTP transport failures from the search backend or CMS
//! - **Config**: invalid or unreadable configuration
//! - **Timeout / Shutdown**: lifecycle failures
//!
//! ## Recovery Hints
//!
//! ```rust
//! use sitemapper_core::Error;
//!
//! let err = Error::Cursor { expired: true, message: "no search context".into() };
//! assert!(err.is_cursor_expired());
//! assert!(err.is_recoverable());
//! assert_eq!(err.category(), "cursor");
//! ```

use thiserror::Error;

/// The main error type for sitemapper-core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The search backend rejected the initial scroll query.
    ///
    /// Bad index name, malformed filter or a backend-side timeout. Fatal to the
    /// current rebuild attempt; the next scheduled tick starts again from scratch.
    #[error("failed to start scroll: {0}")]
    Query(String),

    /// Continuing a scroll with its cursor failed.
    ///
    /// `expired` is set when the backend no longer knows the cursor, which means
    /// the caller has to restart the whole scroll rather than retry the page.
    #[error("failed to get scroll: {message}")]
    Cursor {
        /// Whether the cursor was rejected as unknown or expired.
        expired: bool,
        /// Backend-provided detail.
        message: String,
    },

    /// An existing sitemap could not be decoded during an incremental merge.
    #[error("failed to decode old sitemap: {0}")]
    Decode(String),

    /// Writing sitemap XML failed.
    #[error("xml encode error: {0}")]
    Encode(String),

    /// I/O operation on a temp file or local path failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The destination file store failed to read or write.
    #[error("failed to upload file: {0}")]
    Store(String),

    /// The translation check found no translated counterpart.
    ///
    /// Never escapes the resolver; it only distinguishes "missing" from "check failed".
    #[error("no translation for {0}")]
    NotTranslated(String),

    /// HTTP transport failure.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Configuration is invalid or inaccessible.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation exceeded its deadline.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// One or more shutdown steps failed.
    #[error("failed to shut down gracefully: {0}")]
    Shutdown(String),

    /// Generic error for uncategorized failures.
    #[error("{0}")]
    Other(String),
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Self::Timeout(err.to_string())
    }
}

impl Error {
    /// Check whether a later attempt might succeed without operator action.
    ///
    /// Scheduled rebuilds are never retried internally; this only informs logs
    /// and outer supervisors.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Cursor { expired, .. } => *expired,
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Whether this error means the scroll cursor is gone and the scroll must restart.
    #[must_use]
    pub const fn is_cursor_expired(&self) -> bool {
        matches!(self, Self::Cursor { expired: true, .. })
    }

    /// Get the error category as a static identifier for structured logging.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Query(_) => "query",
            Self::Cursor { .. } => "cursor",
            Self::Decode(_) => "decode",
            Self::Encode(_) => "encode",
            Self::Io(_) => "io",
            Self::Store(_) => "store",
            Self::NotTranslated(_) => "not_translated",
            Self::Network(_) => "network",
            Self::Config(_) => "config",
            Self::Timeout(_) => "timeout",
            Self::Shutdown(_) => "shutdown",
            Self::Other(_) => "other",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
