//! Core data types: indexed documents, URL records and sitemap documents.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Namespace of the sitemap 0.9 schema.
pub const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Namespace used for `xhtml:link` alternate-language entries.
pub const XHTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// One indexed content record as returned by the search backend.
///
/// Only `uri` and `release_date` matter to sitemap assembly; everything else the
/// index stores is kept in `extra` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Content path, e.g. `/economy/inflation`.
    pub uri: String,
    /// Release timestamp as stored in the index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_date: Option<String>,
    /// Remaining indexing metadata.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    /// Create a document with a path and optional release date.
    #[must_use]
    pub fn new(uri: impl Into<String>, release_date: Option<&str>) -> Self {
        Self {
            uri: uri.into(),
            release_date: release_date.map(str::to_string),
            extra: serde_json::Map::new(),
        }
    }

    /// The `<lastmod>` value for this document.
    ///
    /// Timestamps are reduced to their `YYYY-MM-DD` date. Values that do not parse
    /// are passed through unchanged so nothing the index holds is silently dropped.
    #[must_use]
    pub fn lastmod(&self) -> Option<String> {
        self.release_date.as_deref().map(normalize_lastmod)
    }
}

/// Reduce a release timestamp to a sitemap date.
///
/// Supports:
/// - `2024-01-15` (date only)
/// - `2024-01-15T10:30:00Z` / `2024-01-15T10:30:00+01:00` (RFC 3339)
/// - `2024-01-15T10:30:00` and `2024-01-15T10:30:00.000` (naive, assumed UTC)
#[must_use]
pub fn normalize_lastmod(raw: &str) -> String {
    let s = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.date_naive().format("%Y-%m-%d").to_string();
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.format("%Y-%m-%d").to_string();
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return dt.date().format("%Y-%m-%d").to_string();
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.date().format("%Y-%m-%d").to_string();
    }

    tracing::debug!(date_str = %s, "Could not parse release date, using as-is");
    s.to_string()
}

/// Alternate-language link of a URL record (`rel="alternate"` is implied).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlternateLink {
    /// Language tag of the target, e.g. `cy`.
    pub lang: String,
    /// Location of the translated page.
    pub href: String,
}

/// One `<url>` entry of a sitemap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Absolute page location.
    pub loc: String,
    /// Last modification date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
    /// Link to the same page in the other language, if a translation exists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate: Option<AlternateLink>,
}

impl UrlRecord {
    /// Create a record without an alternate link.
    #[must_use]
    pub fn new(loc: impl Into<String>, lastmod: Option<String>) -> Self {
        Self {
            loc: loc.into(),
            lastmod,
            alternate: None,
        }
    }

    /// Attach an alternate-language link using builder pattern.
    #[must_use]
    pub fn with_alternate(mut self, lang: impl Into<String>, href: impl Into<String>) -> Self {
        self.alternate = Some(AlternateLink {
            lang: lang.into(),
            href: href.into(),
        });
        self
    }
}

/// An in-memory sitemap: URL records in discovery order.
///
/// Only the incremental merge path materializes a whole document; full rebuilds
/// stream records straight to disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapDocument {
    /// Records in insertion order.
    pub records: Vec<UrlRecord>,
}

impl SitemapDocument {
    /// Insert a record, replacing any existing record with the same location.
    ///
    /// A replaced record keeps its position; a new location is appended.
    /// Returns `true` when an existing record was replaced.
    pub fn upsert(&mut self, record: UrlRecord) -> bool {
        if let Some(existing) = self.records.iter_mut().find(|r| r.loc == record.loc) {
            *existing = record;
            true
        } else {
            self.records.push(record);
            false
        }
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the document holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
