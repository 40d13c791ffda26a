//! Full sitemap rebuild.
//!
//! Scrolls the whole index page by page and streams one `<url>` entry per
//! document into two temp files, one per language. Memory use is bounded by a
//! single page regardless of index size.
//!
//! Both files are [`NamedTempFile`]s: if the build fails, or its future is
//! dropped mid-scroll, they are deleted and nothing partial is ever published.

use crate::resolver::{AlternateResolver, TranslationCheck};
use crate::scroll::{Cursor, ScrollTransport, Scroller};
use crate::xml::{SitemapWriter, sitemap_temp_file};
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

/// Counters from one rebuild.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Non-empty pages consumed.
    pub pages: usize,
    /// Records written to the primary sitemap.
    pub primary: usize,
    /// Records written to the alternate sitemap.
    pub alternate: usize,
}

/// The two finished sitemaps, still in temp storage.
#[derive(Debug)]
pub struct BuiltSitemaps {
    /// Primary-language sitemap.
    pub primary: NamedTempFile,
    /// Alternate-language sitemap; a valid empty urlset when nothing is translated.
    pub alternate: NamedTempFile,
    /// What went into them.
    pub stats: BuildStats,
}

/// Streams the whole index into a pair of sitemap files.
pub struct SitemapBuilder<T, C> {
    scroller: Scroller<T>,
    resolver: AlternateResolver<C>,
    temp_dir: Option<PathBuf>,
}

impl<T: ScrollTransport, C: TranslationCheck> SitemapBuilder<T, C> {
    /// Create a builder.
    pub const fn new(scroller: Scroller<T>, resolver: AlternateResolver<C>) -> Self {
        Self {
            scroller,
            resolver,
            temp_dir: None,
        }
    }

    /// Put temp files in `dir` instead of the system temp dir.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    /// Run one full rebuild.
    ///
    /// Documents are written in page order and, within a page, in backend order.
    /// Any scroll or write failure aborts the build and removes both files.
    #[instrument(skip(self), fields(index = %self.scroller.query().index))]
    pub async fn build(&self) -> Result<BuiltSitemaps> {
        let primary_file = sitemap_temp_file(self.temp_dir.as_deref())?;
        let alternate_file = sitemap_temp_file(self.temp_dir.as_deref())?;

        let mut primary =
            SitemapWriter::start(BufWriter::new(primary_file.as_file().try_clone()?))?;
        let mut alternate =
            SitemapWriter::start(BufWriter::new(alternate_file.as_file().try_clone()?))?;
        let mut stats = BuildStats::default();

        let mut page = self.scroller.start().await?;
        let mut last_cursor: Option<Cursor> = None;

        while !page.is_empty() {
            stats.pages += 1;
            debug!(page = stats.pages, documents = page.len(), "Writing page");

            for doc in page.take_documents() {
                let resolution = self.resolver.resolve(&doc.uri, doc.lastmod()).await;
                primary.write_record(&resolution.primary)?;
                if let Some(record) = &resolution.alternate {
                    alternate.write_record(record)?;
                }
            }

            let Some(cursor) = page.cursor().cloned() else {
                warn!("Backend returned a page without a cursor, ending scroll early");
                break;
            };
            page = self.scroller.resume(&cursor).await?;
            last_cursor = Some(cursor);
        }

        if let Some(cursor) = page.cursor().or(last_cursor.as_ref()) {
            self.scroller.release(cursor).await;
        }

        stats.primary = primary.records();
        stats.alternate = alternate.records();
        tokio::task::spawn_blocking(move || {
            close(primary)?;
            close(alternate)
        })
        .await
        .map_err(|e| Error::Other(format!("blocking file task failed: {e}")))??;

        info!(
            pages = stats.pages,
            primary = stats.primary,
            alternate = stats.alternate,
            "Sitemaps built"
        );

        Ok(BuiltSitemaps {
            primary: primary_file,
            alternate: alternate_file,
            stats,
        })
    }
}

/// Finish the document and flush it to disk.
fn close(writer: SitemapWriter<BufWriter<File>>) -> Result<()> {
    let mut inner = writer.finish()?;
    inner.flush()?;
    inner
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?
        .sync_all()?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::LanguagesConfig;
    use crate::resolver::NoTranslations;
    use crate::resolver::testing::{BrokenCms, KnownTranslations};
    use crate::scroll::ScrollQuery;
    use crate::scroll::testing::PagedTransport;
    use crate::xml::read_sitemap;
    use crate::Document;
    use std::io::BufReader;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;
    use tempfile::TempDir;

    fn query(page_size: usize) -> ScrollQuery {
        ScrollQuery {
            index: "ons".into(),
            page_size,
            keep_alive: Duration::from_secs(60),
            sort: "_doc".into(),
        }
    }

    fn builder<T: ScrollTransport, C: TranslationCheck>(
        transport: T,
        check: C,
        page_size: usize,
    ) -> SitemapBuilder<T, C> {
        SitemapBuilder::new(
            Scroller::new(transport, query(page_size)),
            AlternateResolver::new(check, &LanguagesConfig::default()),
        )
    }

    fn read(file: &NamedTempFile) -> String {
        std::fs::read_to_string(file.path()).unwrap()
    }

    fn dir_is_empty(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path()).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_two_documents_in_order() {
        // Given: two documents, no translations
        let transport = PagedTransport::new(vec![vec![
            Document::new("/a", Some("2014-12-10")),
            Document::new("/b", Some("2023-03-31T00:00:00.000Z")),
        ]]);

        // When: building
        let built = builder(transport, NoTranslations, 10)
            .build()
            .await
            .unwrap();

        // Then: primary lists both in order, alternate is a valid empty urlset
        let primary = read(&built.primary);
        let a = primary.find("<loc>https://www.example.com/a</loc>").unwrap();
        let b = primary.find("<loc>https://www.example.com/b</loc>").unwrap();
        assert!(a < b);
        assert!(primary.contains("<lastmod>2014-12-10</lastmod>"));
        assert!(primary.contains("<lastmod>2023-03-31</lastmod>"));

        let alternate = read(&built.alternate);
        assert!(alternate.contains("<urlset"));
        assert!(!alternate.contains("<url>"));
        assert_eq!(built.stats.primary, 2);
        assert_eq!(built.stats.alternate, 0);
    }

    #[tokio::test]
    async fn test_empty_index_yields_two_empty_urlsets() {
        let transport = Arc::new(PagedTransport::new(Vec::new()));

        let built = builder(Arc::clone(&transport), NoTranslations, 10)
            .build()
            .await
            .unwrap();

        for file in [&built.primary, &built.alternate] {
            let doc = read_sitemap(BufReader::new(File::open(file.path()).unwrap())).unwrap();
            assert!(doc.is_empty());
        }
        assert_eq!(transport.continues.load(Ordering::SeqCst), 0);
        assert_eq!(built.stats.pages, 0);
    }

    #[tokio::test]
    async fn test_full_pages_continue_once_per_page() {
        // Given: exactly 3 full pages of 4
        let transport = Arc::new(PagedTransport::with_documents(12, 4));

        // When: building
        let built = builder(Arc::clone(&transport), NoTranslations, 4)
            .build()
            .await
            .unwrap();

        // Then: one open, one continue per page, the last returning empty
        assert_eq!(transport.opens.load(Ordering::SeqCst), 1);
        assert_eq!(transport.continues.load(Ordering::SeqCst), 3);
        assert!(transport.max_page_len.load(Ordering::SeqCst) <= 4);
        assert_eq!(transport.clears.load(Ordering::SeqCst), 1);
        assert_eq!(built.stats.pages, 3);
        assert_eq!(built.stats.primary, 12);
    }

    #[tokio::test]
    async fn test_translated_document_links_both_sitemaps() {
        let transport = PagedTransport::new(vec![vec![
            Document::new("/a", Some("2014-12-10")),
            Document::new("/b", None),
        ]]);

        let built = builder(transport, KnownTranslations::of(&["/a"]), 10)
            .build()
            .await
            .unwrap();

        let primary = read_sitemap(read(&built.primary).as_bytes()).unwrap();
        let alternate = read_sitemap(read(&built.alternate).as_bytes()).unwrap();

        assert_eq!(primary.len(), 2);
        assert_eq!(alternate.len(), 1);
        let en = &primary.records[0];
        let cy = &alternate.records[0];
        assert_eq!(en.alternate.as_ref().unwrap().href, cy.loc);
        assert_eq!(cy.alternate.as_ref().unwrap().href, en.loc);
        assert!(primary.records[1].alternate.is_none());
    }

    #[tokio::test]
    async fn test_broken_cms_still_builds() {
        let transport = PagedTransport::with_documents(3, 2);

        let built = builder(transport, BrokenCms, 2).build().await.unwrap();

        assert_eq!(built.stats.primary, 3);
        assert_eq!(built.stats.alternate, 0);
    }

    #[tokio::test]
    async fn test_open_failure_aborts_without_leftovers() {
        let temp = TempDir::new().unwrap();

        let err = builder(PagedTransport::failing_open(), NoTranslations, 2)
            .with_temp_dir(Some(temp.path().to_path_buf()))
            .build()
            .await
            .unwrap_err();

        assert_eq!(err.category(), "query");
        assert!(dir_is_empty(&temp));
    }

    #[tokio::test]
    async fn test_expired_cursor_mid_scroll_aborts_without_leftovers() {
        let temp = TempDir::new().unwrap();
        let transport = PagedTransport::with_documents(6, 2).failing_continue_at(2);

        let err = builder(transport, NoTranslations, 2)
            .with_temp_dir(Some(temp.path().to_path_buf()))
            .build()
            .await
            .unwrap_err();

        assert!(err.is_cursor_expired());
        assert!(dir_is_empty(&temp));
    }

    /// First page succeeds, every continuation hangs.
    struct StallingTransport(PagedTransport);

    #[async_trait::async_trait]
    impl ScrollTransport for StallingTransport {
        async fn open(&self, query: &ScrollQuery) -> Result<crate::scroll::ScrollBatch> {
            self.0.open(query).await
        }

        async fn next(
            &self,
            _token: &str,
            _keep_alive: Duration,
        ) -> Result<crate::scroll::ScrollBatch> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_cancelled_build_leaves_no_files() {
        let temp = TempDir::new().unwrap();
        let builder = builder(
            StallingTransport(PagedTransport::with_documents(4, 2)),
            NoTranslations,
            2,
        )
        .with_temp_dir(Some(temp.path().to_path_buf()));

        let outcome = tokio::time::timeout(Duration::from_millis(50), builder.build()).await;

        assert!(outcome.is_err());
        assert!(dir_is_empty(&temp));
    }

    #[tokio::test]
    async fn test_files_live_in_configured_temp_dir() {
        let temp = TempDir::new().unwrap();

        let built = builder(PagedTransport::with_documents(1, 2), NoTranslations, 2)
            .with_temp_dir(Some(temp.path().to_path_buf()))
            .build()
            .await
            .unwrap();

        assert!(built.primary.path().starts_with(temp.path()));
        drop(built);
        assert!(dir_is_empty(&temp));
    }
}
