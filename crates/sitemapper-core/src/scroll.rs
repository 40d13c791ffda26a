//! Cursor-based pagination over the search backend.
//!
//! A scroll is opened once with the query parameters and then continued with the
//! cursor each page hands back. Page N+1 can only be requested with the cursor of
//! page N, so pages are always fetched one after another. An empty page is the
//! normal end of a scroll.
//!
//! The wire protocol lives behind [`ScrollTransport`]; [`Scroller`] adds the
//! page/cursor contract on top and keeps the cursor opaque to callers.

use crate::{Document, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Parameters of the first page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollQuery {
    /// Index or alias to scroll.
    pub index: String,
    /// Documents per page.
    pub page_size: usize,
    /// Cursor lifetime, renewed on every page.
    pub keep_alive: Duration,
    /// Sort key for a deterministic order.
    pub sort: String,
}

impl ScrollQuery {
    /// Build the query from search configuration.
    #[must_use]
    pub fn from_config(search: &crate::config::SearchConfig) -> Self {
        Self {
            index: search.index.clone(),
            page_size: search.page_size,
            keep_alive: search.scroll_keep_alive(),
            sort: search.sort.clone(),
        }
    }
}

/// One raw response from the backend: a continuation token and a batch of documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScrollBatch {
    /// Token for the next request; may be absent on an empty final batch.
    pub token: Option<String>,
    /// Documents in backend order.
    pub documents: Vec<Document>,
}

/// Wire-level access to a paginated search backend.
///
/// Implementations do not retry; retry policy belongs to whoever drives the scroll.
#[async_trait]
pub trait ScrollTransport: Send + Sync {
    /// Open a scroll and return its first batch.
    ///
    /// Fails with [`crate::Error::Query`] when the backend rejects the query.
    async fn open(&self, query: &ScrollQuery) -> Result<ScrollBatch>;

    /// Fetch the batch following `token`.
    ///
    /// Fails with [`crate::Error::Cursor`] when the token is invalid or expired.
    async fn next(&self, token: &str, keep_alive: Duration) -> Result<ScrollBatch>;

    /// Release server-side scroll state. Best effort.
    async fn clear(&self, _token: &str) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: ScrollTransport + ?Sized> ScrollTransport for Arc<T> {
    async fn open(&self, query: &ScrollQuery) -> Result<ScrollBatch> {
        (**self).open(query).await
    }

    async fn next(&self, token: &str, keep_alive: Duration) -> Result<ScrollBatch> {
        (**self).next(token, keep_alive).await
    }

    async fn clear(&self, token: &str) -> Result<()> {
        (**self).clear(token).await
    }
}

/// Opaque continuation token of an open scroll.
///
/// Only a [`Scroller`] can create or read one, so callers cannot inspect or
/// fabricate cursors.
#[derive(Clone, PartialEq, Eq)]
pub struct Cursor(String);

impl fmt::Debug for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tokens are long and meaningless in logs
        f.write_str("Cursor(..)")
    }
}

/// An ordered batch of documents plus the cursor for the next page.
#[derive(Debug, Clone)]
pub struct Page {
    documents: Vec<Document>,
    cursor: Option<Cursor>,
}

impl Page {
    /// Documents of this page.
    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Take ownership of the documents, keeping the cursor.
    pub fn take_documents(&mut self) -> Vec<Document> {
        std::mem::take(&mut self.documents)
    }

    /// Cursor for the following page.
    #[must_use]
    pub const fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Whether this page ends the scroll.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Number of documents in this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    fn from_batch(batch: ScrollBatch) -> Self {
        Self {
            documents: batch.documents,
            cursor: batch.token.map(Cursor),
        }
    }
}

/// Page-at-a-time reader over a [`ScrollTransport`].
pub struct Scroller<T> {
    transport: T,
    query: ScrollQuery,
}

impl<T: ScrollTransport> Scroller<T> {
    /// Create a scroller for a query.
    pub const fn new(transport: T, query: ScrollQuery) -> Self {
        Self { transport, query }
    }

    /// The query this scroller opens.
    pub const fn query(&self) -> &ScrollQuery {
        &self.query
    }

    /// Open the scroll and return the first page.
    pub async fn start(&self) -> Result<Page> {
        let batch = self.transport.open(&self.query).await?;
        Ok(Page::from_batch(batch))
    }

    /// Fetch the page after the one `cursor` came from.
    pub async fn resume(&self, cursor: &Cursor) -> Result<Page> {
        let batch = self.transport.next(&cursor.0, self.query.keep_alive).await?;
        Ok(Page::from_batch(batch))
    }

    /// Release the server-side state behind `cursor`, logging failures.
    pub async fn release(&self, cursor: &Cursor) {
        if let Err(e) = self.transport.clear(&cursor.0).await {
            tracing::warn!(error = %e, "Failed to clear scroll context");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory transport shared by the builder and generator tests.

    use super::{ScrollBatch, ScrollQuery, ScrollTransport};
    use crate::{Document, Error, Result};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves fixed pages; token `page-N` resumes at page N.
    pub struct PagedTransport {
        pages: Vec<Vec<Document>>,
        pub opens: AtomicUsize,
        pub continues: AtomicUsize,
        pub clears: AtomicUsize,
        pub max_page_len: AtomicUsize,
        fail_open: bool,
        fail_continue_at: Option<usize>,
        seen_queries: Mutex<Vec<ScrollQuery>>,
    }

    impl PagedTransport {
        pub fn new(pages: Vec<Vec<Document>>) -> Self {
            Self {
                pages,
                opens: AtomicUsize::new(0),
                continues: AtomicUsize::new(0),
                clears: AtomicUsize::new(0),
                max_page_len: AtomicUsize::new(0),
                fail_open: false,
                fail_continue_at: None,
                seen_queries: Mutex::new(Vec::new()),
            }
        }

        /// `total` documents split into pages of `page_size`.
        pub fn with_documents(total: usize, page_size: usize) -> Self {
            let docs: Vec<Document> = (0..total)
                .map(|i| Document::new(format!("/doc/{i}"), Some("2024-01-01")))
                .collect();
            Self::new(docs.chunks(page_size).map(<[Document]>::to_vec).collect())
        }

        pub fn failing_open() -> Self {
            Self {
                fail_open: true,
                ..Self::new(Vec::new())
            }
        }

        pub fn failing_continue_at(mut self, page: usize) -> Self {
            self.fail_continue_at = Some(page);
            self
        }

        pub fn last_query(&self) -> Option<ScrollQuery> {
            self.seen_queries.lock().ok()?.last().cloned()
        }

        fn batch(&self, index: usize) -> ScrollBatch {
            let documents = self.pages.get(index).cloned().unwrap_or_default();
            self.max_page_len
                .fetch_max(documents.len(), Ordering::SeqCst);
            ScrollBatch {
                token: Some(format!("page-{}", index + 1)),
                documents,
            }
        }
    }

    #[async_trait]
    impl ScrollTransport for PagedTransport {
        async fn open(&self, query: &ScrollQuery) -> Result<ScrollBatch> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if let Ok(mut seen) = self.seen_queries.lock() {
                seen.push(query.clone());
            }
            if self.fail_open {
                return Err(Error::Query("index_not_found_exception".into()));
            }
            Ok(self.batch(0))
        }

        async fn next(&self, token: &str, _keep_alive: Duration) -> Result<ScrollBatch> {
            self.continues.fetch_add(1, Ordering::SeqCst);
            let index: usize = token
                .strip_prefix("page-")
                .and_then(|n| n.parse().ok())
                .ok_or_else(|| Error::Cursor {
                    expired: false,
                    message: format!("unknown token {token}"),
                })?;
            if self.fail_continue_at == Some(index) {
                return Err(Error::Cursor {
                    expired: true,
                    message: "search_context_missing_exception".into(),
                });
            }
            Ok(self.batch(index))
        }

        async fn clear(&self, _token: &str) -> Result<()> {
            self.clears.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
