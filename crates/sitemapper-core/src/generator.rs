//! Sitemap generation pipelines.
//!
//! [`Generator`] ties the builder, the merger and the file store together:
//!
//! - [`Generator::generate_full`] rebuilds both sitemaps from the whole index,
//!   publishes them and then regenerates robots.txt.
//! - [`Generator::update_content`] merges a single published document into the
//!   current sitemaps.
//!
//! Temp files are never promoted to the store on error, so a failed run leaves
//! the previously published files untouched. Store and temp-file I/O runs on
//! the blocking pool.

use crate::builder::{BuildStats, SitemapBuilder};
use crate::config::{Config, StoreConfig};
use crate::elastic::ElasticScroll;
use crate::merge::merge;
use crate::resolver::{AlternateResolver, Resolution, TranslationCheck, translation_check};
use crate::robots::RobotsConfig;
use crate::scroll::{ScrollQuery, ScrollTransport, Scroller};
use crate::store::{FileStore, file_store};
use crate::{Document, Error, Result, UrlRecord};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::{Span, debug, info, instrument};

type SharedTransport = Arc<dyn ScrollTransport>;
type SharedCheck = Arc<dyn TranslationCheck>;

/// Runs full rebuilds and incremental updates against one file store.
pub struct Generator {
    builder: SitemapBuilder<SharedTransport, SharedCheck>,
    resolver: AlternateResolver<SharedCheck>,
    store: Arc<dyn FileStore>,
    files: StoreConfig,
    robots: RobotsConfig,
    target_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Generator {
    /// Assemble a generator from explicit collaborators.
    pub fn new(
        transport: SharedTransport,
        check: SharedCheck,
        store: Arc<dyn FileStore>,
        config: &Config,
    ) -> Self {
        let scroller = Scroller::new(transport, ScrollQuery::from_config(&config.search));
        let builder = SitemapBuilder::new(
            scroller,
            AlternateResolver::new(Arc::clone(&check), &config.languages),
        )
        .with_temp_dir(config.store.temp_dir.clone());

        Self {
            builder,
            resolver: AlternateResolver::new(check, &config.languages),
            store,
            files: config.store.clone(),
            robots: config.robots.clone(),
            target_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Assemble a generator with the configured backend, CMS and store.
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport: SharedTransport = Arc::new(ElasticScroll::from_config(&config.search)?);
        let check = translation_check(&config.translation)?;
        let store = file_store(&config.store)?;
        Ok(Self::new(transport, check, store, config))
    }

    /// The store this generator publishes to.
    pub fn store(&self) -> &Arc<dyn FileStore> {
        &self.store
    }

    /// Rebuild and publish both sitemaps, then publish robots.txt.
    #[instrument(skip(self))]
    pub async fn generate_full(&self) -> Result<BuildStats> {
        let built = self.builder.build().await?;

        // Each save is atomic but the pair is not. The alternate goes first so a
        // failure never leaves a new primary linking into a stale alternate.
        self.publish(&self.files.alternate_sitemap, built.alternate).await?;
        self.publish(&self.files.primary_sitemap, built.primary).await?;

        let store = Arc::clone(&self.store);
        let name = self.files.robots.clone();
        let robots = self.robots.clone();
        run_blocking(move || save_robots(store.as_ref(), &name, &robots)).await?;

        info!(
            primary = built.stats.primary,
            alternate = built.stats.alternate,
            "Published sitemaps"
        );
        Ok(built.stats)
    }

    /// Render robots.txt and save it to the store.
    pub fn publish_robots(&self) -> Result<()> {
        save_robots(self.store.as_ref(), &self.files.robots, &self.robots)
    }

    /// Merge one document into the published sitemaps.
    ///
    /// The primary record goes into the primary sitemap; when a translation
    /// exists the alternate record goes into the alternate sitemap.
    #[instrument(skip(self, doc), fields(uri = %doc.uri))]
    pub async fn update_content(&self, doc: &Document) -> Result<Resolution> {
        let resolution = self.resolver.resolve(&doc.uri, doc.lastmod()).await;

        self.merge_into(&self.files.primary_sitemap, resolution.primary.clone())
            .await?;
        if let Some(alternate) = &resolution.alternate {
            self.merge_into(&self.files.alternate_sitemap, alternate.clone())
                .await?;
        }

        info!(
            loc = %resolution.primary.loc,
            translated = resolution.alternate.is_some(),
            "Updated sitemap entry"
        );
        Ok(resolution)
    }

    async fn merge_into(&self, name: &str, record: UrlRecord) -> Result<()> {
        let guard = self.target_lock(name).lock_owned().await;

        let store = Arc::clone(&self.store);
        let name = name.to_string();
        let temp_dir = self.files.temp_dir.clone();
        run_blocking(move || {
            let _guard = guard;
            let existing = store.get(&name)?;
            let merged = merge(existing, record, temp_dir.as_deref())?;
            save_file(store.as_ref(), &name, merged)
        })
        .await
    }

    async fn publish(&self, name: &str, file: NamedTempFile) -> Result<()> {
        let guard = self.target_lock(name).lock_owned().await;

        let store = Arc::clone(&self.store);
        let name = name.to_string();
        run_blocking(move || {
            let _guard = guard;
            save_file(store.as_ref(), &name, file)
        })
        .await
    }

    /// Serializes merges and publishes that target the same file. The guard
    /// travels with the blocking write, so a dropped caller cannot release it early.
    fn target_lock(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .target_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }
}

/// Hand a finished temp file to the store. The temp file is removed either way.
fn save_file(store: &dyn FileStore, name: &str, file: NamedTempFile) -> Result<()> {
    let mut content = file.reopen()?;
    store.save(name, &mut content)?;
    debug!(name, "Saved file to store");
    Ok(())
}

fn save_robots(store: &dyn FileStore, name: &str, robots: &RobotsConfig) -> Result<()> {
    let rendered = robots.render();
    store.save(name, &mut rendered.as_bytes())?;
    debug!(name, "Published robots.txt");
    Ok(())
}

/// Run synchronous file work on the blocking pool inside the caller's span.
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let span = Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(work))
        .await
        .map_err(|e| Error::Other(format!("blocking file task failed: {e}")))?
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resolver::NoTranslations;
    use crate::resolver::testing::KnownTranslations;
    use crate::scroll::testing::PagedTransport;
    use crate::store::MemoryStore;
    use crate::xml::read_sitemap;
    use std::io::Read;

    fn config() -> Config {
        let mut config = Config::default();
        config.search.page_size = 2;
        config
    }

    fn generator(
        transport: PagedTransport,
        check: SharedCheck,
        store: &Arc<MemoryStore>,
    ) -> Generator {
        let store: Arc<dyn FileStore> = Arc::clone(store) as Arc<dyn FileStore>;
        Generator::new(Arc::new(transport), check, store, &config())
    }

    fn records(store: &MemoryStore, name: &str) -> Vec<UrlRecord> {
        let xml = store.contents(name).unwrap_or_default();
        read_sitemap(xml.as_bytes()).unwrap().records
    }

    /// Store whose writes always fail.
    struct ReadOnlyStore;

    impl FileStore for ReadOnlyStore {
        fn save(&self, _name: &str, _content: &mut dyn Read) -> Result<()> {
            Err(Error::Store("bucket is read-only".into()))
        }

        fn get(&self, _name: &str) -> Result<Box<dyn Read + Send>> {
            Ok(Box::new(std::io::empty()))
        }
    }

    /// Memory store that refuses writes to one name and remembers writer threads.
    struct PickyStore {
        inner: MemoryStore,
        refuse: &'static str,
        writers: std::sync::Mutex<Vec<std::thread::ThreadId>>,
    }

    impl PickyStore {
        fn refusing(refuse: &'static str) -> Self {
            Self {
                inner: MemoryStore::new(),
                refuse,
                writers: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    impl FileStore for PickyStore {
        fn save(&self, name: &str, content: &mut dyn Read) -> Result<()> {
            self.writers.lock().unwrap().push(std::thread::current().id());
            if name == self.refuse {
                return Err(Error::Store(format!("{name} is locked")));
            }
            self.inner.save(name, content)
        }

        fn get(&self, name: &str) -> Result<Box<dyn Read + Send>> {
            self.inner.get(name)
        }
    }

    #[tokio::test]
    async fn test_generate_full_publishes_everything() {
        // Given: three documents, one translated
        let store = Arc::new(MemoryStore::new());
        let transport = PagedTransport::with_documents(3, 2);
        let generator = generator(
            transport,
            Arc::new(KnownTranslations::of(&["/doc/1"])),
            &store,
        );

        // When: running a full rebuild
        let stats = generator.generate_full().await.unwrap();

        // Then: both sitemaps and robots.txt are in the store
        assert_eq!(stats.primary, 3);
        assert_eq!(records(&store, "sitemap_en.xml").len(), 3);
        assert_eq!(records(&store, "sitemap_cy.xml").len(), 1);
        assert_eq!(
            store.contents("robots.txt").unwrap(),
            RobotsConfig::default().render()
        );
    }

    #[tokio::test]
    async fn test_failed_build_keeps_previous_files() {
        let store = Arc::new(MemoryStore::new());
        store
            .save("sitemap_en.xml", &mut "previous".as_bytes())
            .unwrap();
        let generator = generator(
            PagedTransport::failing_open(),
            Arc::new(NoTranslations),
            &store,
        );

        let err = generator.generate_full().await.unwrap_err();

        assert_eq!(err.category(), "query");
        assert_eq!(store.contents("sitemap_en.xml").as_deref(), Some("previous"));
        assert!(store.contents("robots.txt").is_none());
    }

    #[tokio::test]
    async fn test_store_failure_is_upload_error() {
        let config = config();
        let generator = Generator::new(
            Arc::new(PagedTransport::with_documents(1, 2)),
            Arc::new(NoTranslations),
            Arc::new(ReadOnlyStore),
            &config,
        );

        let err = generator.generate_full().await.unwrap_err();

        assert!(err.to_string().starts_with("failed to upload file"));
    }

    #[tokio::test]
    async fn test_update_into_empty_store() {
        let store = Arc::new(MemoryStore::new());
        let generator = generator(PagedTransport::new(Vec::new()), Arc::new(NoTranslations), &store);

        let resolution = generator
            .update_content(&Document::new("/a", Some("2014-12-10")))
            .await
            .unwrap();

        assert!(resolution.alternate.is_none());
        let en = records(&store, "sitemap_en.xml");
        assert_eq!(en.len(), 1);
        assert_eq!(en[0].loc, "https://www.example.com/a");
        assert!(store.contents("sitemap_cy.xml").is_none());
    }

    #[tokio::test]
    async fn test_update_translated_document_touches_both_files() {
        let store = Arc::new(MemoryStore::new());
        let generator = generator(
            PagedTransport::new(Vec::new()),
            Arc::new(KnownTranslations::of(&["/a"])),
            &store,
        );

        generator
            .update_content(&Document::new("/a", Some("2014-12-10")))
            .await
            .unwrap();

        let en = records(&store, "sitemap_en.xml");
        let cy = records(&store, "sitemap_cy.xml");
        assert_eq!(en[0].alternate.as_ref().unwrap().href, cy[0].loc);
        assert_eq!(cy[0].alternate.as_ref().unwrap().href, en[0].loc);
    }

    #[tokio::test]
    async fn test_update_after_full_rebuild_replaces_entry() {
        let store = Arc::new(MemoryStore::new());
        let generator = generator(
            PagedTransport::with_documents(3, 2),
            Arc::new(NoTranslations),
            &store,
        );
        generator.generate_full().await.unwrap();

        generator
            .update_content(&Document::new("/doc/1", Some("2025-05-05")))
            .await
            .unwrap();

        let en = records(&store, "sitemap_en.xml");
        assert_eq!(en.len(), 3);
        assert_eq!(en[1].loc, "https://www.example.com/doc/1");
        assert_eq!(en[1].lastmod.as_deref(), Some("2025-05-05"));
    }

    #[tokio::test]
    async fn test_update_with_corrupt_sitemap_leaves_it_alone() {
        let store = Arc::new(MemoryStore::new());
        store
            .save("sitemap_en.xml", &mut "<urlset><url>".as_bytes())
            .unwrap();
        let generator = generator(PagedTransport::new(Vec::new()), Arc::new(NoTranslations), &store);

        let err = generator
            .update_content(&Document::new("/a", None))
            .await
            .unwrap_err();

        assert_eq!(err.category(), "decode");
        assert_eq!(store.contents("sitemap_en.xml").as_deref(), Some("<urlset><url>"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_to_same_target_are_all_kept() {
        let store = Arc::new(MemoryStore::new());
        let generator = Arc::new(generator(
            PagedTransport::new(Vec::new()),
            Arc::new(NoTranslations),
            &store,
        ));

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let generator = Arc::clone(&generator);
                tokio::spawn(async move {
                    generator
                        .update_content(&Document::new(format!("/page/{i}"), None))
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(records(&store, "sitemap_en.xml").len(), 20);
    }

    #[tokio::test]
    async fn test_failed_alternate_publish_keeps_previous_primary() {
        // Given: a published primary and a store that refuses the alternate file
        let store = Arc::new(PickyStore::refusing("sitemap_cy.xml"));
        store
            .inner
            .save("sitemap_en.xml", &mut "previous".as_bytes())
            .unwrap();
        let generator = Generator::new(
            Arc::new(PagedTransport::with_documents(2, 2)),
            Arc::new(KnownTranslations::of(&["/doc/0"])),
            Arc::clone(&store) as Arc<dyn FileStore>,
            &config(),
        );

        // When: the rebuild fails while publishing
        let err = generator.generate_full().await.unwrap_err();

        // Then: the primary still points at the old, consistent pair
        assert_eq!(err.category(), "store");
        assert_eq!(
            store.inner.contents("sitemap_en.xml").as_deref(),
            Some("previous")
        );
        assert!(store.inner.contents("robots.txt").is_none());
    }

    #[tokio::test]
    async fn test_store_writes_run_on_blocking_pool() {
        // Given: a current-thread runtime, so async code runs on this thread
        let runtime_thread = std::thread::current().id();
        let store = Arc::new(PickyStore::refusing("none"));
        let generator = Generator::new(
            Arc::new(PagedTransport::with_documents(1, 2)),
            Arc::new(NoTranslations),
            Arc::clone(&store) as Arc<dyn FileStore>,
            &config(),
        );

        // When: rebuilding and then merging one update
        generator.generate_full().await.unwrap();
        generator
            .update_content(&Document::new("/a", None))
            .await
            .unwrap();

        // Then: no store write happened on the runtime thread
        let writers = store.writers.lock().unwrap();
        assert_eq!(writers.len(), 4);
        assert!(writers.iter().all(|id| *id != runtime_thread));
    }
}
