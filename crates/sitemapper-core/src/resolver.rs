//! Alternate-language resolution for content paths.
//!
//! Every path yields a primary-language record. When the translation check says a
//! translated page exists, a second record for the alternate language is produced
//! and the two link to each other.
//!
//! A failing translation check counts as "no translation". Sitemap generation
//! keeps going with primary-only records when the CMS is down.

use crate::config::{LanguagesConfig, Site, TranslationConfig};
use crate::{Error, Result, UrlRecord};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Existence check for translated content.
#[async_trait]
pub trait TranslationCheck: Send + Sync {
    /// Check whether `path` exists in language `lang`.
    ///
    /// `Ok(())` means the translation exists; any error means it does not.
    async fn exists(&self, path: &str, lang: &str) -> Result<()>;
}

#[async_trait]
impl<T: TranslationCheck + ?Sized> TranslationCheck for Arc<T> {
    async fn exists(&self, path: &str, lang: &str) -> Result<()> {
        (**self).exists(path, lang).await
    }
}

/// Check used when no CMS is configured: nothing is ever translated.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTranslations;

#[async_trait]
impl TranslationCheck for NoTranslations {
    async fn exists(&self, path: &str, lang: &str) -> Result<()> {
        Err(Error::NotTranslated(format!("{lang}{path}")))
    }
}

/// Translation check against a CMS metadata endpoint.
///
/// Issues `GET {url}?uri={path}&lang={lang}`; any 2xx response, including an
/// empty body, means the translation exists.
pub struct HttpTranslationCheck {
    client: Client,
    url: String,
}

impl HttpTranslationCheck {
    /// Create a check with a custom request timeout.
    pub fn with_timeout(url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sitemapper/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Network)?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl TranslationCheck for HttpTranslationCheck {
    async fn exists(&self, path: &str, lang: &str) -> Result<()> {
        self.client
            .get(&self.url)
            .query(&[("uri", path), ("lang", lang)])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Build the translation check selected by configuration.
pub fn translation_check(config: &TranslationConfig) -> Result<Arc<dyn TranslationCheck>> {
    match &config.url {
        Some(url) => Ok(Arc::new(HttpTranslationCheck::with_timeout(
            url,
            Duration::from_secs(config.request_timeout),
        )?)),
        None => Ok(Arc::new(NoTranslations)),
    }
}

/// The records produced for one content path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Primary-language record, always present.
    pub primary: UrlRecord,
    /// Alternate-language record when a translation exists.
    pub alternate: Option<UrlRecord>,
}

/// Produces paired primary/alternate URL records for content paths.
pub struct AlternateResolver<C> {
    check: C,
    primary: Site,
    alternate: Site,
}

impl<C: TranslationCheck> AlternateResolver<C> {
    /// Create a resolver for the configured languages.
    pub fn new(check: C, languages: &LanguagesConfig) -> Self {
        Self {
            check,
            primary: languages.primary.clone(),
            alternate: languages.alternate.clone(),
        }
    }

    /// Resolve `path` into its URL records.
    ///
    /// Never fails: translation-check errors degrade to a primary-only result.
    pub async fn resolve(&self, path: &str, lastmod: Option<String>) -> Resolution {
        let primary_loc = location(&self.primary.host, path);

        match self.check.exists(path, &self.alternate.lang).await {
            Ok(()) => {
                let alternate_loc = location(&self.alternate.host, path);
                debug!(path, "Translation found");
                Resolution {
                    primary: UrlRecord::new(primary_loc.clone(), lastmod.clone())
                        .with_alternate(self.alternate.lang.clone(), alternate_loc.clone()),
                    alternate: Some(
                        UrlRecord::new(alternate_loc, lastmod)
                            .with_alternate(self.primary.lang.clone(), primary_loc),
                    ),
                }
            },
            Err(e) => {
                if !matches!(e, Error::NotTranslated(_)) {
                    warn!(path, error = %e, "Translation check failed, treating as untranslated");
                }
                Resolution {
                    primary: UrlRecord::new(primary_loc, lastmod),
                    alternate: None,
                }
            },
        }
    }
}

/// Join a host and a content path with exactly one slash between them.
fn location(host: &str, path: &str) -> String {
    let host = host.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{host}{path}")
    } else {
        format!("{host}/{path}")
    }
}
