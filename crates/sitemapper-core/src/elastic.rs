//! Elasticsearch scroll API transport.
//!
//! - open: `POST /{index}/_search?scroll={n}s` with `{size, sort}`
//! - next: `POST /_search/scroll` with `{scroll, scroll_id}`
//! - clear: `DELETE /_search/scroll` with `{scroll_id}`
//!
//! Every response has the shape `{_scroll_id, hits: {hits: [{_source}]}}`.

use crate::scroll::{ScrollBatch, ScrollQuery, ScrollTransport};
use crate::{Document, Error, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// Longest backend error body copied into an error message.
const MAX_ERROR_BODY: usize = 512;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "_scroll_id")]
    scroll_id: Option<String>,
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "_source")]
    source: Document,
}

impl From<SearchResponse> for ScrollBatch {
    fn from(response: SearchResponse) -> Self {
        Self {
            token: response.scroll_id,
            documents: response.hits.hits.into_iter().map(|h| h.source).collect(),
        }
    }
}

/// Scroll transport speaking the Elasticsearch HTTP API.
pub struct ElasticScroll {
    client: Client,
    base_url: String,
}

impl ElasticScroll {
    /// Create a transport with a default 30 second request timeout.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    /// Create a transport with a custom request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sitemapper/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .build()
            .map_err(Error::Network)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a transport from search configuration.
    pub fn from_config(search: &crate::config::SearchConfig) -> Result<Self> {
        Self::with_timeout(&search.url, Duration::from_secs(search.request_timeout))
    }

    fn keep_alive(duration: Duration) -> String {
        format!("{}s", duration.as_secs().max(1))
    }
}

async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    format!("{status}: {body}")
}

#[async_trait]
impl ScrollTransport for ElasticScroll {
    async fn open(&self, query: &ScrollQuery) -> Result<ScrollBatch> {
        let url = format!("{}/{}/_search", self.base_url, query.index);
        debug!(url = %url, size = query.page_size, "Opening scroll");

        let response = self
            .client
            .post(&url)
            .query(&[("scroll", Self::keep_alive(query.keep_alive))])
            .json(&json!({
                "size": query.page_size,
                "sort": [query.sort],
            }))
            .send()
            .await
            .map_err(|e| Error::Query(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Query(error_body(response).await));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| Error::Query(format!("invalid search response: {e}")))?;
        Ok(body.into())
    }

    async fn next(&self, token: &str, keep_alive: Duration) -> Result<ScrollBatch> {
        let url = format!("{}/_search/scroll", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&json!({
                "scroll": Self::keep_alive(keep_alive),
                "scroll_id": token,
            }))
            .send()
            .await
            .map_err(|e| Error::Cursor {
                expired: false,
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Cursor {
                expired: status == StatusCode::NOT_FOUND,
                message: error_body(response).await,
            });
        }

        let body: SearchResponse = response.json().await.map_err(|e| Error::Cursor {
            expired: false,
            message: format!("invalid scroll response: {e}"),
        })?;
        Ok(body.into())
    }

    async fn clear(&self, token: &str) -> Result<()> {
        let url = format!("{}/_search/scroll", self.base_url);
        self.client
            .delete(&url)
            .json(&json!({ "scroll_id": token }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}
