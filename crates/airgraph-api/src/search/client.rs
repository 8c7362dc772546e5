//! `SearchClient` - Elasticsearch-compatible index client.

use std::fmt::Write as _;

use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::instrument;
use url::Url;

use super::api::SearchIndex;
use super::document::{BulkReport, SearchDocument};

/// Default index server URL.
const DEFAULT_BASE_URL: &str = "http://localhost:9200/";

/// Default index name.
const DEFAULT_INDEX: &str = "airgraph";

/// `_bulk` response body.
#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<BulkItem>,
}

/// One `_bulk` response item (only `index` actions are sent).
#[derive(Debug, Deserialize)]
struct BulkItem {
    index: Option<BulkItemStatus>,
}

/// Per-document result status.
#[derive(Debug, Deserialize)]
struct BulkItemStatus {
    status: u16,
}

/// Search index client.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct SearchClient {
    /// HTTP client.
    http_client: Client,
    /// `{base}/{index}/` URL.
    index_url: Url,
}

/// Builder for `SearchClient`.
#[derive(Debug, Default)]
#[allow(clippy::module_name_repetitions)]
pub struct SearchClientBuilder {
    base_url: Option<Url>,
    index: Option<String>,
}

impl SearchClientBuilder {
    /// Overrides the server URL (default: `http://localhost:9200/`).
    #[must_use]
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Overrides the index name (default: `airgraph`).
    #[must_use]
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client fails to build.
    pub fn build(self) -> Result<SearchClient> {
        let mut base_url = match self.base_url {
            Some(url) => url,
            None => Url::parse(DEFAULT_BASE_URL).context("invalid default search URL")?,
        };
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let index = self.index.unwrap_or_else(|| String::from(DEFAULT_INDEX));
        let index_url = base_url
            .join(&format!("{index}/"))
            .with_context(|| format!("invalid index name: {index}"))?;

        let http_client = Client::builder()
            .gzip(true)
            .build()
            .context("failed to build HTTP client")?;

        Ok(SearchClient {
            http_client,
            index_url,
        })
    }
}

impl SearchClient {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> SearchClientBuilder {
        SearchClientBuilder::default()
    }

    /// Serializes documents as an NDJSON `_bulk` body of `index` actions.
    fn bulk_body(docs: &[SearchDocument]) -> Result<String> {
        let mut body = String::new();
        for doc in docs {
            let action = json!({ "index": { "_id": doc.id } });
            let source = serde_json::to_string(doc)
                .with_context(|| format!("failed to serialize document {}", doc.id))?;
            writeln!(body, "{action}").context("failed to write bulk action")?;
            writeln!(body, "{source}").context("failed to write bulk document")?;
        }
        Ok(body)
    }

    /// Summarizes a `_bulk` response.
    fn summarize(response: &BulkResponse) -> BulkReport {
        let indexed = response
            .items
            .iter()
            .filter(|item| {
                item.index
                    .as_ref()
                    .is_some_and(|s| (200..300).contains(&s.status))
            })
            .count();
        BulkReport {
            indexed,
            failed: response.items.len().saturating_sub(indexed),
        }
    }
}

impl SearchIndex for SearchClient {
    #[instrument(skip_all, fields(docs = docs.len()))]
    async fn bulk_index(&self, docs: &[SearchDocument]) -> Result<BulkReport> {
        if docs.is_empty() {
            return Ok(BulkReport::default());
        }

        let url = self.index_url.join("_bulk").context("invalid bulk URL")?;
        let body = Self::bulk_body(docs)?;

        let response = self
            .http_client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .context("bulk request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("bulk request returned HTTP {status}");
        }

        let parsed: BulkResponse = response
            .json()
            .await
            .context("failed to decode bulk response")?;
        let report = Self::summarize(&parsed);

        if parsed.errors {
            tracing::warn!(
                indexed = report.indexed,
                failed = report.failed,
                "Bulk indexing completed with errors"
            );
        } else {
            tracing::debug!(indexed = report.indexed, "Bulk indexing completed");
        }
        Ok(report)
    }

    #[instrument(skip_all)]
    async fn search(&self, query: &Value) -> Result<Value> {
        let url = self.index_url.join("_search").context("invalid search URL")?;

        let response = self
            .http_client
            .post(url)
            .json(query)
            .send()
            .await
            .context("search request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("search request returned HTTP {status}");
        }

        response
            .json()
            .await
            .context("failed to decode search response")
    }
}
