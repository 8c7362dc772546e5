//! `SearchIndex` trait definition.
#![allow(clippy::future_not_send)]

use anyhow::Result;
use serde_json::Value;

use super::document::{BulkReport, SearchDocument};

/// Search index trait.
///
/// The collector only writes through `bulk_index`; `search` is a
/// pass-through for read-side consumers.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(SearchIndex: Send)]
pub trait LocalSearchIndex {
    /// Indexes documents in one bulk request, replacing documents with the same ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the response cannot be decoded.
    async fn bulk_index(&self, docs: &[SearchDocument]) -> Result<BulkReport>;

    /// Runs a raw JSON query body against the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails or the response cannot be decoded.
    async fn search(&self, query: &Value) -> Result<Value>;
}
