//! Search index client module.
//!
//! Pushes flattened slot documents into an Elasticsearch-compatible index
//! through the `_bulk` API and forwards raw search queries.

mod api;
mod client;
mod document;

#[allow(clippy::module_name_repetitions)]
pub use api::{LocalSearchIndex, SearchIndex};
#[allow(clippy::module_name_repetitions)]
pub use client::{SearchClient, SearchClientBuilder};
pub use document::{BulkReport, SearchDocument};
