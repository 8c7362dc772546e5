//! API client library for airgraph.
//!
//! Provides the broadcaster schedule/audience client and the search index
//! client used by the collector.

/// Broadcaster schedule and audience API client.
pub mod schedule;

/// Search index client.
pub mod search;
