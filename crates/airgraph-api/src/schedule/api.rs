//! `ScheduleSource` trait definition.
#![allow(clippy::future_not_send)]

use anyhow::Result;

use super::types::{AudienceSample, Slot, Timetable};

/// Broadcaster schedule API trait.
///
/// Abstracts upstream operations for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(ScheduleSource: Send)]
pub trait LocalScheduleSource {
    /// Fetches the full timetable (all channels, all days served by the feed).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request or JSON decoding fails.
    async fn fetch_timetable(&self) -> Result<Timetable>;

    /// Fetches the detail of a single slot, programs included.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request or JSON decoding fails.
    async fn fetch_slot(&self, slot_id: &str) -> Result<Slot>;

    /// Fetches the slot sitemap and returns the slot IDs it links to.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request or XML parsing fails.
    async fn fetch_sitemap_ids(&self) -> Result<Vec<String>>;

    /// Fetches live audience counts for the given slots in one request.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request or JSON decoding fails.
    async fn fetch_audience(&self, slot_ids: &[String]) -> Result<Vec<AudienceSample>>;
}
