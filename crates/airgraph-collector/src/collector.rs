//! `Collector` - collaborators, current timetable and query surface.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use airgraph_api::schedule::{Channel, ScheduleSource, Slot, Timetable};
use airgraph_api::search::SearchIndex;
use airgraph_db::{SlotLog, Store};
use anyhow::{Context, Result};
use serde_json::Value;

use crate::cache;

/// Schedule collector.
///
/// Owns the persistent store, the schedule source and the search index,
/// plus the most recently completed timetable. Readers get an `Arc`
/// snapshot; a sync cycle replaces it wholesale.
#[derive(Debug)]
pub struct Collector<S, I> {
    pub(crate) store: Store,
    pub(crate) source: S,
    pub(crate) index: I,
    pub(crate) cache_path: Option<PathBuf>,
    timetable: RwLock<Option<Arc<Timetable>>>,
}

/// Builder for `Collector`.
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub struct CollectorBuilder<S, I> {
    store: Option<Store>,
    source: Option<S>,
    index: Option<I>,
    cache_path: Option<PathBuf>,
}

impl<S, I> Default for CollectorBuilder<S, I> {
    fn default() -> Self {
        Self {
            store: None,
            source: None,
            index: None,
            cache_path: None,
        }
    }
}

impl<S, I> CollectorBuilder<S, I> {
    /// Sets the persistent store (required).
    #[must_use]
    pub fn store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the schedule source (required).
    #[must_use]
    pub fn source(mut self, source: S) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the search index (required).
    #[must_use]
    pub fn index(mut self, index: I) -> Self {
        self.index = Some(index);
        self
    }

    /// Sets the durable timetable cache file. Without one, fetched
    /// timetables are not cached.
    #[must_use]
    pub fn cache_path(mut self, path: PathBuf) -> Self {
        self.cache_path = Some(path);
        self
    }

    /// Builds the collector.
    ///
    /// # Errors
    ///
    /// Returns an error if the store, source or search index is not set.
    pub fn build(self) -> Result<Collector<S, I>> {
        let store = self.store.context("store is required")?;
        let source = self.source.context("source is required")?;
        let index = self.index.context("search index is required")?;

        Ok(Collector {
            store,
            source,
            index,
            cache_path: self.cache_path,
            timetable: RwLock::new(None),
        })
    }
}

impl<S, I> Collector<S, I> {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> CollectorBuilder<S, I> {
        CollectorBuilder::default()
    }

    /// Returns the current timetable snapshot, if one has been loaded.
    #[must_use]
    pub fn timetable(&self) -> Option<Arc<Timetable>> {
        match self.timetable.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replaces the current timetable.
    pub(crate) fn install_timetable(&self, timetable: Timetable) {
        let timetable = Arc::new(timetable);
        match self.timetable.write() {
            Ok(mut guard) => *guard = Some(timetable),
            Err(poisoned) => *poisoned.into_inner() = Some(timetable),
        }
    }

    /// Installs the durable cache as the current timetable.
    ///
    /// Returns `true` if a cached timetable was installed. A missing cache
    /// file is not an error; a corrupt one is logged and ignored.
    pub fn load_cached_timetable(&self) -> bool {
        let Some(path) = self.cache_path.as_deref() else {
            return false;
        };
        match cache::load_timetable(path) {
            Ok(Some(timetable)) => {
                tracing::info!(
                    path = %path.display(),
                    channels = timetable.channels.len(),
                    "Restored cached timetable"
                );
                self.install_timetable(timetable);
                true
            }
            Ok(None) => {
                tracing::debug!(path = %path.display(), "No cached timetable");
                false
            }
            Err(e) => {
                tracing::warn!(error = format!("{e:#}"), "Ignoring unreadable timetable cache");
                false
            }
        }
    }

    /// Channels of the current timetable.
    #[must_use]
    pub fn channels(&self) -> Option<Vec<Channel>> {
        self.timetable().map(|t| t.channels.clone())
    }

    /// Slots of the current timetable airing at `now` (epoch seconds).
    #[must_use]
    pub fn current_slots(&self, now: i64) -> Vec<Slot> {
        self.timetable()
            .map(|t| t.current_slots(now).into_iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Finds persisted channels by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn find_channels(&self, ids: &[String]) -> Result<Vec<Channel>> {
        self.store.find_channels(ids)
    }

    /// Finds persisted audience logs by slot ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn find_logs(&self, slot_ids: &[String]) -> Result<HashMap<String, SlotLog>> {
        self.store.find_logs(slot_ids)
    }

    /// Finds persisted slots by ID with their programs resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the store query fails.
    pub fn find_slots(&self, ids: &[String]) -> Result<Vec<Slot>> {
        self.store.find_slots(ids)
    }
}

impl<S, I> Collector<S, I>
where
    S: ScheduleSource,
    I: SearchIndex,
{
    /// Runs a raw query against the search index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index request fails.
    pub async fn search(&self, query: &Value) -> Result<Value> {
        self.index
            .search(query)
            .await
            .context("search failed")
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use serde_json::json;

    use super::*;
    use crate::testing::{MockIndex, MockSource, build_collector, sample_timetable};

    #[test]
    fn test_build_requires_store() {
        // Arrange
        let builder: CollectorBuilder<MockSource, MockIndex> = Collector::builder()
            .source(MockSource::default())
            .index(MockIndex::default());

        // Act
        let result = builder.build();

        // Assert
        assert_eq!(result.unwrap_err().to_string(), "store is required");
    }

    #[test]
    fn test_build_requires_source_and_index() {
        // Arrange
        let no_source: CollectorBuilder<MockSource, MockIndex> = Collector::builder()
            .store(Store::open_in_memory().unwrap())
            .index(MockIndex::default());
        let no_index: CollectorBuilder<MockSource, MockIndex> = Collector::builder()
            .store(Store::open_in_memory().unwrap())
            .source(MockSource::default());

        // Act
        let source_err = no_source.build().unwrap_err();
        let index_err = no_index.build().unwrap_err();

        // Assert
        assert_eq!(source_err.to_string(), "source is required");
        assert_eq!(index_err.to_string(), "search index is required");
    }

    #[test]
    fn test_queries_without_timetable() {
        // Arrange
        let collector = build_collector(&MockSource::default(), &MockIndex::default());

        // Act & Assert
        assert!(collector.timetable().is_none());
        assert!(collector.channels().is_none());
        assert!(collector.current_slots(0).is_empty());
    }

    #[test]
    fn test_current_slots_from_installed_timetable() {
        // Arrange
        let collector = build_collector(&MockSource::default(), &MockIndex::default());
        collector.install_timetable(sample_timetable(10_000));

        // Act
        let slots = collector.current_slots(10_000);

        // Assert
        let ids: Vec<&str> = slots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["s1", "s2"]);
        assert_eq!(collector.channels().unwrap().len(), 2);
    }

    #[test]
    fn test_current_slots_boundaries_inclusive() {
        // Arrange
        let collector = build_collector(&MockSource::default(), &MockIndex::default());
        collector.install_timetable(sample_timetable(10_000));

        // Act
        let at_end_of_s2 = collector.current_slots(10_300);

        // Assert: s2 ends and s3 starts at 10_300
        let ids: Vec<&str> = at_end_of_s2.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["s1", "s2", "s3"]);
    }

    #[test]
    fn test_load_cached_timetable() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timetable.json");
        cache::save_timetable(&path, &sample_timetable(10_000)).unwrap();
        let collector = Collector::builder()
            .store(Store::open_in_memory().unwrap())
            .source(MockSource::default())
            .index(MockIndex::default())
            .cache_path(path)
            .build()
            .unwrap();

        // Act
        let restored = collector.load_cached_timetable();

        // Assert
        assert!(restored);
        assert_eq!(collector.timetable().unwrap().channels[0].id, "news");
    }

    #[test]
    fn test_load_cached_timetable_ignores_corrupt_file() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("timetable.json");
        std::fs::write(&path, "not json").unwrap();
        let collector = Collector::builder()
            .store(Store::open_in_memory().unwrap())
            .source(MockSource::default())
            .index(MockIndex::default())
            .cache_path(path)
            .build()
            .unwrap();

        // Act
        let restored = collector.load_cached_timetable();

        // Assert
        assert!(!restored);
        assert!(collector.timetable().is_none());
    }

    #[tokio::test]
    async fn test_search_passes_through() {
        // Arrange
        let collector = build_collector(&MockSource::default(), &MockIndex::default());
        let query = json!({"query": {"match": {"title": "news"}}});

        // Act
        let result = collector.search(&query).await.unwrap();

        // Assert
        assert_eq!(result["echo"], query);
    }
}
