//! Test doubles and fixtures shared by the collector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::arithmetic_side_effects)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use airgraph_api::schedule::{AudienceSample, ScheduleSource, Slot, Timetable};
use airgraph_api::search::{BulkReport, SearchDocument, SearchIndex};
use airgraph_db::Store;
use anyhow::{Result, bail};
use serde_json::{Value, json};

use crate::collector::Collector;

/// Collector wired to mocks.
pub type MockCollector = Collector<MockSource, MockIndex>;

#[derive(Debug, Default)]
struct SourceState {
    timetable: Mutex<Option<Timetable>>,
    slots: Mutex<HashMap<String, Slot>>,
    sitemap: Mutex<Option<Vec<String>>>,
    audience: Mutex<HashMap<String, AudienceSample>>,
    timetable_calls: AtomicU32,
    slot_calls: AtomicU32,
    sitemap_calls: AtomicU32,
    audience_calls: AtomicU32,
}

/// Schedule source returning pre-configured data.
///
/// Clones share state, so a test can keep a handle after moving one into
/// a collector.
#[derive(Debug, Clone, Default)]
pub struct MockSource {
    state: Arc<SourceState>,
}

impl MockSource {
    /// Source serving `timetable` and an empty sitemap.
    pub fn new(timetable: Timetable) -> Self {
        let source = Self::default();
        source.set_timetable(Some(timetable));
        source.set_sitemap(Some(Vec::new()));
        source
    }

    /// Replaces the timetable; `None` makes fetches fail.
    pub fn set_timetable(&self, timetable: Option<Timetable>) {
        *self.state.timetable.lock().unwrap() = timetable;
    }

    /// Replaces the sitemap IDs; `None` makes fetches fail.
    pub fn set_sitemap(&self, ids: Option<Vec<&str>>) {
        *self.state.sitemap.lock().unwrap() =
            ids.map(|ids| ids.into_iter().map(String::from).collect());
    }

    /// Registers a slot served by `fetch_slot`.
    pub fn add_slot(&self, slot: Slot) {
        self.state.slots.lock().unwrap().insert(slot.id.clone(), slot);
    }

    /// Sets the audience counters reported for a slot.
    pub fn set_audience(&self, slot_id: &str, channel_id: &str, comments: u64, views: u64) {
        self.state.audience.lock().unwrap().insert(
            String::from(slot_id),
            AudienceSample {
                slot_id: String::from(slot_id),
                channel_id: String::from(channel_id),
                comment_count: Some(comments),
                view_count: Some(views),
            },
        );
    }

    pub fn timetable_calls(&self) -> u32 {
        self.state.timetable_calls.load(Ordering::SeqCst)
    }

    pub fn slot_calls(&self) -> u32 {
        self.state.slot_calls.load(Ordering::SeqCst)
    }

    pub fn sitemap_calls(&self) -> u32 {
        self.state.sitemap_calls.load(Ordering::SeqCst)
    }

    pub fn audience_calls(&self) -> u32 {
        self.state.audience_calls.load(Ordering::SeqCst)
    }
}

impl ScheduleSource for MockSource {
    async fn fetch_timetable(&self) -> Result<Timetable> {
        self.state.timetable_calls.fetch_add(1, Ordering::SeqCst);
        match self.state.timetable.lock().unwrap().clone() {
            Some(timetable) => Ok(timetable),
            None => bail!("timetable unavailable"),
        }
    }

    async fn fetch_slot(&self, slot_id: &str) -> Result<Slot> {
        self.state.slot_calls.fetch_add(1, Ordering::SeqCst);
        match self.state.slots.lock().unwrap().get(slot_id) {
            Some(slot) => Ok(slot.clone()),
            None => bail!("slot {slot_id} not found"),
        }
    }

    async fn fetch_sitemap_ids(&self) -> Result<Vec<String>> {
        self.state.sitemap_calls.fetch_add(1, Ordering::SeqCst);
        match self.state.sitemap.lock().unwrap().clone() {
            Some(ids) => Ok(ids),
            None => bail!("sitemap XML decoding failed"),
        }
    }

    async fn fetch_audience(&self, slot_ids: &[String]) -> Result<Vec<AudienceSample>> {
        self.state.audience_calls.fetch_add(1, Ordering::SeqCst);
        let audience = self.state.audience.lock().unwrap();
        Ok(slot_ids
            .iter()
            .filter_map(|id| audience.get(id).cloned())
            .collect())
    }
}

#[derive(Debug, Default)]
struct IndexState {
    documents: Mutex<Vec<SearchDocument>>,
    bulk_calls: AtomicU32,
}

/// Search index recording bulk writes.
#[derive(Debug, Clone, Default)]
pub struct MockIndex {
    state: Arc<IndexState>,
}

impl MockIndex {
    /// Documents from the most recent bulk write.
    pub fn documents(&self) -> Vec<SearchDocument> {
        self.state.documents.lock().unwrap().clone()
    }

    pub fn bulk_calls(&self) -> u32 {
        self.state.bulk_calls.load(Ordering::SeqCst)
    }
}

impl SearchIndex for MockIndex {
    async fn bulk_index(&self, docs: &[SearchDocument]) -> Result<BulkReport> {
        self.state.bulk_calls.fetch_add(1, Ordering::SeqCst);
        *self.state.documents.lock().unwrap() = docs.to_vec();
        Ok(BulkReport {
            indexed: docs.len(),
            failed: 0,
        })
    }

    async fn search(&self, query: &Value) -> Result<Value> {
        Ok(json!({ "echo": query }))
    }
}

/// Builds a slot on `channel_id` spanning `[start_at, end_at]`.
pub fn make_slot(id: &str, channel_id: &str, start_at: i64, end_at: i64, programs: &[&str]) -> Slot {
    let programs: Vec<Value> = programs
        .iter()
        .map(|pid| json!({"id": pid, "credit": {"casts": [format!("cast of {pid}")]}}))
        .collect();
    serde_json::from_value(json!({
        "id": id,
        "channelId": channel_id,
        "startAt": start_at,
        "endAt": end_at,
        "title": format!("Title {id}"),
        "programs": programs,
    }))
    .unwrap()
}

/// Two channels; `s1` (news) and `s2` (anime) air at `now`, `s3` airs later.
pub fn sample_timetable(now: i64) -> Timetable {
    serde_json::from_value(json!({
        "channels": [
            {"id": "news", "name": "News", "order": 1},
            {"id": "anime", "name": "Anime", "order": 2}
        ],
        "channelSchedules": [
            {
                "channelId": "news",
                "date": "20240101",
                "slots": [make_slot("s1", "news", now - 600, now + 600, &["p1", "p2"])]
            },
            {
                "channelId": "anime",
                "date": "20240101",
                "slots": [
                    make_slot("s2", "anime", now - 300, now + 300, &["p2"]),
                    make_slot("s3", "anime", now + 300, now + 1800, &["p3"])
                ]
            }
        ]
    }))
    .unwrap()
}

/// Builds a collector over an in-memory store.
pub fn build_collector(source: &MockSource, index: &MockIndex) -> MockCollector {
    Collector::builder()
        .store(Store::open_in_memory().unwrap())
        .source(source.clone())
        .index(index.clone())
        .build()
        .unwrap()
}
