//! Sitemap-driven backfill of slots the schedule feed omits.

use std::collections::{BTreeSet, HashMap, HashSet};

use airgraph_api::schedule::{Channel, ChannelSchedule, ScheduleSource, Slot, Timetable};
use airgraph_api::search::SearchIndex;
use anyhow::{Context, Result};
use chrono::Local;
use tracing::instrument;

use crate::collector::Collector;

/// Entities spliced into a timetable by reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Channels synthesized for slots whose channel was unknown.
    pub channels: Vec<Channel>,
    /// Slots added to the timetable.
    pub slots: Vec<Slot>,
    /// How many of `slots` came from the store rather than the source.
    pub reused: usize,
}

impl Reconciliation {
    /// Returns `true` if nothing was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty() && self.slots.is_empty()
    }
}

impl<S, I> Collector<S, I>
where
    S: ScheduleSource,
    I: SearchIndex,
{
    /// Backfills sitemap slots missing from `timetable`.
    ///
    /// Slots already persisted are reused as stored; the rest are fetched
    /// one by one. A slot that cannot be fetched is skipped. Added slots
    /// are grouped into one schedule per channel dated today.
    ///
    /// # Errors
    ///
    /// Returns an error if the sitemap cannot be fetched or parsed, or the
    /// store lookup fails.
    #[instrument(skip_all)]
    pub async fn reconcile_missing(&self, timetable: &mut Timetable) -> Result<Reconciliation> {
        let sitemap_ids = self
            .source
            .fetch_sitemap_ids()
            .await
            .context("failed to fetch slot sitemap")?;

        let missing = missing_ids(timetable, sitemap_ids);
        if missing.is_empty() {
            tracing::debug!("No slots missing from the timetable");
            return Ok(Reconciliation::default());
        }

        let mut stored: HashMap<String, Slot> = self
            .store
            .find_slots(&missing)?
            .into_iter()
            .map(|slot| (slot.id.clone(), slot))
            .collect();

        let mut slots = Vec::with_capacity(missing.len());
        let mut reused: usize = 0;
        for id in &missing {
            if let Some(slot) = stored.remove(id) {
                reused = reused.saturating_add(1);
                slots.push(slot);
                continue;
            }
            match self.source.fetch_slot(id).await {
                Ok(slot) => {
                    tracing::debug!(slot_id = %id, channel_id = %slot.channel_id, "Fetched missing slot");
                    slots.push(slot);
                }
                Err(e) => {
                    tracing::warn!(slot_id = %id, error = format!("{e:#}"), "Skipping unfetchable slot");
                }
            }
        }

        let date = Local::now().format("%Y%m%d").to_string();
        let channels = splice(timetable, &slots, &date);

        tracing::info!(
            added = slots.len(),
            reused,
            channels = channels.len(),
            "Reconciled slots from sitemap"
        );
        Ok(Reconciliation {
            channels,
            slots,
            reused,
        })
    }
}

/// Sitemap IDs not present in `timetable`, first occurrence order, deduplicated.
fn missing_ids(timetable: &Timetable, sitemap_ids: Vec<String>) -> Vec<String> {
    let known: HashSet<&str> = timetable.slots().map(|s| s.id.as_str()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    sitemap_ids
        .into_iter()
        .filter(|id| !known.contains(id.as_str()) && seen.insert(id.clone()))
        .collect()
}

/// Appends `slots` to `timetable` as one `date` schedule per channel and
/// synthesizes unknown channels. Returns the synthesized channels.
fn splice(timetable: &mut Timetable, slots: &[Slot], date: &str) -> Vec<Channel> {
    let mut channel_ids: Vec<&str> = Vec::new();
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    for slot in slots {
        if seen.insert(slot.channel_id.as_str()) {
            channel_ids.push(slot.channel_id.as_str());
        }
    }

    let mut synthesized = Vec::new();
    for channel_id in channel_ids {
        if !timetable.contains_channel(channel_id) {
            let channel = Channel::synthesized(channel_id);
            timetable.channels.push(channel.clone());
            synthesized.push(channel);
        }
        timetable.channel_schedules.push(ChannelSchedule {
            channel_id: String::from(channel_id),
            date: String::from(date),
            slots: slots
                .iter()
                .filter(|s| s.channel_id == channel_id)
                .cloned()
                .collect(),
        });
    }
    synthesized
}
