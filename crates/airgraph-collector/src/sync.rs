//! Full schedule refresh cycle.

use std::collections::HashSet;

use airgraph_api::schedule::{Channel, Program, ScheduleSource, Slot};
use airgraph_api::search::{BulkReport, SearchDocument, SearchIndex};
use airgraph_db::BatchInsert;
use anyhow::{Context, Result};
use tracing::instrument;

use crate::cache;
use crate::collector::Collector;
use crate::reconcile::Reconciliation;

/// Summary of one refresh cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Channels in the final timetable.
    pub channels: usize,
    /// Slots in the final timetable.
    pub slots: usize,
    /// Program insert outcome (feed and reconciled slots combined).
    pub programs: BatchInsert,
    /// Slots added by reconciliation.
    pub reconciled: usize,
    /// Search index outcome.
    pub indexed: BulkReport,
}

impl<S, I> Collector<S, I>
where
    S: ScheduleSource,
    I: SearchIndex,
{
    /// Runs one refresh cycle.
    ///
    /// 1. Fetch the full timetable (a failure aborts with nothing written).
    /// 2. Write the durable cache.
    /// 3. Persist channels, programs and slots.
    /// 4. Reconcile against the sitemap and persist the additions.
    /// 5. Swap in the new timetable.
    /// 6. Push every slot to the search index.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch, a persistence write or the index
    /// write fails. Cache and reconciliation failures are logged only.
    #[instrument(skip_all)]
    pub async fn refresh(&self) -> Result<SyncReport> {
        let mut timetable = self
            .source
            .fetch_timetable()
            .await
            .context("failed to fetch timetable")?;

        if let Some(path) = self.cache_path.as_deref()
            && let Err(e) = cache::save_timetable(path, &timetable)
        {
            tracing::warn!(error = format!("{e:#}"), "Failed to write timetable cache");
        }

        let mut programs = self
            .persist(
                &timetable.channels,
                &timetable.unique_programs(),
                &timetable.slots().collect::<Vec<_>>(),
            )
            .context("failed to persist timetable")?;

        let reconciliation = match self.reconcile_missing(&mut timetable).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = format!("{e:#}"), "Sitemap reconciliation skipped");
                Reconciliation::default()
            }
        };

        if !reconciliation.is_empty() {
            let added_programs = unique_programs(&reconciliation.slots);
            let added = self
                .persist(
                    &reconciliation.channels,
                    &added_programs,
                    &reconciliation.slots.iter().collect::<Vec<_>>(),
                )
                .context("failed to persist reconciled slots")?;
            programs.inserted = programs.inserted.saturating_add(added.inserted);
            programs.skipped = programs.skipped.saturating_add(added.skipped);
        }

        let documents: Vec<SearchDocument> =
            timetable.slots().map(SearchDocument::from_slot).collect();
        let mut report = SyncReport {
            channels: timetable.channels.len(),
            slots: documents.len(),
            programs,
            reconciled: reconciliation.slots.len(),
            indexed: BulkReport::default(),
        };

        self.install_timetable(timetable);

        report.indexed = self
            .index
            .bulk_index(&documents)
            .await
            .context("failed to index timetable")?;

        tracing::info!(
            channels = report.channels,
            slots = report.slots,
            programs_inserted = report.programs.inserted,
            programs_skipped = report.programs.skipped,
            reconciled = report.reconciled,
            indexed = report.indexed.indexed,
            "Timetable refreshed"
        );
        Ok(report)
    }

    /// Upserts channels, inserts programs best-effort and upserts slots.
    fn persist(
        &self,
        channels: &[Channel],
        programs: &[&Program],
        slots: &[&Slot],
    ) -> Result<BatchInsert> {
        let changed_channels = self.store.upsert_channels(channels)?;
        let inserted = self.store.insert_programs(programs)?;
        let changed_slots = self.store.upsert_slots(slots)?;

        tracing::debug!(
            changed_channels,
            programs_inserted = inserted.inserted,
            programs_skipped = inserted.skipped,
            changed_slots,
            "Persisted schedule entities"
        );
        Ok(inserted)
    }
}

/// Distinct programs across `slots`, first occurrence wins.
fn unique_programs(slots: &[Slot]) -> Vec<&Program> {
    let mut seen = HashSet::new();
    slots
        .iter()
        .flat_map(|s| s.programs.iter())
        .filter(|p| seen.insert(p.id.as_str()))
        .collect()
}
