//! Audience sampling of airing slots and per-minute velocity derivation.

use airgraph_api::schedule::{ScheduleSource, Slot};
use airgraph_api::search::SearchIndex;
use airgraph_db::{AllLog, ChannelVelocity, Snapshot};
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use tracing::instrument;

use crate::collector::Collector;

/// Minimum number of logged snapshots before a slot contributes velocities.
const MIN_PRIOR_SAMPLES: usize = 2;

/// Summary of one sampling tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Slots airing at the tick.
    pub airing: usize,
    /// Samples logged.
    pub sampled: usize,
    /// Aggregate written for this tick, if any channel was eligible.
    pub aggregate: Option<AllLog>,
}

/// Derives per-minute velocities between two snapshots.
///
/// Each component is `floor((current - last) * 60 / elapsed)`. Returns
/// `None` if `now` is not after `last_ts` or the arithmetic overflows.
#[must_use]
pub fn velocity(last_ts: i64, last: Snapshot, now: i64, current: Snapshot) -> Option<ChannelVelocity> {
    let elapsed = now.checked_sub(last_ts)?;
    if elapsed <= 0 {
        return None;
    }
    Some(ChannelVelocity {
        comment: per_minute(last.comment_count, current.comment_count, elapsed)?,
        view: per_minute(last.view_count, current.view_count, elapsed)?,
    })
}

/// Rate of change of a counter per minute, floored.
fn per_minute(last: u64, current: u64, elapsed: i64) -> Option<i64> {
    let delta = i64::try_from(current)
        .ok()?
        .checked_sub(i64::try_from(last).ok()?)?;
    delta.checked_mul(60)?.checked_div_euclid(elapsed)
}

impl<S, I> Collector<S, I>
where
    S: ScheduleSource,
    I: SearchIndex,
{
    /// Samples every slot airing now.
    ///
    /// # Errors
    ///
    /// See [`Collector::sample_tick_at`].
    pub async fn sample_tick(&self) -> Result<TickReport> {
        self.sample_tick_at(Local::now()).await
    }

    /// Samples every slot airing at `now`.
    ///
    /// Each sample is appended to its slot's log. Slots that already had at
    /// least two logged snapshots contribute to the tick aggregate when
    /// both velocities are strictly positive; velocities of several slots
    /// on one channel are summed. The aggregate is stored only if some
    /// channel qualified, after every log write of the tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the audience fetch or a store operation fails.
    #[instrument(skip_all, fields(ts = now.timestamp()))]
    pub async fn sample_tick_at(&self, now: DateTime<Local>) -> Result<TickReport> {
        let ts = now.timestamp();
        let airing: Vec<String> = self
            .timetable()
            .map(|t| t.current_slots(ts).into_iter().map(|s: &Slot| s.id.clone()).collect())
            .unwrap_or_default();

        if airing.is_empty() {
            tracing::debug!("No slots airing");
            return Ok(TickReport::default());
        }

        let samples = self
            .source
            .fetch_audience(&airing)
            .await
            .context("failed to fetch audience")?;

        let sampled_ids: Vec<String> = samples.iter().map(|s| s.slot_id.clone()).collect();
        let past = self.store.find_logs(&sampled_ids)?;

        let mut aggregate = AllLog {
            timestamp: ts,
            date: now.format("%Y%m%d").to_string(),
            ..AllLog::default()
        };

        for sample in &samples {
            let current = Snapshot {
                comment_count: sample.comments(),
                view_count: sample.views(),
            };

            if let Some(log) = past.get(&sample.slot_id)
                && log.len() >= MIN_PRIOR_SAMPLES
                && let Some((last_ts, last)) = log.last()
                && let Some(v) = velocity(last_ts, last, ts, current)
                && v.comment > 0
                && v.view > 0
            {
                let entry = aggregate
                    .per_channel
                    .entry(sample.channel_id.clone())
                    .or_default();
                entry.comment = entry.comment.saturating_add(v.comment);
                entry.view = entry.view.saturating_add(v.view);
                aggregate.total_comment_velocity =
                    aggregate.total_comment_velocity.saturating_add(v.comment);
                aggregate.total_view_velocity = aggregate.total_view_velocity.saturating_add(v.view);
            }

            self.store.append_log(&sample.slot_id, ts, current)?;
        }

        let aggregate = if aggregate.per_channel.is_empty() {
            None
        } else {
            self.store.insert_all_log(&aggregate)?;
            Some(aggregate)
        };

        tracing::debug!(
            airing = airing.len(),
            sampled = samples.len(),
            eligible_channels = aggregate.as_ref().map_or(0, |a| a.per_channel.len()),
            "Audience sampled"
        );
        Ok(TickReport {
            airing: airing.len(),
            sampled: samples.len(),
            aggregate,
        })
    }
}
