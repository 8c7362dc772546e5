//! Cancellable schedule-sync and audience-sampling loops.
//!
//! The sync loop refreshes the timetable on a fixed interval. The sampling
//! loop is phase-locked to the wall clock: it wakes just before each minute
//! boundary, samples, waits a fixed offset, and samples again. Both loops
//! observe one `CancellationToken` at their sleep points only.

use std::sync::Arc;
use std::time::Duration;

use airgraph_api::schedule::ScheduleSource;
use airgraph_api::search::SearchIndex;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::collector::Collector;

/// How far ahead of the minute boundary the first sample of a minute is taken.
const SAMPLE_LEAD: Duration = Duration::from_millis(250);

/// Gap between the two samples of a minute.
const SAMPLE_OFFSET: Duration = Duration::from_secs(30);

/// Milliseconds per minute.
const MINUTE_MS: i64 = 60_000;

/// Handles of the running loops.
#[derive(Debug)]
struct Running {
    token: CancellationToken,
    sync: JoinHandle<()>,
    sample: JoinHandle<()>,
}

/// Drives a collector's refresh and sampling loops.
#[derive(Debug)]
pub struct Scheduler<S, I> {
    collector: Arc<Collector<S, I>>,
    sync_interval: Duration,
    running: Mutex<Option<Running>>,
}

impl<S, I> Scheduler<S, I>
where
    S: ScheduleSource + Sync + 'static,
    I: SearchIndex + Sync + 'static,
{
    /// Creates an idle scheduler.
    #[must_use]
    pub fn new(collector: Arc<Collector<S, I>>, sync_interval: Duration) -> Self {
        Self {
            collector,
            sync_interval,
            running: Mutex::new(None),
        }
    }

    /// Returns `true` while the loops are running.
    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Spawns both loops. Does nothing if they are already running.
    pub async fn start(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            tracing::debug!("Scheduler already running");
            return;
        }

        let token = CancellationToken::new();
        let sync = tokio::spawn(run_sync_loop(
            Arc::clone(&self.collector),
            self.sync_interval,
            token.clone(),
        ));
        let sample = tokio::spawn(run_sample_loop(
            Arc::clone(&self.collector),
            token.clone(),
            wall_clock_ms,
        ));

        tracing::info!(
            sync_interval_secs = self.sync_interval.as_secs(),
            "Scheduler started"
        );
        *running = Some(Running {
            token,
            sync,
            sample,
        });
    }

    /// Cancels both loops and waits for them to exit. Does nothing if the
    /// scheduler is idle.
    ///
    /// The state lock is held until both loops have exited, so a concurrent
    /// `start` only spawns new loops after the old ones are gone.
    pub async fn stop(&self) {
        let mut state = self.running.lock().await;
        let Some(running) = state.take() else {
            tracing::debug!("Scheduler not running");
            return;
        };

        running.token.cancel();
        for (name, handle) in [("sync", running.sync), ("sample", running.sample)] {
            if let Err(e) = handle.await {
                tracing::error!(loop_name = name, error = %e, "Scheduler loop panicked");
            }
        }
        drop(state);
        tracing::info!("Scheduler stopped");
    }
}

/// Sleeps for `duration` unless cancelled first. Returns `false` on
/// cancellation.
async fn sleep_or_cancel(duration: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        () = token.cancelled() => false,
        () = tokio::time::sleep(duration) => true,
    }
}

/// Refreshes, then sleeps `interval`, until cancelled.
async fn run_sync_loop<S, I>(
    collector: Arc<Collector<S, I>>,
    interval: Duration,
    token: CancellationToken,
) where
    S: ScheduleSource,
    I: SearchIndex,
{
    loop {
        if let Err(e) = collector.refresh().await {
            tracing::error!(error = format!("{e:#}"), "Timetable refresh failed");
        }
        if !sleep_or_cancel(interval, &token).await {
            break;
        }
    }
    tracing::debug!("Sync loop exited");
}

/// Current wall-clock time in epoch milliseconds.
fn wall_clock_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Samples twice a minute, aligned to `clock`, until cancelled.
async fn run_sample_loop<S, I>(
    collector: Arc<Collector<S, I>>,
    token: CancellationToken,
    clock: fn() -> i64,
) where
    S: ScheduleSource,
    I: SearchIndex,
{
    loop {
        let delay = delay_until_next_sample(clock(), SAMPLE_LEAD);
        if !sleep_or_cancel(delay, &token).await {
            break;
        }
        sample_logged(&collector).await;

        if !sleep_or_cancel(SAMPLE_OFFSET, &token).await {
            break;
        }
        sample_logged(&collector).await;
    }
    tracing::debug!("Sample loop exited");
}

/// Runs one sampling tick, logging failures.
async fn sample_logged<S, I>(collector: &Collector<S, I>)
where
    S: ScheduleSource,
    I: SearchIndex,
{
    if let Err(e) = collector.sample_tick().await {
        tracing::error!(error = format!("{e:#}"), "Audience sampling failed");
    }
}

/// Time from `now_ms` (epoch milliseconds) until `lead` before the next
/// minute boundary. If that instant has already passed, the following
/// minute is used.
fn delay_until_next_sample(now_ms: i64, lead: Duration) -> Duration {
    let lead_ms = i64::try_from(lead.as_millis()).unwrap_or(0);
    let into_minute = now_ms.checked_rem_euclid(MINUTE_MS).unwrap_or(0);
    let mut delay = MINUTE_MS.saturating_sub(into_minute).saturating_sub(lead_ms);
    if delay <= 0 {
        delay = delay.saturating_add(MINUTE_MS);
    }
    Duration::from_millis(u64::try_from(delay).unwrap_or(0))
}
