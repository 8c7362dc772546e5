//! Broadcast schedule collector.
//!
//! Keeps the persistent store and the search index in step with the
//! upstream schedule, backfills slots the feed omits, and samples live
//! audience counters of airing slots into per-minute velocities.

/// Audience sampling and velocity derivation.
pub mod audience;
mod cache;
/// Collector, builder and read-only query surface.
pub mod collector;
/// Sitemap-driven backfill of missing slots.
pub mod reconcile;
/// Cancellable sync and sampling loops.
pub mod scheduler;
/// Full schedule refresh cycle.
pub mod sync;

#[cfg(test)]
mod testing;

pub use audience::TickReport;
#[allow(clippy::module_name_repetitions)]
pub use collector::{Collector, CollectorBuilder};
pub use reconcile::Reconciliation;
pub use scheduler::Scheduler;
pub use sync::SyncReport;
