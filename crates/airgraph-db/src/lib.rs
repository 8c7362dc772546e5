//! Persistence gateway for schedules and audience logs.
//!
//! Uses `rusqlite` (bundled `SQLite`) to store five collections:
//! channels, programs, slots, per-slot audience logs, and per-tick
//! aggregates. All writes are upserts or duplicate-tolerant inserts.

/// Per-tick aggregate operations.
pub mod all_logs;
/// Channel upsert and lookup.
pub mod channels;
mod connection;
/// Per-slot audience log operations.
pub mod logs;
mod migrations;
/// Program insert and lookup.
pub mod programs;
/// Slot upsert and lookup.
pub mod slots;
mod store;

#[allow(clippy::module_name_repetitions)]
pub use all_logs::{AllLog, ChannelVelocity};
#[allow(clippy::module_name_repetitions)]
pub use connection::{open_db, open_in_memory};
pub use logs::{SlotLog, Snapshot};
pub use programs::BatchInsert;
pub use store::Store;

/// Maximum number of IDs bound into one `IN (...)` lookup. Keeps every
/// query well under SQLite's bound-variable limit.
const LOOKUP_CHUNK: usize = 500;

/// Builds a `?, ?, ...` placeholder list for an `IN (...)` clause.
fn in_placeholders(len: usize) -> String {
    vec!["?"; len].join(", ")
}
