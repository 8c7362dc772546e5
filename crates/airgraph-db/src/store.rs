//! Thread-safe persistence facade shared by the collector loops.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use airgraph_api::schedule::{Channel, Program, Slot};
use anyhow::{Result, anyhow};
use rusqlite::Connection;

use crate::all_logs::{self, AllLog};
use crate::logs::{self, SlotLog, Snapshot};
use crate::programs::{self, BatchInsert};
use crate::{channels, connection, slots};

/// Single-connection store.
///
/// The connection lock is only held for the duration of one operation and
/// never across an `.await`.
#[derive(Debug)]
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Opens the on-disk store (see [`connection::open_db`]).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(dir: Option<&PathBuf>) -> Result<Self> {
        Ok(Self::from_connection(connection::open_db(dir)?))
    }

    /// Opens a migrated in-memory store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(connection::open_in_memory()?))
    }

    /// Wraps an already-migrated connection.
    #[must_use]
    pub const fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Runs `f` with exclusive access to the connection.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("database connection lock poisoned"))?;
        f(&conn)
    }

    /// Upserts channels by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn upsert_channels(&self, channels: &[Channel]) -> Result<usize> {
        self.with_conn(|conn| channels::upsert_channels(conn, channels))
    }

    /// Inserts programs, skipping duplicates.
    ///
    /// # Errors
    ///
    /// Returns an error on any failure other than a duplicate key.
    pub fn insert_programs(&self, programs: &[&Program]) -> Result<BatchInsert> {
        self.with_conn(|conn| programs::insert_programs(conn, programs))
    }

    /// Upserts slots by ID, storing program references by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn upsert_slots(&self, slots: &[&Slot]) -> Result<usize> {
        self.with_conn(|conn| slots::upsert_slots(conn, slots))
    }

    /// Appends a snapshot to a slot's log.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn append_log(&self, slot_id: &str, ts: i64, snapshot: Snapshot) -> Result<()> {
        self.with_conn(|conn| logs::append_log(conn, slot_id, ts, snapshot))
    }

    /// Inserts a per-tick aggregate.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert_all_log(&self, all: &AllLog) -> Result<i64> {
        self.with_conn(|conn| all_logs::insert_all_log(conn, all))
    }

    /// Finds channels by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn find_channels(&self, ids: &[String]) -> Result<Vec<Channel>> {
        self.with_conn(|conn| channels::find_channels(conn, ids))
    }

    /// Finds logs by slot ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn find_logs(&self, slot_ids: &[String]) -> Result<HashMap<String, SlotLog>> {
        self.with_conn(|conn| logs::find_logs(conn, slot_ids))
    }

    /// Finds slots by ID with programs resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn find_slots(&self, ids: &[String]) -> Result<Vec<Slot>> {
        self.with_conn(|conn| slots::find_slots(conn, ids))
    }

    /// Loads aggregates since `since` (epoch seconds).
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn load_all_logs(&self, since: i64) -> Result<Vec<AllLog>> {
        self.with_conn(|conn| all_logs::load_all_logs(conn, since))
    }

    /// Runs raw SQL against the store.
    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.with_conn(|conn| Ok(conn.execute_batch(sql)?))
    }
}
