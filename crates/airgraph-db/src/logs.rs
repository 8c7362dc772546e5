//! Per-slot audience logs.

use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{LOOKUP_CHUNK, in_placeholders};

/// Audience counters recorded at one sampling instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Cumulative comment count.
    pub comment_count: u64,
    /// Cumulative view count.
    pub view_count: u64,
}

/// Time series of snapshots for one slot, keyed by epoch seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotLog(BTreeMap<i64, Snapshot>);

impl SlotLog {
    /// Records a snapshot; an existing entry at `ts` is replaced.
    pub fn insert(&mut self, ts: i64, snapshot: Snapshot) {
        self.0.insert(ts, snapshot);
    }

    /// Returns the most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<(i64, Snapshot)> {
        self.0.last_key_value().map(|(&ts, &snap)| (ts, snap))
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in timestamp order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, Snapshot)> + '_ {
        self.0.iter().map(|(&ts, &snap)| (ts, snap))
    }
}

/// Appends a snapshot to a slot's log. A second write at the same `ts`
/// replaces the first.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub fn append_log(conn: &Connection, slot_id: &str, ts: i64, snapshot: Snapshot) -> Result<()> {
    conn.execute(
        "INSERT INTO logs (slot_id, ts, comment_count, view_count) VALUES (?1, ?2, ?3, ?4)
        ON CONFLICT(slot_id, ts) DO UPDATE SET
            comment_count = excluded.comment_count,
            view_count = excluded.view_count",
        rusqlite::params![slot_id, ts, snapshot.comment_count, snapshot.view_count],
    )
    .with_context(|| format!("failed to append log for slot {slot_id}"))?;
    Ok(())
}

/// Loads the logs of the given slots. Slots without entries are absent.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn find_logs(conn: &Connection, slot_ids: &[String]) -> Result<HashMap<String, SlotLog>> {
    if slot_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut logs: HashMap<String, SlotLog> = HashMap::new();
    for chunk in slot_ids.chunks(LOOKUP_CHUNK) {
        let sql = format!(
            "SELECT slot_id, ts, comment_count, view_count FROM logs
             WHERE slot_id IN ({})
             ORDER BY slot_id, ts",
            in_placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql).context("failed to prepare logs query")?;

        let rows = stmt
            .query_map(rusqlite::params_from_iter(chunk), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    Snapshot {
                        comment_count: row.get(2)?,
                        view_count: row.get(3)?,
                    },
                ))
            })
            .context("failed to query logs")?;

        for row in rows {
            let (slot_id, ts, snapshot) = row.context("failed to read logs row")?;
            logs.entry(slot_id).or_default().insert(ts, snapshot);
        }
    }
    Ok(logs)
}
