//! Per-tick audience aggregates.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// Per-minute velocities of one channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelVelocity {
    /// Comments per minute.
    pub comment: i64,
    /// Views per minute.
    pub view: i64,
}

/// Aggregate written for a sampling tick with at least one eligible channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::module_name_repetitions)]
pub struct AllLog {
    /// Tick time (epoch seconds).
    pub timestamp: i64,
    /// Local date of the tick (`YYYYMMDD`).
    pub date: String,
    /// Sum of comment velocities over eligible channels.
    pub total_comment_velocity: i64,
    /// Sum of view velocities over eligible channels.
    pub total_view_velocity: i64,
    /// Eligible channels.
    pub per_channel: BTreeMap<String, ChannelVelocity>,
}

/// Inserts an aggregate. Returns the assigned row ID.
///
/// # Errors
///
/// Returns an error if serialization or the database operation fails.
#[allow(clippy::module_name_repetitions)]
pub fn insert_all_log(conn: &Connection, all: &AllLog) -> Result<i64> {
    let per_channel =
        serde_json::to_string(&all.per_channel).context("failed to serialize per-channel map")?;
    conn.execute(
        "INSERT INTO all_logs (ts, date, total_comment_velocity, total_view_velocity, per_channel)
        VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            all.timestamp,
            all.date,
            all.total_comment_velocity,
            all.total_view_velocity,
            per_channel,
        ],
    )
    .with_context(|| format!("failed to insert aggregate for tick {}", all.timestamp))?;
    Ok(conn.last_insert_rowid())
}

/// Loads aggregates with `timestamp >= since`, oldest first.
///
/// # Errors
///
/// Returns an error if the database query or decoding fails.
#[allow(clippy::module_name_repetitions)]
pub fn load_all_logs(conn: &Connection, since: i64) -> Result<Vec<AllLog>> {
    let mut stmt = conn
        .prepare(
            "SELECT ts, date, total_comment_velocity, total_view_velocity, per_channel
             FROM all_logs
             WHERE ts >= ?1
             ORDER BY ts, id",
        )
        .context("failed to prepare all_logs query")?;

    let rows = stmt
        .query_map([since], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })
        .context("failed to query all_logs")?;

    let mut result = Vec::new();
    for row in rows {
        let (timestamp, date, total_comment_velocity, total_view_velocity, per_channel) =
            row.context("failed to read all_logs row")?;
        let per_channel = serde_json::from_str(&per_channel)
            .with_context(|| format!("failed to decode aggregate for tick {timestamp}"))?;
        result.push(AllLog {
            timestamp,
            date,
            total_comment_velocity,
            total_view_velocity,
            per_channel,
        });
    }
    Ok(result)
}
