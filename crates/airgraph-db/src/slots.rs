//! Slot upsert and lookup.
//!
//! Slots are stored without inline programs; the program IDs are kept in
//! a separate JSON column and resolved against the `programs` table on read.

use std::collections::{BTreeSet, HashSet};

use airgraph_api::schedule::Slot;
use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::{LOOKUP_CHUNK, in_placeholders};
use crate::programs::find_programs;

/// Upserts slots by ID. Returns the number of rows changed.
///
/// # Errors
///
/// Returns an error if serialization or the database operation fails.
#[allow(clippy::module_name_repetitions)]
pub fn upsert_slots(conn: &Connection, slots: &[&Slot]) -> Result<usize> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to begin transaction")?;

    let mut stmt = tx
        .prepare(
            "INSERT INTO slots (id, channel_id, start_at, end_at, program_ids, body)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                channel_id = excluded.channel_id,
                start_at = excluded.start_at,
                end_at = excluded.end_at,
                program_ids = excluded.program_ids,
                body = excluded.body
            WHERE slots.body IS NOT excluded.body
               OR slots.program_ids IS NOT excluded.program_ids",
        )
        .context("failed to prepare slots upsert")?;

    let mut changed: usize = 0;
    for slot in slots {
        let program_ids = serde_json::to_string(&slot.program_ids())
            .with_context(|| format!("failed to serialize program IDs of slot {}", slot.id))?;
        let body = serde_json::to_string(&Slot {
            programs: Vec::new(),
            ..(*slot).clone()
        })
        .with_context(|| format!("failed to serialize slot {}", slot.id))?;

        let rows = stmt
            .execute(rusqlite::params![
                slot.id,
                slot.channel_id,
                slot.start_at,
                slot.end_at,
                program_ids,
                body,
            ])
            .with_context(|| format!("failed to upsert slot {}", slot.id))?;
        changed = changed.saturating_add(rows);
    }

    drop(stmt);
    tx.commit().context("failed to commit slots upsert")?;
    Ok(changed)
}

/// Loads slots by ID with their programs resolved, ordered by start time.
///
/// Program IDs that cannot be resolved are dropped from the slot.
///
/// # Errors
///
/// Returns an error if the database query or body decoding fails.
#[allow(clippy::module_name_repetitions)]
pub fn find_slots(conn: &Connection, ids: &[String]) -> Result<Vec<Slot>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut stored: Vec<(i64, Slot, Vec<String>)> = Vec::new();
    for chunk in ids.chunks(LOOKUP_CHUNK) {
        let sql = format!(
            "SELECT id, start_at, program_ids, body FROM slots WHERE id IN ({})",
            in_placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql).context("failed to prepare slots query")?;

        let rows = stmt
            .query_map(rusqlite::params_from_iter(chunk), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .context("failed to query slots")?;

        for row in rows {
            let (id, start_at, program_ids, body) = row.context("failed to read slots row")?;
            let slot: Slot = serde_json::from_str(&body)
                .with_context(|| format!("failed to decode slot {id}"))?;
            let program_ids: Vec<String> = serde_json::from_str(&program_ids)
                .with_context(|| format!("failed to decode program IDs of slot {id}"))?;
            stored.push((start_at, slot, program_ids));
        }
    }
    // Repeated IDs in `ids` land in different chunks; keep the first row.
    let mut seen: HashSet<String> = HashSet::new();
    stored.retain(|(_, slot, _)| seen.insert(slot.id.clone()));
    let wanted: Vec<String> = stored
        .iter()
        .flat_map(|(_, _, pids)| pids.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let programs = find_programs(conn, &wanted)?;

    stored.sort_by(|(a_start, a, _), (b_start, b, _)| {
        a_start.cmp(b_start).then_with(|| a.id.cmp(&b.id))
    });

    Ok(stored
        .into_iter()
        .map(|(_, mut slot, program_ids)| {
            slot.programs = program_ids
                .iter()
                .filter_map(|pid| {
                    let program = programs.get(pid).cloned();
                    if program.is_none() {
                        tracing::debug!(slot_id = %slot.id, program_id = %pid, "dropping unresolved program");
                    }
                    program
                })
                .collect();
            slot
        })
        .collect())
}
