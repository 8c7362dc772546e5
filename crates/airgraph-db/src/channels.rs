//! Channel upsert and lookup.

use airgraph_api::schedule::{Channel, ChannelOrder};
use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::in_placeholders;

/// Upserts channels by ID. Returns the number of rows changed.
///
/// Existing rows are only rewritten when the name or display order differs.
///
/// # Errors
///
/// Returns an error if the database operation fails.
#[allow(clippy::module_name_repetitions)]
pub fn upsert_channels(conn: &Connection, channels: &[Channel]) -> Result<usize> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to begin transaction")?;

    let mut stmt = tx
        .prepare(
            "INSERT INTO channels (id, name, display_order) VALUES (?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                display_order = excluded.display_order
            WHERE channels.name IS NOT excluded.name
               OR channels.display_order IS NOT excluded.display_order",
        )
        .context("failed to prepare channels upsert")?;

    let mut changed: usize = 0;
    for ch in channels {
        let rows = stmt
            .execute(rusqlite::params![ch.id, ch.name, order_column(ch.order)])
            .with_context(|| format!("failed to upsert channel {}", ch.id))?;
        changed = changed.saturating_add(rows);
    }

    drop(stmt);
    tx.commit().context("failed to commit channels upsert")?;
    Ok(changed)
}

/// Loads channels by ID, ordered by display rank then ID.
///
/// Unknown IDs are ignored.
///
/// # Errors
///
/// Returns an error if the database query fails.
#[allow(clippy::module_name_repetitions)]
pub fn find_channels(conn: &Connection, ids: &[String]) -> Result<Vec<Channel>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT id, name, display_order FROM channels
         WHERE id IN ({})
         ORDER BY COALESCE(display_order, {}), id",
        in_placeholders(ids.len()),
        airgraph_api::schedule::SYNTHESIZED_ORDER
    );
    let mut stmt = conn
        .prepare(&sql)
        .context("failed to prepare channels query")?;

    let rows = stmt
        .query_map(rusqlite::params_from_iter(ids), |row| {
            let order: Option<u32> = row.get(2)?;
            Ok(Channel {
                id: row.get(0)?,
                name: row.get(1)?,
                order: order.map_or(ChannelOrder::Synthesized, ChannelOrder::Known),
            })
        })
        .context("failed to query channels")?;

    rows.collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to read channels rows")
}

/// Maps a display order to its nullable column value.
const fn order_column(order: ChannelOrder) -> Option<u32> {
    match order {
        ChannelOrder::Known(rank) => Some(rank),
        ChannelOrder::Synthesized => None,
    }
}
