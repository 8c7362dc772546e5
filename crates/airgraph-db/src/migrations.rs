//! Schema version management using `PRAGMA user_version`.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Current schema version.
const CURRENT_VERSION: u32 = 2;

/// Runs database migrations up to `CURRENT_VERSION`.
///
/// # Errors
///
/// Returns an error if any SQL statement fails.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let version: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version")?;

    if version < 1 {
        migrate_v1(conn).context("migration to v1 failed")?;
    }
    if version < 2 {
        migrate_v2(conn).context("migration to v2 failed")?;
    }

    conn.pragma_update(None, "user_version", CURRENT_VERSION)
        .context("failed to update user_version")?;

    Ok(())
}

/// Migration to v1: create `channels`, `programs` and `slots` tables.
///
/// Slots keep their program references as a JSON array of IDs; the slot
/// body is stored without inline programs.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS channels (
            id             TEXT PRIMARY KEY,
            name           TEXT NOT NULL,
            display_order  INTEGER
        );

        CREATE TABLE IF NOT EXISTS programs (
            id    TEXT PRIMARY KEY,
            body  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS slots (
            id           TEXT PRIMARY KEY,
            channel_id   TEXT NOT NULL,
            start_at     INTEGER NOT NULL,
            end_at       INTEGER NOT NULL,
            program_ids  TEXT NOT NULL,
            body         TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_slots_channel_id ON slots(channel_id);
        CREATE INDEX IF NOT EXISTS idx_slots_start_at ON slots(start_at);",
    )
    .context("failed to create schedule tables")?;

    Ok(())
}

/// Migration to v2: create `logs` and `all_logs` tables.
fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS logs (
            slot_id        TEXT NOT NULL,
            ts             INTEGER NOT NULL,
            comment_count  INTEGER NOT NULL,
            view_count     INTEGER NOT NULL,
            PRIMARY KEY (slot_id, ts)
        );

        CREATE TABLE IF NOT EXISTS all_logs (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            ts                      INTEGER NOT NULL,
            date                    TEXT NOT NULL,
            total_comment_velocity  INTEGER NOT NULL,
            total_view_velocity     INTEGER NOT NULL,
            per_channel             TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_all_logs_ts ON all_logs(ts);",
    )
    .context("failed to create audience tables")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_migrations_idempotent() {
        // Arrange
        let conn = Connection::open_in_memory().unwrap();

        // Act
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        // Assert
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_tables_exist_after_migration() {
        // Arrange
        let conn = Connection::open_in_memory().unwrap();

        // Act
        run_migrations(&conn).unwrap();

        // Assert
        let tables = table_names(&conn);
        for expected in ["channels", "programs", "slots", "logs", "all_logs"] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_v1_to_v2_migration() {
        // Arrange: start from v1
        let conn = Connection::open_in_memory().unwrap();
        migrate_v1(&conn).unwrap();
        conn.pragma_update(None, "user_version", 1u32).unwrap();

        // Act
        run_migrations(&conn).unwrap();

        // Assert
        let tables = table_names(&conn);
        assert!(tables.iter().any(|t| t == "logs"));
        assert!(tables.iter().any(|t| t == "all_logs"));
    }
}
