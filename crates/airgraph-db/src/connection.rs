//! SQLite connection setup: file location, pragmas and migrations.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;

use super::migrations::run_migrations;

/// Database file name.
const DB_FILE_NAME: &str = "airgraph.db";

/// How long a writer waits on a lock held by another connection (e.g. an
/// external query process) before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens (or creates) the on-disk database, switches it to WAL and runs
/// migrations.
///
/// - If `dir` is `Some`, uses `{dir}/airgraph.db`.
/// - Otherwise uses `~/.local/share/airgraph/airgraph.db`.
///
/// # Errors
///
/// Returns an error if the database cannot be opened, configured or migrated.
pub fn open_db(dir: Option<&PathBuf>) -> Result<Connection> {
    let db_path = resolve_db_path(dir)?;
    open_file(&db_path)
}

/// Opens a migrated in-memory database.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrations fail.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    run_migrations(&conn).context("database migration failed")?;
    Ok(conn)
}

fn open_file(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .context("failed to set busy timeout")?;
    let mode: String = conn
        .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
        .context("failed to enable WAL journal")?;
    tracing::debug!(path = %db_path.display(), journal_mode = %mode, "Opened database");

    run_migrations(&conn).context("database migration failed")?;
    Ok(conn)
}

/// Resolves the database file path.
fn resolve_db_path(dir: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(d) = dir {
        return Ok(d.join(DB_FILE_NAME));
    }

    let home = std::env::var("HOME").context("HOME environment variable is not set")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("airgraph")
        .join(DB_FILE_NAME))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_open_db_creates_nested_dir_in_wal_mode() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");

        // Act
        let conn = open_db(Some(&data_dir)).unwrap();

        // Assert
        assert!(data_dir.join(DB_FILE_NAME).exists());
        let mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");
        let version: u32 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert!(version > 0);
    }

    #[test]
    fn test_open_in_memory_is_migrated() {
        // Arrange & Act
        let conn = open_in_memory().unwrap();

        // Assert
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'all_logs'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 1);
    }

    #[test]
    fn test_resolve_db_path_with_dir() {
        // Arrange
        let dir = PathBuf::from("/srv/airgraph");

        // Act
        let path = resolve_db_path(Some(&dir)).unwrap();

        // Assert
        assert_eq!(path, PathBuf::from("/srv/airgraph/airgraph.db"));
    }

    #[test]
    fn test_resolve_db_path_default() {
        // Arrange & Act
        let path = resolve_db_path(None).unwrap();

        // Assert
        assert!(path.ends_with(".local/share/airgraph/airgraph.db"));
    }
}
