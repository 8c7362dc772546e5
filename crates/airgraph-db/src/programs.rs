//! Program insert and lookup.

use std::collections::HashMap;

use airgraph_api::schedule::Program;
use anyhow::{Context, Result};
use rusqlite::{Connection, ErrorCode};

use crate::{LOOKUP_CHUNK, in_placeholders};

/// Outcome of a best-effort batch insert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchInsert {
    /// Rows written.
    pub inserted: usize,
    /// Rows rejected as duplicates.
    pub skipped: usize,
}

/// Inserts programs, tolerating duplicate IDs.
///
/// A duplicate-key failure skips that row and the batch continues; any
/// other failure aborts the batch.
///
/// # Errors
///
/// Returns an error if serialization or a non-constraint database operation
/// fails.
#[allow(clippy::module_name_repetitions)]
pub fn insert_programs(conn: &Connection, programs: &[&Program]) -> Result<BatchInsert> {
    let tx = conn
        .unchecked_transaction()
        .context("failed to begin transaction")?;

    let mut stmt = tx
        .prepare("INSERT INTO programs (id, body) VALUES (?1, ?2)")
        .context("failed to prepare programs insert")?;

    let mut report = BatchInsert::default();
    for program in programs {
        let body = serde_json::to_string(program)
            .with_context(|| format!("failed to serialize program {}", program.id))?;
        match stmt.execute(rusqlite::params![program.id, body]) {
            Ok(_) => report.inserted = report.inserted.saturating_add(1),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                tracing::trace!(program_id = %program.id, "duplicate program skipped");
                report.skipped = report.skipped.saturating_add(1);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to insert program {}", program.id));
            }
        }
    }

    drop(stmt);
    tx.commit().context("failed to commit programs insert")?;

    if report.skipped > 0 {
        tracing::debug!(
            inserted = report.inserted,
            skipped = report.skipped,
            "programs inserted with duplicates"
        );
    }
    Ok(report)
}

/// Loads programs by ID, keyed by ID. Unknown IDs are absent from the map.
///
/// # Errors
///
/// Returns an error if the database query or body decoding fails.
#[allow(clippy::module_name_repetitions)]
pub fn find_programs(conn: &Connection, ids: &[String]) -> Result<HashMap<String, Program>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let mut programs = HashMap::new();
    for chunk in ids.chunks(LOOKUP_CHUNK) {
        let sql = format!(
            "SELECT id, body FROM programs WHERE id IN ({})",
            in_placeholders(chunk.len())
        );
        let mut stmt = conn
            .prepare(&sql)
            .context("failed to prepare programs query")?;

        let rows = stmt
            .query_map(rusqlite::params_from_iter(chunk), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .context("failed to query programs")?;

        for row in rows {
            let (id, body) = row.context("failed to read programs row")?;
            let program: Program = serde_json::from_str(&body)
                .with_context(|| format!("failed to decode program {id}"))?;
            programs.insert(id, program);
        }
    }
    Ok(programs)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::connection::open_in_memory;

    fn program(id: &str) -> Program {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "series": {"id": "series-1"},
            "credit": {"casts": ["Cast A"]}
        }))
        .unwrap()
    }

    #[test]
    fn test_insert_and_find_programs() {
        // Arrange
        let conn = open_in_memory().unwrap();
        let p1 = program("p1");
        let p2 = program("p2");

        // Act
        let report = insert_programs(&conn, &[&p1, &p2]).unwrap();
        let found = find_programs(&conn, &[String::from("p2"), String::from("missing")]).unwrap();

        // Assert
        assert_eq!(report, BatchInsert { inserted: 2, skipped: 0 });
        assert_eq!(found.len(), 1);
        assert_eq!(found.get("p2"), Some(&p2));
    }

    #[test]
    fn test_insert_programs_skips_duplicates() {
        // Arrange
        let conn = open_in_memory().unwrap();
        let p1 = program("p1");
        let p2 = program("p2");
        insert_programs(&conn, &[&p1]).unwrap();

        // Act
        let report = insert_programs(&conn, &[&p1, &p2, &p1]).unwrap();

        // Assert
        assert_eq!(report, BatchInsert { inserted: 1, skipped: 2 });
        let found = find_programs(&conn, &[String::from("p1"), String::from("p2")]).unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_insert_programs_propagates_outage() {
        // Arrange
        let conn = open_in_memory().unwrap();
        conn.execute_batch("DROP TABLE programs").unwrap();
        let p1 = program("p1");

        // Act
        let result = insert_programs(&conn, &[&p1]);

        // Assert
        assert!(result.is_err());
    }

    #[test]
    fn test_find_programs_beyond_bind_limit() {
        // Arrange
        let conn = open_in_memory().unwrap();
        let p1 = program("p1");
        let p2 = program("p2");
        insert_programs(&conn, &[&p1, &p2]).unwrap();
        let mut wanted = vec![String::from("p1")];
        wanted.extend((0..40_000).map(|i| format!("x{i}")));
        wanted.push(String::from("p2"));

        // Act
        let found = find_programs(&conn, &wanted).unwrap();

        // Assert
        assert_eq!(found.len(), 2);
        assert_eq!(found.get("p2"), Some(&p2));
    }
}
