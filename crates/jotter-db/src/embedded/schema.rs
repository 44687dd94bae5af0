//! # Embedded Schema Management
//!
//! Versions are recorded in `schema_version(version, applied_at)`, the same
//! table the relational migrations stamp, so either adapter can open a file
//! the other created.
//!
//! ## Upgrade Paths
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  detect_version()                                                       │
//! │     │                                                                   │
//! │     ├── no tables           → latest.sql, stamp 1..=3   (fresh install) │
//! │     ├── tables, no stamp    → infer from columns, stamp, then upgrade   │
//! │     ├── 1                   → rebuild notes (+text), backfill, stamp 2  │
//! │     ├── 2                   → revisions table, stamp 3                  │
//! │     ├── 3                   → nothing to do                             │
//! │     └── > 3                 → UnsupportedSchemaVersion                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::{info, warn};

use jotter_core::{now, Document};

use crate::error::{DbError, DbResult};

use super::LATEST_SCHEMA_VERSION;

const LATEST_SQL: &str = include_str!("schema/latest.sql");
const V2_NOTES_TEXT_SQL: &str = include_str!("schema/v2_notes_text.sql");
const V3_REVISIONS_SQL: &str = include_str!("schema/v3_revisions.sql");

const SCHEMA_VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY NOT NULL,
    applied_at  INTEGER NOT NULL
);";

/// Brings the connected database to [`LATEST_SCHEMA_VERSION`].
pub(crate) fn migrate(conn: &mut Connection) -> DbResult<()> {
    let current = match detect_version(conn)? {
        Some(version) => version,
        None => return install_latest(conn),
    };

    if current > LATEST_SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            found: current,
            supported: LATEST_SCHEMA_VERSION,
        });
    }

    if current < 2 {
        upgrade_to_v2(conn)?;
    }
    if current < 3 {
        upgrade_to_v3(conn)?;
    }

    Ok(())
}

/// Highest recorded version, or the version inferred from the table layout
/// of an unstamped file. `None` for an empty database.
pub(crate) fn detect_version(conn: &mut Connection) -> DbResult<Option<i64>> {
    if table_exists(conn, "schema_version")? {
        let recorded: Option<i64> =
            conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
        if recorded.is_some() {
            return Ok(recorded);
        }
    }

    if !table_exists(conn, "notes")? {
        return Ok(None);
    }

    let inferred = if !column_exists(conn, "notes", "text")? {
        1
    } else if table_exists(conn, "revisions")? {
        3
    } else {
        2
    };

    warn!(version = inferred, "Unstamped database, recording inferred schema version");

    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA_VERSION_TABLE)?;
    for version in 1..=inferred {
        stamp(&tx, version)?;
    }
    tx.commit()?;

    Ok(Some(inferred))
}

fn install_latest(conn: &mut Connection) -> DbResult<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(LATEST_SQL)?;
    for version in 1..=LATEST_SCHEMA_VERSION {
        stamp(&tx, version)?;
    }
    tx.commit()?;

    info!(version = LATEST_SCHEMA_VERSION, "Created embedded schema");
    Ok(())
}

/// Rebuilds `notes` with the `text` column and fills it from `content`.
///
/// Foreign keys are switched off around the rebuild (the pragma is a no-op
/// inside a transaction); dropping the old table would otherwise cascade into
/// the relations.
fn upgrade_to_v2(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
    let result = rebuild_notes(conn);
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    result?;

    info!(version = 2, "Migrated embedded schema");
    Ok(())
}

fn rebuild_notes(conn: &mut Connection) -> DbResult<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(V2_NOTES_TEXT_SQL)?;
    let filled = backfill_text(&tx)?;

    let violations: i64 =
        tx.query_row("SELECT COUNT(*) FROM pragma_foreign_key_check", [], |row| row.get(0))?;
    if violations > 0 {
        return Err(DbError::MigrationFailed(format!(
            "{violations} foreign key violations after rebuilding notes"
        )));
    }

    stamp(&tx, 2)?;
    tx.commit()?;

    info!(notes = filled, "Backfilled note text");
    Ok(())
}

fn backfill_text(tx: &Transaction<'_>) -> DbResult<usize> {
    let rows: Vec<(String, String)> = {
        let mut stmt = tx.prepare("SELECT id, content FROM notes")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;
        rows
    };

    let mut update = tx.prepare("UPDATE notes SET text = ?1 WHERE id = ?2")?;
    for (id, content) in &rows {
        let text = match Document::parse(content) {
            Ok(document) => document.plain_text(),
            Err(e) => {
                warn!(note_id = %id, error = %e, "Unreadable note content, text left empty");
                String::new()
            }
        };
        update.execute(params![text, id])?;
    }

    Ok(rows.len())
}

fn upgrade_to_v3(conn: &mut Connection) -> DbResult<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(V3_REVISIONS_SQL)?;
    stamp(&tx, 3)?;
    tx.commit()?;

    info!(version = 3, "Migrated embedded schema");
    Ok(())
}

fn stamp(tx: &Transaction<'_>, version: i64) -> DbResult<()> {
    tx.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (?1, ?2)",
        params![version, now().timestamp_millis()],
    )?;
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> DbResult<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2",
            params![table, column],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1_SQL: &str = "
        CREATE TABLE notes (
            id TEXT PRIMARY KEY NOT NULL,
            content TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE TABLE tags (
            id TEXT PRIMARY KEY NOT NULL,
            name TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE TABLE note_tag_relations (
            note_id TEXT NOT NULL REFERENCES notes(id) ON DELETE CASCADE,
            tag_id TEXT NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (note_id, tag_id)
        );
    ";

    fn versions(conn: &Connection) -> Vec<i64> {
        let mut stmt = conn
            .prepare("SELECT version FROM schema_version ORDER BY version")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_fresh_install_stamps_every_version() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        assert_eq!(versions(&conn), vec![1, 2, 3]);
        assert!(table_exists(&conn, "revisions").unwrap());
        assert!(column_exists(&conn, "notes", "text").unwrap());
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        assert_eq!(detect_version(&mut conn).unwrap(), Some(3));
    }

    #[test]
    fn test_unstamped_v1_file_is_detected_and_upgraded() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn.execute_batch(V1_SQL).unwrap();
        conn.execute(
            "INSERT INTO notes (id, content, created_at, updated_at) VALUES (?1, ?2, 1, 1)",
            params!["n1", Document::from_plain_text("Hello #world").to_json_string()],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO tags (id, name, created_at, updated_at) VALUES ('t1', 'world', 1, 1)",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO note_tag_relations (note_id, tag_id, created_at) VALUES ('n1', 't1', 1)",
            [],
        )
        .unwrap();

        migrate(&mut conn).unwrap();

        assert_eq!(versions(&conn), vec![1, 2, 3]);
        let text: String = conn
            .query_row("SELECT text FROM notes WHERE id = 'n1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(text, "Hello #world");

        let relations: i64 = conn
            .query_row("SELECT COUNT(*) FROM note_tag_relations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(relations, 1, "rebuild must not cascade into relations");

        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, 0)",
            params![LATEST_SCHEMA_VERSION + 1],
        )
        .unwrap();

        let err = migrate(&mut conn).unwrap_err();
        assert!(matches!(
            err,
            DbError::UnsupportedSchemaVersion { found, supported }
                if found == LATEST_SCHEMA_VERSION + 1 && supported == LATEST_SCHEMA_VERSION
        ));
    }
}
