//! Opening files written by older embedded schemas, and sharing files with
//! the relational adapter.

mod common;

use std::path::Path;

use rusqlite::{params, Connection};

use jotter_core::{Document, NoteId, NoteSearch, Pagination, StorageErrorKind, StoreError, TagId};
use jotter_db::embedded::{self, LATEST_SCHEMA_VERSION};
use jotter_db::{ConnectionRegistry, Database, DbConfig};

/// Writes a version 1 database: notes without the text column, no stamp.
fn write_v1_file(path: &Path, note_id: NoteId, tag_id: TagId) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "PRAGMA foreign_keys = ON;
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
         );",
    )
    .unwrap();
    conn.execute(
        "INSERT INTO notes (id, content, created_at, updated_at) VALUES (?1, ?2, 1000, 2000)",
        params![
            note_id.to_string(),
            Document::from_plain_text("Old Apple notes #legacy").to_json_string()
        ],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO tags (id, name, created_at, updated_at) VALUES (?1, 'legacy', 1000, 1000)",
        params![tag_id.to_string()],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO note_tag_relations (note_id, tag_id, created_at) VALUES (?1, ?2, 1000)",
        params![note_id.to_string(), tag_id.to_string()],
    )
    .unwrap();
}

fn stamped_versions(path: &Path) -> Vec<i64> {
    let conn = Connection::open(path).unwrap();
    let mut stmt = conn
        .prepare("SELECT version FROM schema_version ORDER BY version")
        .unwrap();
    stmt.query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap()
}

#[tokio::test]
async fn test_v1_file_is_upgraded_on_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.db");
    let (note_id, tag_id) = (NoteId::new(), TagId::new());
    write_v1_file(&path, note_id, tag_id);

    let registry = ConnectionRegistry::new();
    let conn = registry.open(&path).await.unwrap();
    let repos = conn.repositories();

    let note = repos.notes.find_by_id(note_id).await.unwrap().unwrap();
    assert_eq!(note.text(), "Old Apple notes #legacy");
    assert_eq!(note.tag_ids().iter().copied().collect::<Vec<_>>(), vec![tag_id]);
    assert_eq!(note.updated_at().timestamp_millis(), 2000);

    let page = repos
        .note_queries
        .combined_search(
            &NoteSearch::new(Pagination::first(10))
                .query("apple")
                .tags([tag_id]),
        )
        .await
        .unwrap();
    assert_eq!(page.count, 1);

    let usage = repos.tag_queries.find_with_usage().await.unwrap();
    assert_eq!(usage[0].usage_count, 1);

    registry.close().await;
    assert_eq!(
        stamped_versions(&path),
        (1..=LATEST_SCHEMA_VERSION).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_file_from_a_newer_release_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.db");

    {
        let registry = ConnectionRegistry::new();
        registry.open(&path).await.unwrap();
        registry.close().await;
    }
    Connection::open(&path)
        .unwrap()
        .execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, 0)",
            params![LATEST_SCHEMA_VERSION + 1],
        )
        .unwrap();

    let err: StoreError = ConnectionRegistry::new().open(&path).await.unwrap_err().into();
    assert_eq!(err.storage_kind(), Some(StorageErrorKind::Migration));
}

#[tokio::test]
async fn test_relational_and_embedded_read_the_same_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shared.db");

    let written = {
        let db = Database::new(DbConfig::new(&path)).await.unwrap();
        let repos = db.repositories();
        let a = common::tag(&repos, "shared").await;
        let note = common::note(&repos, "written by sqlx #shared", &[&a], 5, 6).await;
        db.close().await;
        note
    };

    let registry = ConnectionRegistry::new();
    let conn = registry.open(&path).await.unwrap();
    let provider = embedded::provider(&conn);

    let found = provider
        .repositories()
        .notes
        .find_by_id(written.id())
        .await
        .unwrap();
    assert_eq!(found, Some(written));
}
