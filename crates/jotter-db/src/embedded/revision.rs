//! Revision repository over the embedded engine.

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use jotter_core::{NoteId, Revision, RevisionId, RevisionRepository, StoreResult};

use crate::error::DbResult;
use crate::rows::{sql_int, RevisionRow, REVISION_COLUMNS};

use super::connection::EngineConnection;

#[derive(Clone)]
pub struct EngineRevisionRepository {
    conn: EngineConnection,
}

impl EngineRevisionRepository {
    pub fn new(conn: EngineConnection) -> Self {
        EngineRevisionRepository { conn }
    }
}

fn insert(conn: &Connection, revision: &Revision) -> DbResult<()> {
    conn.execute(
        "INSERT INTO revisions (id, note_id, content, saved_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO NOTHING",
        params![
            revision.id.to_string(),
            revision.note_id.to_string(),
            revision.content.to_json_string(),
            revision.saved_at.timestamp_millis(),
        ],
    )?;
    Ok(())
}

fn find_one(conn: &Connection, id: RevisionId) -> DbResult<Option<Revision>> {
    let row = conn
        .query_row(
            &format!("SELECT {REVISION_COLUMNS} FROM revisions WHERE id = ?1"),
            params![id.to_string()],
            RevisionRow::from_engine_row,
        )
        .optional()?;
    row.map(RevisionRow::into_revision).transpose()
}

fn for_note(conn: &Connection, note_id: NoteId) -> DbResult<Vec<Revision>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVISION_COLUMNS} FROM revisions WHERE note_id = ?1 \
         ORDER BY saved_at DESC, id DESC"
    ))?;
    let rows: Vec<RevisionRow> = stmt
        .query_map(params![note_id.to_string()], RevisionRow::from_engine_row)?
        .collect::<Result<_, _>>()?;
    rows.into_iter().map(RevisionRow::into_revision).collect()
}

fn prune_note(conn: &Connection, note_id: NoteId, keep: usize) -> DbResult<u64> {
    let deleted = conn.execute(
        "DELETE FROM revisions
         WHERE note_id = ?1
           AND id NOT IN (
               SELECT id FROM revisions
               WHERE note_id = ?1
               ORDER BY saved_at DESC, id DESC
               LIMIT ?2
           )",
        params![note_id.to_string(), sql_int(keep as u64)],
    )?;
    Ok(deleted as u64)
}

#[async_trait]
impl RevisionRepository for EngineRevisionRepository {
    async fn save(&self, revision: &Revision) -> StoreResult<()> {
        let revision = revision.clone();
        Ok(self.conn.call(move |conn| insert(conn, &revision)).await?)
    }

    async fn find_by_id(&self, id: RevisionId) -> StoreResult<Option<Revision>> {
        Ok(self.conn.call(move |conn| find_one(conn, id)).await?)
    }

    async fn find_by_note(&self, note_id: NoteId) -> StoreResult<Vec<Revision>> {
        Ok(self.conn.call(move |conn| for_note(conn, note_id)).await?)
    }

    async fn prune(&self, note_id: NoteId, keep: usize) -> StoreResult<u64> {
        let pruned = self
            .conn
            .call(move |conn| prune_note(conn, note_id, keep))
            .await?;
        if pruned > 0 {
            debug!(note_id = %note_id, pruned, "Pruned revisions");
        }
        Ok(pruned)
    }

    async fn delete_by_note(&self, note_id: NoteId) -> StoreResult<u64> {
        Ok(self
            .conn
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM revisions WHERE note_id = ?1",
                    params![note_id.to_string()],
                )?;
                Ok(deleted as u64)
            })
            .await?)
    }
}
