//! Note repository over the embedded engine.
//!
//! Statements autocommit one by one: a failure half way through `save`
//! leaves the note row written and its relations partially rewritten.

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use jotter_core::{
    Note, NoteId, NoteOrderBy, NoteRepository, NoteSearch, Page, Pagination, SortOrder,
    StoreResult,
};

use crate::error::DbResult;
use crate::rows::{assemble_notes, NoteRow, NOTE_COLUMNS};

use super::connection::EngineConnection;
use super::placeholders;
use super::query::search_notes;

#[derive(Clone)]
pub struct EngineNoteRepository {
    conn: EngineConnection,
}

impl EngineNoteRepository {
    pub fn new(conn: EngineConnection) -> Self {
        EngineNoteRepository { conn }
    }
}

fn save_note(conn: &mut Connection, note: &Note) -> DbResult<()> {
    let note_id = note.id().to_string();

    conn.execute(
        "INSERT INTO notes (id, content, text, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
             content = excluded.content,
             text = excluded.text,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            note_id,
            note.content().to_json_string(),
            note.text(),
            note.created_at().timestamp_millis(),
            note.updated_at().timestamp_millis(),
        ],
    )?;

    conn.execute(
        "DELETE FROM note_tag_relations WHERE note_id = ?1",
        params![note_id],
    )?;

    let linked_at = note.updated_at().timestamp_millis();
    let mut insert = conn.prepare_cached(
        "INSERT INTO note_tag_relations (note_id, tag_id, created_at) VALUES (?1, ?2, ?3)",
    )?;
    for tag_id in note.tag_ids() {
        insert.execute(params![note_id, tag_id.to_string(), linked_at])?;
    }

    Ok(())
}

fn find_note(conn: &Connection, id: NoteId) -> DbResult<Option<Note>> {
    let row = conn
        .query_row(
            &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1"),
            params![id.to_string()],
            NoteRow::from_engine_row,
        )
        .optional()?;

    let Some(row) = row else {
        return Ok(None);
    };

    let relations = fetch_relations(conn, std::slice::from_ref(&row.id))?;
    let mut notes = assemble_notes(vec![row], relations)?;
    Ok(notes.pop())
}

/// `(note_id, tag_id)` rows for the given notes.
pub(crate) fn fetch_relations(
    conn: &Connection,
    note_ids: &[String],
) -> DbResult<Vec<(String, String)>> {
    if note_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT note_id, tag_id FROM note_tag_relations WHERE note_id IN ({})",
        placeholders(note_ids.len())
    ))?;
    let relations: Vec<(String, String)> = stmt
        .query_map(params_from_iter(note_ids), |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;
    Ok(relations)
}

#[async_trait]
impl NoteRepository for EngineNoteRepository {
    async fn save(&self, note: &Note) -> StoreResult<()> {
        debug!(note_id = %note.id(), tags = note.tag_ids().len(), "Saving note");
        let note = note.clone();
        Ok(self.conn.call(move |conn| save_note(conn, &note)).await?)
    }

    async fn find_by_id(&self, id: NoteId) -> StoreResult<Option<Note>> {
        Ok(self.conn.call(move |conn| find_note(conn, id)).await?)
    }

    async fn find_all(
        &self,
        pagination: Pagination,
        order: SortOrder,
        order_by: NoteOrderBy,
    ) -> StoreResult<Page<Note>> {
        let search = NoteSearch::new(pagination).order(order).order_by(order_by);
        Ok(self.conn.call(move |conn| search_notes(conn, &search)).await?)
    }

    async fn delete(&self, id: NoteId) -> StoreResult<()> {
        let deleted = self
            .conn
            .call(move |conn| {
                Ok(conn.execute("DELETE FROM notes WHERE id = ?1", params![id.to_string()])?)
            })
            .await?;

        debug!(note_id = %id, deleted, "Deleted note");
        Ok(())
    }
}
