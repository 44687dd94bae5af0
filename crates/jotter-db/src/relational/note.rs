//! # Note Repository (relational)
//!
//! ## Save = Upsert + Relation Rewrite
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  save(note)                                   (one SAVEPOINT/BEGIN)     │
//! │       │                                                                 │
//! │       ├── INSERT INTO notes ... ON CONFLICT(id) DO UPDATE               │
//! │       │      never INSERT OR REPLACE: a replace deletes the row first   │
//! │       │      and the cascade would drop relations and revisions         │
//! │       │                                                                 │
//! │       ├── DELETE FROM note_tag_relations WHERE note_id = ?              │
//! │       │                                                                 │
//! │       └── INSERT INTO note_tag_relations VALUES (..), (..), ...         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use sqlx::{Connection, QueryBuilder, Sqlite, SqliteConnection};
use tracing::debug;

use jotter_core::{
    Note, NoteId, NoteOrderBy, NoteRepository, NoteSearch, Page, Pagination, SortOrder,
    StoreResult,
};

use crate::error::DbResult;
use crate::rows::{assemble_notes, NoteRow, NOTE_COLUMNS};

use super::context::SqlContext;
use super::query::search_notes;

/// Repository for notes and their tag relations.
#[derive(Clone)]
pub struct SqlNoteRepository {
    ctx: SqlContext,
}

impl SqlNoteRepository {
    pub fn new(ctx: SqlContext) -> Self {
        SqlNoteRepository { ctx }
    }

    async fn save_note(&self, note: &Note) -> DbResult<()> {
        debug!(note_id = %note.id(), tags = note.tag_ids().len(), "Saving note");

        let mut guard = self.ctx.acquire().await?;
        let mut tx = guard.conn()?.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO notes (id, content, text, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                text = excluded.text,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(note.id().to_string())
        .bind(note.content().to_json_string())
        .bind(note.text())
        .bind(note.created_at().timestamp_millis())
        .bind(note.updated_at().timestamp_millis())
        .execute(&mut *tx)
        .await?;

        replace_relations(&mut tx, note).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_note(&self, id: NoteId) -> DbResult<Option<Note>> {
        let mut guard = self.ctx.acquire().await?;
        let conn = guard.conn()?;

        let row: Option<NoteRow> =
            sqlx::query_as(&format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&mut *conn)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let relations = fetch_relations(conn, std::slice::from_ref(&row.id)).await?;
        let mut notes = assemble_notes(vec![row], relations)?;
        Ok(notes.pop())
    }

    async fn delete_note(&self, id: NoteId) -> DbResult<()> {
        let mut guard = self.ctx.acquire().await?;

        // Relations and revisions go with the row (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM notes WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *guard.conn()?)
            .await?;

        debug!(note_id = %id, deleted = result.rows_affected(), "Deleted note");
        Ok(())
    }
}

/// Rewrites the relation rows of `note` to exactly its tag set.
async fn replace_relations(conn: &mut SqliteConnection, note: &Note) -> DbResult<()> {
    sqlx::query("DELETE FROM note_tag_relations WHERE note_id = ?")
        .bind(note.id().to_string())
        .execute(&mut *conn)
        .await?;

    if note.tag_ids().is_empty() {
        return Ok(());
    }

    let note_id = note.id().to_string();
    let linked_at = note.updated_at().timestamp_millis();

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("INSERT INTO note_tag_relations (note_id, tag_id, created_at) ");
    qb.push_values(note.tag_ids(), |mut row, tag_id| {
        row.push_bind(note_id.clone())
            .push_bind(tag_id.to_string())
            .push_bind(linked_at);
    });
    qb.build().execute(&mut *conn).await?;

    Ok(())
}

/// `(note_id, tag_id)` rows for the given notes.
pub(crate) async fn fetch_relations(
    conn: &mut SqliteConnection,
    note_ids: &[String],
) -> DbResult<Vec<(String, String)>> {
    if note_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT note_id, tag_id FROM note_tag_relations WHERE note_id IN (");
    let mut ids = qb.separated(", ");
    for id in note_ids {
        ids.push_bind(id.clone());
    }
    ids.push_unseparated(")");

    let relations = qb.build_query_as().fetch_all(&mut *conn).await?;
    Ok(relations)
}

#[async_trait]
impl NoteRepository for SqlNoteRepository {
    async fn save(&self, note: &Note) -> StoreResult<()> {
        Ok(self.save_note(note).await?)
    }

    async fn find_by_id(&self, id: NoteId) -> StoreResult<Option<Note>> {
        Ok(self.find_note(id).await?)
    }

    async fn find_all(
        &self,
        pagination: Pagination,
        order: SortOrder,
        order_by: NoteOrderBy,
    ) -> StoreResult<Page<Note>> {
        let search = NoteSearch::new(pagination).order(order).order_by(order_by);
        Ok(search_notes(&self.ctx, &search).await?)
    }

    async fn delete(&self, id: NoteId) -> StoreResult<()> {
        Ok(self.delete_note(id).await?)
    }
}
