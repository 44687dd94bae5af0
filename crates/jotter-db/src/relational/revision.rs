//! # Revision Repository (relational)

use async_trait::async_trait;
use tracing::debug;

use jotter_core::{NoteId, Revision, RevisionId, RevisionRepository, StoreResult};

use crate::error::DbResult;
use crate::rows::{sql_int, RevisionRow, REVISION_COLUMNS};

use super::context::SqlContext;

#[derive(Clone)]
pub struct SqlRevisionRepository {
    ctx: SqlContext,
}

impl SqlRevisionRepository {
    pub fn new(ctx: SqlContext) -> Self {
        SqlRevisionRepository { ctx }
    }

    async fn insert(&self, revision: &Revision) -> DbResult<()> {
        let mut guard = self.ctx.acquire().await?;

        // Revisions are immutable; saving the same id twice is a no-op.
        sqlx::query(
            "INSERT INTO revisions (id, note_id, content, saved_at) VALUES (?, ?, ?, ?) \
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(revision.id.to_string())
        .bind(revision.note_id.to_string())
        .bind(revision.content.to_json_string())
        .bind(revision.saved_at.timestamp_millis())
        .execute(&mut *guard.conn()?)
        .await?;

        Ok(())
    }

    async fn find_one(&self, id: RevisionId) -> DbResult<Option<Revision>> {
        let mut guard = self.ctx.acquire().await?;

        let row: Option<RevisionRow> = sqlx::query_as(&format!(
            "SELECT {REVISION_COLUMNS} FROM revisions WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&mut *guard.conn()?)
        .await?;

        row.map(RevisionRow::into_revision).transpose()
    }

    async fn for_note(&self, note_id: NoteId) -> DbResult<Vec<Revision>> {
        let mut guard = self.ctx.acquire().await?;

        let rows: Vec<RevisionRow> = sqlx::query_as(&format!(
            "SELECT {REVISION_COLUMNS} FROM revisions WHERE note_id = ? \
             ORDER BY saved_at DESC, id DESC"
        ))
        .bind(note_id.to_string())
        .fetch_all(&mut *guard.conn()?)
        .await?;

        rows.into_iter().map(RevisionRow::into_revision).collect()
    }

    async fn prune_note(&self, note_id: NoteId, keep: usize) -> DbResult<u64> {
        let mut guard = self.ctx.acquire().await?;

        let result = sqlx::query(
            r#"
            DELETE FROM revisions
            WHERE note_id = ?
              AND id NOT IN (
                  SELECT id FROM revisions
                  WHERE note_id = ?
                  ORDER BY saved_at DESC, id DESC
                  LIMIT ?
              )
            "#,
        )
        .bind(note_id.to_string())
        .bind(note_id.to_string())
        .bind(sql_int(keep as u64))
        .execute(&mut *guard.conn()?)
        .await?;

        if result.rows_affected() > 0 {
            debug!(note_id = %note_id, pruned = result.rows_affected(), "Pruned revisions");
        }
        Ok(result.rows_affected())
    }

    async fn delete_for_note(&self, note_id: NoteId) -> DbResult<u64> {
        let mut guard = self.ctx.acquire().await?;

        let result = sqlx::query("DELETE FROM revisions WHERE note_id = ?")
            .bind(note_id.to_string())
            .execute(&mut *guard.conn()?)
            .await?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RevisionRepository for SqlRevisionRepository {
    async fn save(&self, revision: &Revision) -> StoreResult<()> {
        Ok(self.insert(revision).await?)
    }

    async fn find_by_id(&self, id: RevisionId) -> StoreResult<Option<Revision>> {
        Ok(self.find_one(id).await?)
    }

    async fn find_by_note(&self, note_id: NoteId) -> StoreResult<Vec<Revision>> {
        Ok(self.for_note(note_id).await?)
    }

    async fn prune(&self, note_id: NoteId, keep: usize) -> StoreResult<u64> {
        Ok(self.prune_note(note_id, keep).await?)
    }

    async fn delete_by_note(&self, note_id: NoteId) -> StoreResult<u64> {
        Ok(self.delete_for_note(note_id).await?)
    }
}
