//! # Query Services (relational)
//!
//! ## Combined Search
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SELECT ... FROM notes WHERE 1 = 1                                      │
//! │     [AND text LIKE '%apple%' ESCAPE '\']              text filter       │
//! │     [AND id IN (SELECT note_id FROM note_tag_relations                  │
//! │                 WHERE tag_id IN (?, ?)                                  │
//! │                 GROUP BY note_id                                        │
//! │                 HAVING COUNT(DISTINCT tag_id) = 2)]   AND tag filter    │
//! │  ORDER BY updated_at DESC, id ASC                                       │
//! │  LIMIT ? OFFSET ?                                                       │
//! │                                                                         │
//! │  SELECT COUNT(*) FROM notes WHERE <same predicates>                     │
//! │                                                                         │
//! │  pool        → both queries concurrently (tokio::try_join!)             │
//! │  transaction → one after the other on the transaction's connection     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use jotter_core::{Note, NoteQueryService, NoteSearch, Page, StoreResult, Tag, TagQueryService};

use crate::error::DbResult;
use crate::rows::{
    assemble_notes, like_pattern, note_order_clause, row_count, sql_int, NoteRow, TagRow,
    NOTE_COLUMNS, TAG_USAGE_SELECT,
};

use super::context::SqlContext;
use super::note::fetch_relations;

/// Appends the shared WHERE clause of the item and count queries.
fn push_note_filters(qb: &mut QueryBuilder<'_, Sqlite>, search: &NoteSearch) {
    qb.push(" WHERE 1 = 1");

    if search.has_text_filter() {
        qb.push(" AND text LIKE ")
            .push_bind(like_pattern(search.text()))
            .push(" ESCAPE '\\'");
    }

    if search.has_tag_filter() {
        qb.push(" AND id IN (SELECT note_id FROM note_tag_relations WHERE tag_id IN (");
        let mut ids = qb.separated(", ");
        for tag_id in search.tag_ids() {
            ids.push_bind(tag_id.to_string());
        }
        ids.push_unseparated(") GROUP BY note_id HAVING COUNT(DISTINCT tag_id) = ");
        ids.push_bind_unseparated(sql_int(search.tag_ids().len() as u64));
        ids.push_unseparated(")");
    }
}

/// Text + tag search, sorted and paginated, with the pre-pagination count.
pub(crate) async fn search_notes(ctx: &SqlContext, search: &NoteSearch) -> DbResult<Page<Note>> {
    let pagination = search.pagination();

    let mut items_qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(format!("SELECT {NOTE_COLUMNS} FROM notes"));
    push_note_filters(&mut items_qb, search);
    items_qb
        .push(note_order_clause(search.sort_key(), search.sort_order()))
        .push(" LIMIT ")
        .push_bind(sql_int(u64::from(pagination.limit())))
        .push(" OFFSET ")
        .push_bind(sql_int(pagination.offset()));

    let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT COUNT(*) FROM notes");
    push_note_filters(&mut count_qb, search);

    let (rows, count): (Vec<NoteRow>, i64) = match ctx.pool() {
        Some(pool) => tokio::try_join!(
            items_qb.build_query_as::<NoteRow>().fetch_all(pool),
            count_qb.build_query_scalar::<i64>().fetch_one(pool),
        )?,
        None => {
            let mut guard = ctx.acquire().await?;
            let conn = guard.conn()?;
            let rows = items_qb
                .build_query_as::<NoteRow>()
                .fetch_all(&mut *conn)
                .await?;
            let count = count_qb
                .build_query_scalar::<i64>()
                .fetch_one(&mut *conn)
                .await?;
            (rows, count)
        }
    };

    let notes = attach_tags(ctx, rows).await?;

    debug!(
        query = %search.text(),
        tags = search.tag_ids().len(),
        returned = notes.len(),
        count,
        "Combined search"
    );

    Ok(Page {
        items: notes,
        count: row_count(count)?,
    })
}

async fn attach_tags(ctx: &SqlContext, rows: Vec<NoteRow>) -> DbResult<Vec<Note>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
    let mut guard = ctx.acquire().await?;
    let relations = fetch_relations(guard.conn()?, &ids).await?;
    assemble_notes(rows, relations)
}

// =============================================================================
// NoteQueryService
// =============================================================================

#[derive(Clone)]
pub struct SqlNoteQueries {
    ctx: SqlContext,
}

impl SqlNoteQueries {
    pub fn new(ctx: SqlContext) -> Self {
        SqlNoteQueries { ctx }
    }
}

#[async_trait]
impl NoteQueryService for SqlNoteQueries {
    async fn combined_search(&self, search: &NoteSearch) -> StoreResult<Page<Note>> {
        Ok(search_notes(&self.ctx, search).await?)
    }
}

// =============================================================================
// TagQueryService
// =============================================================================

#[derive(Clone)]
pub struct SqlTagQueries {
    ctx: SqlContext,
}

impl SqlTagQueries {
    pub fn new(ctx: SqlContext) -> Self {
        SqlTagQueries { ctx }
    }

    async fn tags_with_usage(&self) -> DbResult<Vec<Tag>> {
        let mut guard = self.ctx.acquire().await?;

        let rows: Vec<TagRow> = sqlx::query_as(&format!(
            "{TAG_USAGE_SELECT} GROUP BY t.id ORDER BY usage_count DESC, t.name ASC, t.id ASC"
        ))
        .fetch_all(&mut *guard.conn()?)
        .await?;

        rows.into_iter().map(TagRow::into_tag).collect()
    }

    async fn tags_by_name(&self, fragment: &str, limit: u32) -> DbResult<Vec<Tag>> {
        let mut guard = self.ctx.acquire().await?;

        let rows: Vec<TagRow> = sqlx::query_as(&format!(
            "{TAG_USAGE_SELECT} WHERE t.name LIKE ? ESCAPE '\\' \
             GROUP BY t.id ORDER BY t.name ASC, t.id ASC LIMIT ?"
        ))
        .bind(like_pattern(fragment.trim()))
        .bind(i64::from(limit))
        .fetch_all(&mut *guard.conn()?)
        .await?;

        rows.into_iter().map(TagRow::into_tag).collect()
    }
}

#[async_trait]
impl TagQueryService for SqlTagQueries {
    async fn find_with_usage(&self) -> StoreResult<Vec<Tag>> {
        Ok(self.tags_with_usage().await?)
    }

    async fn search_by_name(&self, fragment: &str, limit: u32) -> StoreResult<Vec<Tag>> {
        Ok(self.tags_by_name(fragment, limit).await?)
    }
}
