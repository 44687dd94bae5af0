//! # Query Services (embedded)
//!
//! ## Two-Stage Combined Search
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. tag filter?                                                         │
//! │       SELECT note_id FROM note_tag_relations                            │
//! │       WHERE tag_id IN (?, ?) GROUP BY note_id                           │
//! │       HAVING COUNT(DISTINCT tag_id) = 2                                 │
//! │          │                                                              │
//! │          ├── empty → Page { items: [], count: 0 }   (notes untouched)   │
//! │          ▼                                                              │
//! │  2. SELECT ... FROM notes WHERE id IN (...) AND text LIKE ? ...         │
//! │     SELECT COUNT(*) FROM notes WHERE <same predicates>                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeSet;

use async_trait::async_trait;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use tracing::debug;

use jotter_core::{
    Note, NoteQueryService, NoteSearch, Page, StoreResult, Tag, TagId, TagQueryService,
};

use crate::error::DbResult;
use crate::rows::{
    assemble_notes, like_pattern, note_order_clause, row_count, sql_int, NoteRow, TagRow,
    NOTE_COLUMNS, TAG_USAGE_SELECT,
};

use super::connection::EngineConnection;
use super::note::fetch_relations;
use super::placeholders;

/// Ids of the notes that carry every tag in `tag_ids`.
fn notes_with_all_tags(conn: &Connection, tag_ids: &BTreeSet<TagId>) -> DbResult<Vec<String>> {
    let mut params: Vec<Value> = tag_ids
        .iter()
        .map(|id| Value::Text(id.to_string()))
        .collect();
    params.push(Value::Integer(sql_int(tag_ids.len() as u64)));

    let mut stmt = conn.prepare(&format!(
        "SELECT note_id FROM note_tag_relations WHERE tag_id IN ({}) \
         GROUP BY note_id HAVING COUNT(DISTINCT tag_id) = ?",
        placeholders(tag_ids.len())
    ))?;
    let ids: Vec<String> = stmt
        .query_map(params_from_iter(params.iter()), |row| row.get(0))?
        .collect::<Result<_, _>>()?;
    Ok(ids)
}

/// Text + tag search, sorted and paginated, with the pre-pagination count.
pub(crate) fn search_notes(conn: &Connection, search: &NoteSearch) -> DbResult<Page<Note>> {
    let mut predicates: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    if search.has_tag_filter() {
        let ids = notes_with_all_tags(conn, search.tag_ids())?;
        if ids.is_empty() {
            debug!(tags = search.tag_ids().len(), "No note carries every tag");
            return Ok(Page::empty());
        }
        predicates.push(format!("id IN ({})", placeholders(ids.len())));
        params.extend(ids.into_iter().map(Value::Text));
    }

    if search.has_text_filter() {
        predicates.push("text LIKE ? ESCAPE '\\'".to_string());
        params.push(Value::Text(like_pattern(search.text())));
    }

    let where_clause = if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    };

    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM notes{where_clause}"),
        params_from_iter(params.iter()),
        |row| row.get(0),
    )?;

    let pagination = search.pagination();
    params.push(Value::Integer(sql_int(u64::from(pagination.limit()))));
    params.push(Value::Integer(sql_int(pagination.offset())));

    let mut stmt = conn.prepare(&format!(
        "SELECT {NOTE_COLUMNS} FROM notes{where_clause}{} LIMIT ? OFFSET ?",
        note_order_clause(search.sort_key(), search.sort_order())
    ))?;
    let rows: Vec<NoteRow> = stmt
        .query_map(params_from_iter(params.iter()), NoteRow::from_engine_row)?
        .collect::<Result<_, _>>()?;

    let ids: Vec<String> = rows.iter().map(|row| row.id.clone()).collect();
    let relations = fetch_relations(conn, &ids)?;
    let notes = assemble_notes(rows, relations)?;

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

// =============================================================================
// NoteQueryService
// =============================================================================

#[derive(Clone)]
pub struct EngineNoteQueries {
    conn: EngineConnection,
}

impl EngineNoteQueries {
    pub fn new(conn: EngineConnection) -> Self {
        EngineNoteQueries { conn }
    }
}

#[async_trait]
impl NoteQueryService for EngineNoteQueries {
    async fn combined_search(&self, search: &NoteSearch) -> StoreResult<Page<Note>> {
        let search = search.clone();
        Ok(self.conn.call(move |conn| search_notes(conn, &search)).await?)
    }
}

// =============================================================================
// TagQueryService
// =============================================================================

#[derive(Clone)]
pub struct EngineTagQueries {
    conn: EngineConnection,
}

impl EngineTagQueries {
    pub fn new(conn: EngineConnection) -> Self {
        EngineTagQueries { conn }
    }
}

fn tags_with_usage(conn: &Connection) -> DbResult<Vec<Tag>> {
    let mut stmt = conn.prepare(&format!(
        "{TAG_USAGE_SELECT} GROUP BY t.id ORDER BY usage_count DESC, t.name ASC, t.id ASC"
    ))?;
    let rows: Vec<TagRow> = stmt
        .query_map([], TagRow::from_engine_row)?
        .collect::<Result<_, _>>()?;
    rows.into_iter().map(TagRow::into_tag).collect()
}

fn tags_by_name(conn: &Connection, fragment: &str, limit: u32) -> DbResult<Vec<Tag>> {
    let mut stmt = conn.prepare(&format!(
        "{TAG_USAGE_SELECT} WHERE t.name LIKE ?1 ESCAPE '\\' \
         GROUP BY t.id ORDER BY t.name ASC, t.id ASC LIMIT ?2"
    ))?;
    let rows: Vec<TagRow> = stmt
        .query_map(
            params![like_pattern(fragment.trim()), i64::from(limit)],
            TagRow::from_engine_row,
        )?
        .collect::<Result<_, _>>()?;
    rows.into_iter().map(TagRow::into_tag).collect()
}

#[async_trait]
impl TagQueryService for EngineTagQueries {
    async fn find_with_usage(&self) -> StoreResult<Vec<Tag>> {
        Ok(self.conn.call(|conn| tags_with_usage(conn)).await?)
    }

    async fn search_by_name(&self, fragment: &str, limit: u32) -> StoreResult<Vec<Tag>> {
        let fragment = fragment.to_string();
        Ok(self
            .conn
            .call(move |conn| tags_by_name(conn, &fragment, limit))
            .await?)
    }
}
