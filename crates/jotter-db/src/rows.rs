//! Row shapes shared by the two SQL adapters.
//!
//! Both adapters read the same columns; sqlx decodes them through
//! `FromRow`, the embedded engine through `from_engine_row`. Conversion into
//! domain types happens in one place so the two cannot drift.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use jotter_core::{
    from_millis, Document, Note, NoteId, NoteOrderBy, Revision, RevisionId, SortOrder, Tag, TagId,
    TagName, TagOrderBy,
};

use crate::error::{DbError, DbResult};

pub(crate) const NOTE_COLUMNS: &str = "id, content, text, created_at, updated_at";
pub(crate) const REVISION_COLUMNS: &str = "id, note_id, content, saved_at";

/// Tag columns plus live usage, over `tags t LEFT JOIN note_tag_relations r`.
pub(crate) const TAG_USAGE_SELECT: &str = "SELECT t.id, t.name, t.created_at, t.updated_at, \
     COUNT(r.note_id) AS usage_count \
     FROM tags t LEFT JOIN note_tag_relations r ON r.tag_id = t.id";

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct NoteRow {
    pub id: String,
    pub content: String,
    pub text: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl NoteRow {
    pub fn from_engine_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(NoteRow {
            id: row.get(0)?,
            content: row.get(1)?,
            text: row.get(2)?,
            created_at: row.get(3)?,
            updated_at: row.get(4)?,
        })
    }

    pub fn into_note(self, tag_ids: BTreeSet<TagId>) -> DbResult<Note> {
        Ok(Note::restore(
            parse_note_id(&self.id)?,
            parse_document(&self.content)?,
            self.text,
            tag_ids,
            timestamp(self.created_at)?,
            timestamp(self.updated_at)?,
        ))
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct TagRow {
    pub id: String,
    pub name: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub usage_count: i64,
}

impl TagRow {
    pub fn from_engine_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(TagRow {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: row.get(2)?,
            updated_at: row.get(3)?,
            usage_count: row.get(4)?,
        })
    }

    pub fn into_tag(self) -> DbResult<Tag> {
        Ok(Tag {
            id: parse_tag_id(&self.id)?,
            name: TagName::parse(&self.name).map_err(DbError::corrupted)?,
            usage_count: u32::try_from(self.usage_count).map_err(DbError::corrupted)?,
            created_at: timestamp(self.created_at)?,
            updated_at: timestamp(self.updated_at)?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct RevisionRow {
    pub id: String,
    pub note_id: String,
    pub content: String,
    pub saved_at: i64,
}

impl RevisionRow {
    pub fn from_engine_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(RevisionRow {
            id: row.get(0)?,
            note_id: row.get(1)?,
            content: row.get(2)?,
            saved_at: row.get(3)?,
        })
    }

    pub fn into_revision(self) -> DbResult<Revision> {
        Ok(Revision {
            id: RevisionId::parse(&self.id).map_err(DbError::corrupted)?,
            note_id: parse_note_id(&self.note_id)?,
            content: parse_document(&self.content)?,
            saved_at: timestamp(self.saved_at)?,
        })
    }
}

/// Converts note rows plus `(note_id, tag_id)` relation rows into notes,
/// keeping row order.
pub(crate) fn assemble_notes(
    rows: Vec<NoteRow>,
    relations: Vec<(String, String)>,
) -> DbResult<Vec<Note>> {
    let mut tags_by_note: BTreeMap<String, BTreeSet<TagId>> = BTreeMap::new();
    for (note_id, tag_id) in relations {
        tags_by_note
            .entry(note_id)
            .or_default()
            .insert(parse_tag_id(&tag_id)?);
    }

    rows.into_iter()
        .map(|row| {
            let tag_ids = tags_by_note.remove(&row.id).unwrap_or_default();
            row.into_note(tag_ids)
        })
        .collect()
}

pub(crate) fn parse_note_id(raw: &str) -> DbResult<NoteId> {
    NoteId::parse(raw).map_err(DbError::corrupted)
}

pub(crate) fn parse_tag_id(raw: &str) -> DbResult<TagId> {
    TagId::parse(raw).map_err(DbError::corrupted)
}

fn parse_document(raw: &str) -> DbResult<Document> {
    Document::parse(raw).map_err(|e| DbError::corrupted(format!("note content: {e}")))
}

fn timestamp(millis: i64) -> DbResult<DateTime<Utc>> {
    from_millis(millis).ok_or_else(|| DbError::corrupted(format!("timestamp {millis}")))
}

/// `LIKE` pattern for a substring match with `\` as the escape character.
///
/// SQLite's `LIKE` folds ASCII case only, which is the folding every backend
/// applies.
pub(crate) fn like_pattern(fragment: &str) -> String {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn direction(order: SortOrder) -> &'static str {
    match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    }
}

/// `ORDER BY` for note queries: the key in `order`, then id ascending.
pub(crate) fn note_order_clause(order_by: NoteOrderBy, order: SortOrder) -> String {
    let column = match order_by {
        NoteOrderBy::CreatedAt => "created_at",
        NoteOrderBy::UpdatedAt => "updated_at",
    };
    format!(" ORDER BY {column} {}, id ASC", direction(order))
}

/// `ORDER BY` for [`TAG_USAGE_SELECT`] queries.
pub(crate) fn tag_order_clause(order_by: TagOrderBy, order: SortOrder) -> String {
    let column = match order_by {
        TagOrderBy::Name => "t.name",
        TagOrderBy::CreatedAt => "t.created_at",
        TagOrderBy::UpdatedAt => "t.updated_at",
        TagOrderBy::Usage => "usage_count",
    };
    format!(" ORDER BY {column} {}, t.id ASC", direction(order))
}

/// Clamps a `u64` offset or `u32` limit into SQLite's signed integer range.
pub(crate) fn sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// A `COUNT(*)` result as a page count. Negative means the engine returned
/// garbage.
pub(crate) fn row_count(count: i64) -> DbResult<u64> {
    u64::try_from(count).map_err(|_| DbError::corrupted(format!("row count {count}")))
}
