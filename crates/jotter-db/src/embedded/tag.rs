//! Tag repository over the embedded engine.

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use jotter_core::{
    Page, Pagination, SortOrder, StoreResult, Tag, TagId, TagName, TagOrderBy, TagRepository,
};

use crate::error::DbResult;
use crate::rows::{row_count, sql_int, tag_order_clause, TagRow, TAG_USAGE_SELECT};

use super::connection::EngineConnection;
use super::placeholders;

#[derive(Clone)]
pub struct EngineTagRepository {
    conn: EngineConnection,
}

impl EngineTagRepository {
    pub fn new(conn: EngineConnection) -> Self {
        EngineTagRepository { conn }
    }
}

fn save_tag(conn: &Connection, tag: &Tag) -> DbResult<()> {
    conn.execute(
        "INSERT INTO tags (id, name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(id) DO UPDATE SET
             name = excluded.name,
             created_at = excluded.created_at,
             updated_at = excluded.updated_at",
        params![
            tag.id.to_string(),
            tag.name.as_str(),
            tag.created_at.timestamp_millis(),
            tag.updated_at.timestamp_millis(),
        ],
    )?;
    Ok(())
}

fn find_one(conn: &Connection, column: &str, value: &str) -> DbResult<Option<Tag>> {
    let row = conn
        .query_row(
            &format!("{TAG_USAGE_SELECT} WHERE t.{column} = ?1 GROUP BY t.id"),
            params![value],
            TagRow::from_engine_row,
        )
        .optional()?;
    row.map(TagRow::into_tag).transpose()
}

fn find_many(conn: &Connection, ids: &[TagId]) -> DbResult<Vec<Tag>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
    let mut stmt = conn.prepare(&format!(
        "{TAG_USAGE_SELECT} WHERE t.id IN ({}) GROUP BY t.id ORDER BY t.id ASC",
        placeholders(ids.len())
    ))?;
    let rows: Vec<TagRow> = stmt
        .query_map(params_from_iter(ids.iter()), TagRow::from_engine_row)?
        .collect::<Result<_, _>>()?;
    rows.into_iter().map(TagRow::into_tag).collect()
}

fn list(
    conn: &Connection,
    pagination: Pagination,
    order: SortOrder,
    order_by: TagOrderBy,
) -> DbResult<Page<Tag>> {
    let mut stmt = conn.prepare(&format!(
        "{TAG_USAGE_SELECT} GROUP BY t.id{} LIMIT ?1 OFFSET ?2",
        tag_order_clause(order_by, order)
    ))?;
    let rows: Vec<TagRow> = stmt
        .query_map(
            params![
                sql_int(u64::from(pagination.limit())),
                sql_int(pagination.offset())
            ],
            TagRow::from_engine_row,
        )?
        .collect::<Result<_, _>>()?;

    let count: i64 = conn.query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))?;

    Ok(Page {
        items: rows
            .into_iter()
            .map(TagRow::into_tag)
            .collect::<DbResult<_>>()?,
        count: row_count(count)?,
    })
}

fn unused(conn: &Connection) -> DbResult<Vec<Tag>> {
    let mut stmt = conn.prepare(&format!(
        "{TAG_USAGE_SELECT} GROUP BY t.id HAVING COUNT(r.note_id) = 0 \
         ORDER BY t.name ASC, t.id ASC"
    ))?;
    let rows: Vec<TagRow> = stmt
        .query_map([], TagRow::from_engine_row)?
        .collect::<Result<_, _>>()?;
    rows.into_iter().map(TagRow::into_tag).collect()
}

fn delete_ids(conn: &Connection, ids: &[TagId]) -> DbResult<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let ids: Vec<String> = ids.iter().map(ToString::to_string).collect();
    let deleted = conn.execute(
        &format!("DELETE FROM tags WHERE id IN ({})", placeholders(ids.len())),
        params_from_iter(ids.iter()),
    )?;
    Ok(deleted as u64)
}

#[async_trait]
impl TagRepository for EngineTagRepository {
    async fn save(&self, tag: &Tag) -> StoreResult<()> {
        debug!(tag_id = %tag.id, name = %tag.name, "Saving tag");
        let tag = tag.clone();
        Ok(self.conn.call(move |conn| save_tag(conn, &tag)).await?)
    }

    async fn find_by_id(&self, id: TagId) -> StoreResult<Option<Tag>> {
        Ok(self
            .conn
            .call(move |conn| find_one(conn, "id", &id.to_string()))
            .await?)
    }

    async fn find_by_name(&self, name: &TagName) -> StoreResult<Option<Tag>> {
        let name = name.clone();
        Ok(self
            .conn
            .call(move |conn| find_one(conn, "name", name.as_str()))
            .await?)
    }

    async fn find_by_ids(&self, ids: &[TagId]) -> StoreResult<Vec<Tag>> {
        let ids = ids.to_vec();
        Ok(self.conn.call(move |conn| find_many(conn, &ids)).await?)
    }

    async fn find_all(
        &self,
        pagination: Pagination,
        order: SortOrder,
        order_by: TagOrderBy,
    ) -> StoreResult<Page<Tag>> {
        Ok(self
            .conn
            .call(move |conn| list(conn, pagination, order, order_by))
            .await?)
    }

    async fn find_unused(&self) -> StoreResult<Vec<Tag>> {
        Ok(self.conn.call(|conn| unused(conn)).await?)
    }

    async fn delete(&self, id: TagId) -> StoreResult<()> {
        self.delete_many(&[id]).await?;
        Ok(())
    }

    async fn delete_many(&self, ids: &[TagId]) -> StoreResult<u64> {
        let ids = ids.to_vec();
        let deleted = self.conn.call(move |conn| delete_ids(conn, &ids)).await?;
        debug!(deleted, "Deleted tags");
        Ok(deleted)
    }
}
