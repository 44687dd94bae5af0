//! # Tag Repository (relational)
//!
//! Tags are stored without a usage column; every read aggregates
//! `note_tag_relations` with a `LEFT JOIN ... GROUP BY`.

use async_trait::async_trait;
use sqlx::{QueryBuilder, Sqlite};
use tracing::debug;

use jotter_core::{
    Page, Pagination, SortOrder, StoreResult, Tag, TagId, TagName, TagOrderBy, TagRepository,
};

use crate::error::DbResult;
use crate::rows::{row_count, sql_int, tag_order_clause, TagRow, TAG_USAGE_SELECT};

use super::context::SqlContext;

/// Repository for tags.
#[derive(Clone)]
pub struct SqlTagRepository {
    ctx: SqlContext,
}

impl SqlTagRepository {
    pub fn new(ctx: SqlContext) -> Self {
        SqlTagRepository { ctx }
    }

    async fn save_tag(&self, tag: &Tag) -> DbResult<()> {
        debug!(tag_id = %tag.id, name = %tag.name, "Saving tag");

        let mut guard = self.ctx.acquire().await?;
        sqlx::query(
            r#"
            INSERT INTO tags (id, name, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(tag.id.to_string())
        .bind(tag.name.as_str())
        .bind(tag.created_at.timestamp_millis())
        .bind(tag.updated_at.timestamp_millis())
        .execute(&mut *guard.conn()?)
        .await?;

        Ok(())
    }

    async fn find_one(&self, column: &str, value: String) -> DbResult<Option<Tag>> {
        let mut guard = self.ctx.acquire().await?;

        let row: Option<TagRow> = sqlx::query_as(&format!(
            "{TAG_USAGE_SELECT} WHERE t.{column} = ? GROUP BY t.id"
        ))
        .bind(value)
        .fetch_optional(&mut *guard.conn()?)
        .await?;

        row.map(TagRow::into_tag).transpose()
    }

    async fn find_many(&self, ids: &[TagId]) -> DbResult<Vec<Tag>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(TAG_USAGE_SELECT);
        qb.push(" WHERE t.id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(") GROUP BY t.id ORDER BY t.id ASC");

        let mut guard = self.ctx.acquire().await?;
        let rows: Vec<TagRow> = qb.build_query_as().fetch_all(&mut *guard.conn()?).await?;

        rows.into_iter().map(TagRow::into_tag).collect()
    }

    async fn list(
        &self,
        pagination: Pagination,
        order: SortOrder,
        order_by: TagOrderBy,
    ) -> DbResult<Page<Tag>> {
        let mut guard = self.ctx.acquire().await?;
        let conn = guard.conn()?;

        let rows: Vec<TagRow> = sqlx::query_as(&format!(
            "{TAG_USAGE_SELECT} GROUP BY t.id{} LIMIT ? OFFSET ?",
            tag_order_clause(order_by, order)
        ))
        .bind(sql_int(u64::from(pagination.limit())))
        .bind(sql_int(pagination.offset()))
        .fetch_all(&mut *conn)
        .await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags")
            .fetch_one(&mut *conn)
            .await?;

        Ok(Page {
            items: rows
                .into_iter()
                .map(TagRow::into_tag)
                .collect::<DbResult<_>>()?,
            count: row_count(count)?,
        })
    }

    async fn unused(&self) -> DbResult<Vec<Tag>> {
        let mut guard = self.ctx.acquire().await?;

        let rows: Vec<TagRow> = sqlx::query_as(&format!(
            "{TAG_USAGE_SELECT} GROUP BY t.id HAVING COUNT(r.note_id) = 0 \
             ORDER BY t.name ASC, t.id ASC"
        ))
        .fetch_all(&mut *guard.conn()?)
        .await?;

        rows.into_iter().map(TagRow::into_tag).collect()
    }

    async fn delete_ids(&self, ids: &[TagId]) -> DbResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        // Relations go with the rows (ON DELETE CASCADE).
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("DELETE FROM tags WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(id.to_string());
        }
        separated.push_unseparated(")");

        let mut guard = self.ctx.acquire().await?;
        let result = qb.build().execute(&mut *guard.conn()?).await?;

        debug!(requested = ids.len(), deleted = result.rows_affected(), "Deleted tags");
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl TagRepository for SqlTagRepository {
    async fn save(&self, tag: &Tag) -> StoreResult<()> {
        Ok(self.save_tag(tag).await?)
    }

    async fn find_by_id(&self, id: TagId) -> StoreResult<Option<Tag>> {
        Ok(self.find_one("id", id.to_string()).await?)
    }

    async fn find_by_name(&self, name: &TagName) -> StoreResult<Option<Tag>> {
        Ok(self.find_one("name", name.as_str().to_string()).await?)
    }

    async fn find_by_ids(&self, ids: &[TagId]) -> StoreResult<Vec<Tag>> {
        Ok(self.find_many(ids).await?)
    }

    async fn find_all(
        &self,
        pagination: Pagination,
        order: SortOrder,
        order_by: TagOrderBy,
    ) -> StoreResult<Page<Tag>> {
        Ok(self.list(pagination, order, order_by).await?)
    }

    async fn find_unused(&self) -> StoreResult<Vec<Tag>> {
        Ok(self.unused().await?)
    }

    async fn delete(&self, id: TagId) -> StoreResult<()> {
        self.delete_ids(&[id]).await?;
        Ok(())
    }

    async fn delete_many(&self, ids: &[TagId]) -> StoreResult<u64> {
        Ok(self.delete_ids(ids).await?)
    }
}
