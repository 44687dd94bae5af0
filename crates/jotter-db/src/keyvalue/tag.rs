//! Tag repository over key-value collections.
//!
//! Name uniqueness is checked here; the blob store has no constraints.

use std::collections::BTreeSet;

use async_trait::async_trait;
use tracing::debug;

use jotter_core::{
    Page, Pagination, SortOrder, StoreError, StoreResult, Tag, TagId, TagName, TagOrderBy,
    TagRepository,
};

use super::collections::{usage_counts, Collections, TagRecord};

#[derive(Clone)]
pub struct KvTagRepository {
    collections: Collections,
}

impl KvTagRepository {
    pub fn new(collections: Collections) -> Self {
        KvTagRepository { collections }
    }
}

#[async_trait]
impl TagRepository for KvTagRepository {
    async fn save(&self, tag: &Tag) -> StoreResult<()> {
        debug!(tag_id = %tag.id, name = %tag.name, "Saving tag");

        let mut tags = self.collections.tags().await?;
        if tags.values().any(|t| t.name == tag.name && t.id != tag.id) {
            return Err(StoreError::Conflict {
                entity: "Tag",
                message: format!("Duplicate tags.name: {}", tag.name),
            });
        }

        tags.insert(tag.id.to_string(), TagRecord::from_tag(tag));
        Ok(self.collections.save_tags(&tags).await?)
    }

    async fn find_by_id(&self, id: TagId) -> StoreResult<Option<Tag>> {
        let mut tags = self.collections.tags().await?;
        let Some(record) = tags.remove(&id.to_string()) else {
            return Ok(None);
        };

        let usage = usage_counts(&self.collections.relations().await?);
        Ok(Some(record.into_tag(&usage)))
    }

    async fn find_by_name(&self, name: &TagName) -> StoreResult<Option<Tag>> {
        Ok(self
            .collections
            .all_tags()
            .await?
            .into_iter()
            .find(|tag| &tag.name == name))
    }

    async fn find_by_ids(&self, ids: &[TagId]) -> StoreResult<Vec<Tag>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let wanted: BTreeSet<TagId> = ids.iter().copied().collect();
        let mut tags: Vec<Tag> = self
            .collections
            .all_tags()
            .await?
            .into_iter()
            .filter(|tag| wanted.contains(&tag.id))
            .collect();
        tags.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tags)
    }

    async fn find_all(
        &self,
        pagination: Pagination,
        order: SortOrder,
        order_by: TagOrderBy,
    ) -> StoreResult<Page<Tag>> {
        let mut tags = self.collections.all_tags().await?;
        tags.sort_by(|a, b| order_by.compare(order, a, b));

        let count = tags.len() as u64;
        Ok(Page {
            items: pagination.slice(tags),
            count,
        })
    }

    async fn find_unused(&self) -> StoreResult<Vec<Tag>> {
        let mut tags: Vec<Tag> = self
            .collections
            .all_tags()
            .await?
            .into_iter()
            .filter(|tag| tag.usage_count == 0)
            .collect();
        tags.sort_by(|a, b| TagOrderBy::Name.compare(SortOrder::Asc, a, b));
        Ok(tags)
    }

    async fn delete(&self, id: TagId) -> StoreResult<()> {
        self.delete_many(&[id]).await?;
        Ok(())
    }

    async fn delete_many(&self, ids: &[TagId]) -> StoreResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let doomed: BTreeSet<TagId> = ids.iter().copied().collect();

        // Relations first, so an interrupted delete never leaves a relation
        // pointing at a missing tag.
        let mut relations = self.collections.relations().await?;
        let before = relations.len();
        relations.retain(|r| !doomed.contains(&r.tag_id));
        if relations.len() != before {
            self.collections.save_relations(&relations).await?;
        }

        let mut tags = self.collections.tags().await?;
        let before = tags.len();
        tags.retain(|_, t| !doomed.contains(&t.id));
        let deleted = (before - tags.len()) as u64;
        if deleted > 0 {
            self.collections.save_tags(&tags).await?;
        }

        debug!(requested = ids.len(), deleted, "Deleted tags");
        Ok(deleted)
    }
}
