//! Query services over key-value collections.
//!
//! Everything is materialized in memory: filter, sort with the shared
//! comparator, count, then slice.

use async_trait::async_trait;
use tracing::debug;

use jotter_core::{
    compare_by_usage, contains_ignore_ascii_case, Note, NoteQueryService, NoteSearch, Page,
    StoreResult, Tag, TagQueryService,
};

use crate::error::KvResult;

use super::collections::Collections;

/// Text + tag search, sorted and paginated, with the pre-pagination count.
pub(crate) async fn search_notes(
    collections: &Collections,
    search: &NoteSearch,
) -> KvResult<Page<Note>> {
    let mut matches: Vec<Note> = collections
        .all_notes()
        .await?
        .into_iter()
        .filter(|note| search.matches(note))
        .collect();

    let (order_by, order) = (search.sort_key(), search.sort_order());
    matches.sort_by(|a, b| order_by.compare(order, a, b));

    let count = matches.len() as u64;
    let items = search.pagination().slice(matches);

    debug!(
        query = %search.text(),
        tags = search.tag_ids().len(),
        returned = items.len(),
        count,
        "Combined search"
    );

    Ok(Page { items, count })
}

#[derive(Clone)]
pub struct KvNoteQueries {
    collections: Collections,
}

impl KvNoteQueries {
    pub fn new(collections: Collections) -> Self {
        KvNoteQueries { collections }
    }
}

#[async_trait]
impl NoteQueryService for KvNoteQueries {
    async fn combined_search(&self, search: &NoteSearch) -> StoreResult<Page<Note>> {
        Ok(search_notes(&self.collections, search).await?)
    }
}

#[derive(Clone)]
pub struct KvTagQueries {
    collections: Collections,
}

impl KvTagQueries {
    pub fn new(collections: Collections) -> Self {
        KvTagQueries { collections }
    }
}

#[async_trait]
impl TagQueryService for KvTagQueries {
    async fn find_with_usage(&self) -> StoreResult<Vec<Tag>> {
        let mut tags = self.collections.all_tags().await?;
        tags.sort_by(compare_by_usage);
        Ok(tags)
    }

    async fn search_by_name(&self, fragment: &str, limit: u32) -> StoreResult<Vec<Tag>> {
        let fragment = fragment.trim();
        let mut tags: Vec<Tag> = self
            .collections
            .all_tags()
            .await?
            .into_iter()
            .filter(|tag| contains_ignore_ascii_case(tag.name.as_str(), fragment))
            .collect();
        tags.sort_by(|a, b| {
            a.name
                .as_str()
                .cmp(b.name.as_str())
                .then_with(|| a.id.cmp(&b.id))
        });
        tags.truncate(limit as usize);
        Ok(tags)
    }
}
