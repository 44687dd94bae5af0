//! Note repository over key-value collections.

use async_trait::async_trait;
use tracing::debug;

use jotter_core::{
    Note, NoteId, NoteOrderBy, NoteRepository, NoteSearch, Page, Pagination, SortOrder,
    StoreError, StoreResult,
};

use super::collections::{tags_by_note, Collections, NoteRecord, RelationRecord};
use super::query::search_notes;

#[derive(Clone)]
pub struct KvNoteRepository {
    collections: Collections,
}

impl KvNoteRepository {
    pub fn new(collections: Collections) -> Self {
        KvNoteRepository { collections }
    }
}

#[async_trait]
impl NoteRepository for KvNoteRepository {
    async fn save(&self, note: &Note) -> StoreResult<()> {
        debug!(note_id = %note.id(), tags = note.tag_ids().len(), "Saving note");

        let tags = self.collections.tags().await?;
        if let Some(missing) = note
            .tag_ids()
            .iter()
            .find(|id| !tags.contains_key(&id.to_string()))
        {
            return Err(StoreError::Conflict {
                entity: "Relation",
                message: format!("note {} links unknown tag {missing}", note.id()),
            });
        }

        let mut notes = self.collections.notes().await?;
        notes.insert(note.id().to_string(), NoteRecord::from_note(note));
        self.collections.save_notes(&notes).await?;

        let mut relations = self.collections.relations().await?;
        relations.retain(|r| r.note_id != note.id());
        relations.extend(note.tag_ids().iter().map(|tag_id| RelationRecord {
            note_id: note.id(),
            tag_id: *tag_id,
            created_at: note.updated_at(),
        }));
        self.collections.save_relations(&relations).await?;

        Ok(())
    }

    async fn find_by_id(&self, id: NoteId) -> StoreResult<Option<Note>> {
        let mut notes = self.collections.notes().await?;
        let Some(record) = notes.remove(&id.to_string()) else {
            return Ok(None);
        };

        let mut tags = tags_by_note(&self.collections.relations().await?);
        let tag_ids = tags.remove(&id).unwrap_or_default();
        Ok(Some(record.into_note(tag_ids)))
    }

    async fn find_all(
        &self,
        pagination: Pagination,
        order: SortOrder,
        order_by: NoteOrderBy,
    ) -> StoreResult<Page<Note>> {
        let search = NoteSearch::new(pagination).order(order).order_by(order_by);
        Ok(search_notes(&self.collections, &search).await?)
    }

    async fn delete(&self, id: NoteId) -> StoreResult<()> {
        // Relations and revisions first; a note without them is still valid.
        let mut relations = self.collections.relations().await?;
        let before = relations.len();
        relations.retain(|r| r.note_id != id);
        if relations.len() != before {
            self.collections.save_relations(&relations).await?;
        }

        let mut revisions = self.collections.revisions().await?;
        let before = revisions.len();
        revisions.retain(|_, r| r.note_id != id);
        if revisions.len() != before {
            self.collections.save_revisions(&revisions).await?;
        }

        let mut notes = self.collections.notes().await?;
        let deleted = notes.remove(&id.to_string()).is_some();
        if deleted {
            self.collections.save_notes(&notes).await?;
        }

        debug!(note_id = %id, deleted, "Deleted note");
        Ok(())
    }
}
