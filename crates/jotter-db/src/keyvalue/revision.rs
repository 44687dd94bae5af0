//! Revision repository over key-value collections.

use async_trait::async_trait;
use tracing::debug;

use jotter_core::{NoteId, Revision, RevisionId, RevisionRepository, StoreError, StoreResult};

use super::collections::{Collections, RevisionRecord};

#[derive(Clone)]
pub struct KvRevisionRepository {
    collections: Collections,
}

impl KvRevisionRepository {
    pub fn new(collections: Collections) -> Self {
        KvRevisionRepository { collections }
    }

    /// Revisions of one note, newest first.
    async fn newest_first(&self, note_id: NoteId) -> StoreResult<Vec<Revision>> {
        let mut revisions: Vec<Revision> = self
            .collections
            .revisions()
            .await?
            .into_values()
            .filter(|r| r.note_id == note_id)
            .map(RevisionRecord::into_revision)
            .collect();
        revisions.sort_by(|a, b| b.saved_at.cmp(&a.saved_at).then_with(|| b.id.cmp(&a.id)));
        Ok(revisions)
    }
}

#[async_trait]
impl RevisionRepository for KvRevisionRepository {
    async fn save(&self, revision: &Revision) -> StoreResult<()> {
        let notes = self.collections.notes().await?;
        if !notes.contains_key(&revision.note_id.to_string()) {
            return Err(StoreError::Conflict {
                entity: "Relation",
                message: format!("revision of unknown note {}", revision.note_id),
            });
        }

        let mut revisions = self.collections.revisions().await?;
        let key = revision.id.to_string();
        if revisions.contains_key(&key) {
            return Ok(());
        }
        revisions.insert(key, RevisionRecord::from_revision(revision));
        Ok(self.collections.save_revisions(&revisions).await?)
    }

    async fn find_by_id(&self, id: RevisionId) -> StoreResult<Option<Revision>> {
        let mut revisions = self.collections.revisions().await?;
        Ok(revisions
            .remove(&id.to_string())
            .map(RevisionRecord::into_revision))
    }

    async fn find_by_note(&self, note_id: NoteId) -> StoreResult<Vec<Revision>> {
        self.newest_first(note_id).await
    }

    async fn prune(&self, note_id: NoteId, keep: usize) -> StoreResult<u64> {
        let doomed: Vec<String> = self
            .newest_first(note_id)
            .await?
            .into_iter()
            .skip(keep)
            .map(|r| r.id.to_string())
            .collect();
        if doomed.is_empty() {
            return Ok(0);
        }

        let mut revisions = self.collections.revisions().await?;
        for id in &doomed {
            revisions.remove(id);
        }
        self.collections.save_revisions(&revisions).await?;

        debug!(note_id = %note_id, pruned = doomed.len(), "Pruned revisions");
        Ok(doomed.len() as u64)
    }

    async fn delete_by_note(&self, note_id: NoteId) -> StoreResult<u64> {
        let mut revisions = self.collections.revisions().await?;
        let before = revisions.len();
        revisions.retain(|_, r| r.note_id != note_id);

        let deleted = (before - revisions.len()) as u64;
        if deleted > 0 {
            self.collections.save_revisions(&revisions).await?;
        }
        Ok(deleted)
    }
}
