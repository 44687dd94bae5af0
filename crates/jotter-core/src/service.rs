//! # Note Service
//!
//! Thin use-case orchestration over the ports. Every method runs inside one
//! unit of work.
//!
//! ## Tag Sync
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  update_content(id, doc)                                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  note.set_content(doc)          text projection recomputed              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  doc.tag_names()                ["recipe", "dessert"]                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  find_by_name / save            find-or-create each tag                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  note.set_tag_ids(..)           relation set = extraction result        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  notes.save(note)               relations rewritten, usage follows      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A tag whose usage drops to zero stays until [`NoteService::cleanup_unused_tags`].
//! If a best-effort backend stops half way, the leftovers are unused tags,
//! which the next cleanup removes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::document::Document;
use crate::error::{StoreError, StoreResult};
use crate::ports::{Repositories, UnitOfWorkExt, UnitOfWorkProvider};
use crate::types::{now, Note, NoteId, NoteSearch, Page, Revision, RevisionId, Tag, TagId};
use crate::DEFAULT_REVISION_KEEP_COUNT;

/// Note use-cases over any backend.
pub struct NoteService<P: ?Sized> {
    provider: Arc<P>,
    revision_keep_count: usize,
}

impl<P: ?Sized> Clone for NoteService<P> {
    fn clone(&self) -> Self {
        NoteService {
            provider: Arc::clone(&self.provider),
            revision_keep_count: self.revision_keep_count,
        }
    }
}

impl<P: UnitOfWorkProvider + ?Sized> NoteService<P> {
    pub fn new(provider: Arc<P>) -> Self {
        NoteService {
            provider,
            revision_keep_count: DEFAULT_REVISION_KEEP_COUNT,
        }
    }

    /// Sets how many revisions are kept per note.
    pub fn with_revision_keep_count(mut self, keep: usize) -> Self {
        self.revision_keep_count = keep;
        self
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Creates and stores an empty note.
    pub async fn create_note(&self) -> StoreResult<Note> {
        self.provider
            .run(|repos| async move {
                let note = Note::new(now());
                repos.notes.save(&note).await?;
                debug!(note_id = %note.id(), "Created note");
                Ok(note)
            })
            .await
    }

    /// Loads a note that must exist.
    pub async fn get_note(&self, id: NoteId) -> StoreResult<Note> {
        self.provider
            .run(move |repos| async move { require_note(&repos, id).await })
            .await
    }

    /// Replaces a note's content and syncs its tags.
    pub async fn update_content(&self, id: NoteId, content: Document) -> StoreResult<Note> {
        self.provider
            .run(move |repos| async move {
                let mut note = require_note(&repos, id).await?;
                let now = now();
                note.set_content(content, now);
                sync_tags(&repos, &mut note, now).await?;
                repos.notes.save(&note).await?;
                Ok(note)
            })
            .await
    }

    /// Deletes a note, its relations, and its revisions.
    pub async fn delete_note(&self, id: NoteId) -> StoreResult<()> {
        self.provider
            .run(move |repos| async move {
                repos.notes.delete(id).await?;
                let pruned = repos.revisions.delete_by_note(id).await?;
                debug!(note_id = %id, revisions = pruned, "Deleted note");
                Ok(())
            })
            .await
    }

    /// Combined text + tag search.
    pub async fn search(&self, search: NoteSearch) -> StoreResult<Page<Note>> {
        self.provider
            .run(move |repos| async move { repos.note_queries.combined_search(&search).await })
            .await
    }

    /// Snapshots the note's current content and prunes old snapshots.
    pub async fn save_revision(&self, id: NoteId) -> StoreResult<Revision> {
        let keep = self.revision_keep_count;
        self.provider
            .run(move |repos| async move {
                let note = require_note(&repos, id).await?;
                let revision = Revision::snapshot(&note, now());
                repos.revisions.save(&revision).await?;
                let pruned = repos.revisions.prune(id, keep).await?;
                debug!(note_id = %id, revision_id = %revision.id, pruned, "Saved revision");
                Ok(revision)
            })
            .await
    }

    /// Revisions of a note, newest first.
    pub async fn revisions(&self, id: NoteId) -> StoreResult<Vec<Revision>> {
        self.provider
            .run(move |repos| async move { repos.revisions.find_by_note(id).await })
            .await
    }

    /// Puts a revision's content back on its note.
    pub async fn restore_revision(&self, revision_id: RevisionId) -> StoreResult<Note> {
        let revision = self
            .provider
            .run(move |repos| async move {
                repos
                    .revisions
                    .find_by_id(revision_id)
                    .await?
                    .ok_or_else(|| StoreError::not_found("Revision", revision_id))
            })
            .await?;

        self.update_content(revision.note_id, revision.content).await
    }

    /// Deletes every tag no note links to. Returns how many were removed.
    pub async fn cleanup_unused_tags(&self) -> StoreResult<u64> {
        self.provider
            .run(|repos| async move {
                let unused: Vec<TagId> = repos
                    .tags
                    .find_unused()
                    .await?
                    .into_iter()
                    .map(|tag| tag.id)
                    .collect();

                if unused.is_empty() {
                    return Ok(0);
                }

                let removed = repos.tags.delete_many(&unused).await?;
                info!(removed, "Cleaned up unused tags");
                Ok(removed)
            })
            .await
    }
}

async fn require_note(repos: &Repositories, id: NoteId) -> StoreResult<Note> {
    repos
        .notes
        .find_by_id(id)
        .await?
        .ok_or_else(|| StoreError::not_found("Note", id))
}

/// Finds or creates every tag the content references and makes the note's
/// tag set match exactly.
async fn sync_tags(repos: &Repositories, note: &mut Note, now: DateTime<Utc>) -> StoreResult<()> {
    let mut tag_ids = Vec::new();

    for name in note.content().tag_names() {
        let tag = match repos.tags.find_by_name(&name).await? {
            Some(tag) => tag,
            None => {
                let tag = Tag::new(name, now);
                repos.tags.save(&tag).await?;
                debug!(tag_id = %tag.id, name = %tag.name, "Created tag");
                tag
            }
        };
        tag_ids.push(tag.id);
    }

    if note.set_tag_ids(tag_ids) {
        debug!(note_id = %note.id(), tags = note.tag_ids().len(), "Tag set changed");
    }
    Ok(())
}
