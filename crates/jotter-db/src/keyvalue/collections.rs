//! Stored shapes of the key-value collections.
//!
//! ## Keys
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────────────────┐
//! │ jotter.notes                 │ { "<note id>": NoteRecord, ... }         │
//! │ jotter.tags                  │ { "<tag id>": TagRecord, ... }           │
//! │ jotter.note_tag_relations    │ [ RelationRecord, ... ]                  │
//! │ jotter.revisions             │ { "<revision id>": RevisionRecord, ... } │
//! └──────────────────────────────┴──────────────────────────────────────────┘
//! ```
//! Every mutation reads a whole collection and writes it back.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use jotter_core::{Document, Note, NoteId, Revision, RevisionId, Tag, TagId, TagName};

use crate::error::{KvError, KvResult};

use super::store::KeyValueStore;

pub const NOTES_KEY: &str = "jotter.notes";
pub const TAGS_KEY: &str = "jotter.tags";
pub const RELATIONS_KEY: &str = "jotter.note_tag_relations";
pub const REVISIONS_KEY: &str = "jotter.revisions";

pub(crate) type NoteMap = BTreeMap<String, NoteRecord>;
pub(crate) type TagMap = BTreeMap<String, TagRecord>;
pub(crate) type RevisionMap = BTreeMap<String, RevisionRecord>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NoteRecord {
    pub id: NoteId,
    pub content: Document,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NoteRecord {
    pub fn from_note(note: &Note) -> Self {
        NoteRecord {
            id: note.id(),
            content: note.content().clone(),
            text: note.text().to_string(),
            created_at: note.created_at(),
            updated_at: note.updated_at(),
        }
    }

    pub fn into_note(self, tag_ids: BTreeSet<TagId>) -> Note {
        Note::restore(
            self.id,
            self.content,
            self.text,
            tag_ids,
            self.created_at,
            self.updated_at,
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TagRecord {
    pub id: TagId,
    pub name: TagName,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TagRecord {
    pub fn from_tag(tag: &Tag) -> Self {
        TagRecord {
            id: tag.id,
            name: tag.name.clone(),
            created_at: tag.created_at,
            updated_at: tag.updated_at,
        }
    }

    pub fn into_tag(self, usage: &HashMap<TagId, u32>) -> Tag {
        Tag {
            usage_count: usage.get(&self.id).copied().unwrap_or(0),
            id: self.id,
            name: self.name,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RelationRecord {
    pub note_id: NoteId,
    pub tag_id: TagId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RevisionRecord {
    pub id: RevisionId,
    pub note_id: NoteId,
    pub content: Document,
    pub saved_at: DateTime<Utc>,
}

impl RevisionRecord {
    pub fn from_revision(revision: &Revision) -> Self {
        RevisionRecord {
            id: revision.id,
            note_id: revision.note_id,
            content: revision.content.clone(),
            saved_at: revision.saved_at,
        }
    }

    pub fn into_revision(self) -> Revision {
        Revision {
            id: self.id,
            note_id: self.note_id,
            content: self.content,
            saved_at: self.saved_at,
        }
    }
}

/// Usage per tag, from the relation rows.
pub(crate) fn usage_counts(relations: &[RelationRecord]) -> HashMap<TagId, u32> {
    let mut usage = HashMap::new();
    for relation in relations {
        *usage.entry(relation.tag_id).or_insert(0) += 1;
    }
    usage
}

/// Tag set per note, from the relation rows.
pub(crate) fn tags_by_note(relations: &[RelationRecord]) -> HashMap<NoteId, BTreeSet<TagId>> {
    let mut tags: HashMap<NoteId, BTreeSet<TagId>> = HashMap::new();
    for relation in relations {
        tags.entry(relation.note_id)
            .or_default()
            .insert(relation.tag_id);
    }
    tags
}

/// Typed access to the four collections of one store.
#[derive(Clone)]
pub struct Collections {
    store: Arc<dyn KeyValueStore>,
}

impl Collections {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Collections { store }
    }

    async fn read<T: DeserializeOwned + Default>(&self, key: &'static str) -> KvResult<T> {
        let Some(raw) = self.store.get_item(key).await? else {
            return Ok(T::default());
        };

        serde_json::from_str(&raw).map_err(|e| KvError::Corrupted {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    async fn write<T: Serialize + Sync>(&self, key: &'static str, value: &T) -> KvResult<()> {
        let raw = serde_json::to_string(value).map_err(|e| KvError::Encode {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        self.store.set_item(key, raw).await
    }

    pub(crate) async fn notes(&self) -> KvResult<NoteMap> {
        self.read(NOTES_KEY).await
    }

    pub(crate) async fn save_notes(&self, notes: &NoteMap) -> KvResult<()> {
        self.write(NOTES_KEY, notes).await
    }

    pub(crate) async fn tags(&self) -> KvResult<TagMap> {
        self.read(TAGS_KEY).await
    }

    pub(crate) async fn save_tags(&self, tags: &TagMap) -> KvResult<()> {
        self.write(TAGS_KEY, tags).await
    }

    pub(crate) async fn relations(&self) -> KvResult<Vec<RelationRecord>> {
        self.read(RELATIONS_KEY).await
    }

    pub(crate) async fn save_relations(&self, relations: &[RelationRecord]) -> KvResult<()> {
        self.write(RELATIONS_KEY, &relations).await
    }

    pub(crate) async fn revisions(&self) -> KvResult<RevisionMap> {
        self.read(REVISIONS_KEY).await
    }

    pub(crate) async fn save_revisions(&self, revisions: &RevisionMap) -> KvResult<()> {
        self.write(REVISIONS_KEY, revisions).await
    }

    /// Every note with its tag set, unordered.
    pub(crate) async fn all_notes(&self) -> KvResult<Vec<Note>> {
        let notes = self.notes().await?;
        let mut tags = tags_by_note(&self.relations().await?);

        Ok(notes
            .into_values()
            .map(|record| {
                let tag_ids = tags.remove(&record.id).unwrap_or_default();
                record.into_note(tag_ids)
            })
            .collect())
    }

    /// Every tag with its live usage, unordered.
    pub(crate) async fn all_tags(&self) -> KvResult<Vec<Tag>> {
        let tags = self.tags().await?;
        let usage = usage_counts(&self.relations().await?);

        Ok(tags
            .into_values()
            .map(|record| record.into_tag(&usage))
            .collect())
    }
}
