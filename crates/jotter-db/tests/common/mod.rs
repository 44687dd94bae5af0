//! Shared fixtures: one harness per backend, all behind the same ports.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tempfile::TempDir;

use jotter_core::{
    from_millis, Document, Note, NoteId, NoteService, Repositories, Tag, TagId, TagName,
    TransactionCapability, UnitOfWorkProvider,
};
use jotter_db::embedded;
use jotter_db::keyvalue;
use jotter_db::{ConnectionRegistry, Database, DbConfig, KeyValueStore, MemoryStore};

/// One opened backend.
pub struct Harness {
    pub name: &'static str,
    pub provider: Arc<dyn UnitOfWorkProvider>,
    pub repos: Repositories,
    _registry: Option<Arc<ConnectionRegistry>>,
    _dir: Option<TempDir>,
}

impl Harness {
    pub fn service(&self) -> NoteService<dyn UnitOfWorkProvider> {
        NoteService::new(Arc::clone(&self.provider))
    }

    pub fn capability(&self) -> TransactionCapability {
        self.provider.capability()
    }
}

pub async fn relational() -> Harness {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    Harness {
        name: "relational",
        provider: Arc::new(db.provider()),
        repos: db.repositories(),
        _registry: None,
        _dir: None,
    }
}

pub async fn embedded() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let registry = Arc::new(ConnectionRegistry::new());
    let conn = registry.open(dir.path().join("jotter.db")).await.unwrap();
    let provider = embedded::provider(&conn);
    Harness {
        name: "embedded",
        repos: provider.repositories(),
        provider: Arc::new(provider),
        _registry: Some(registry),
        _dir: Some(dir),
    }
}

pub fn key_value_over(store: Arc<dyn KeyValueStore>) -> Harness {
    let provider = keyvalue::provider(store);
    Harness {
        name: "key_value",
        repos: provider.repositories(),
        provider: Arc::new(provider),
        _registry: None,
        _dir: None,
    }
}

pub fn key_value() -> Harness {
    key_value_over(Arc::new(MemoryStore::new()))
}

/// Every backend, freshly opened and empty.
pub async fn all() -> Vec<Harness> {
    vec![relational().await, embedded().await, key_value()]
}

pub fn at(millis: i64) -> DateTime<Utc> {
    from_millis(millis).unwrap()
}

pub fn tag_name(name: &str) -> TagName {
    TagName::parse(name).unwrap()
}

/// Stores a tag named `name`.
pub async fn tag(repos: &Repositories, name: &str) -> Tag {
    let tag = Tag::new(tag_name(name), at(1_000));
    repos.tags.save(&tag).await.unwrap();
    tag
}

/// Stores a note with fixed timestamps, plain-text content and tags.
pub async fn note(
    repos: &Repositories,
    text: &str,
    tags: &[&Tag],
    created: i64,
    updated: i64,
) -> Note {
    note_with_id(repos, NoteId::new(), text, tags, created, updated).await
}

pub async fn note_with_id(
    repos: &Repositories,
    id: NoteId,
    text: &str,
    tags: &[&Tag],
    created: i64,
    updated: i64,
) -> Note {
    let content = Document::from_plain_text(text);
    let tag_ids: BTreeSet<TagId> = tags.iter().map(|t| t.id).collect();
    let note = Note::restore(
        id,
        content.clone(),
        content.plain_text(),
        tag_ids,
        at(created),
        at(updated),
    );
    repos.notes.save(&note).await.unwrap();
    note
}

pub fn ids(notes: &[Note]) -> Vec<NoteId> {
    notes.iter().map(Note::id).collect()
}
