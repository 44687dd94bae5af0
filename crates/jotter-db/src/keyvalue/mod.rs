//! # Key-Value Adapter
//!
//! Notes, tags, relations and revisions as JSON collections in a string
//! blob store.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  KeyValueStore ── MemoryStore (tests, throwaway sessions)               │
//! │       │         └ FileStore   (one file per key)                        │
//! │       ▼                                                                 │
//! │  Collections  read whole collection → mutate → write it back            │
//! │       │                                                                 │
//! │       ├── KvNoteRepository, KvTagRepository, KvRevisionRepository       │
//! │       └── KvNoteQueries, KvTagQueries    (filter/sort/slice in memory)  │
//! │                                                                         │
//! │  Unit of work: BestEffort, pass-through                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Known Hazard
//! Two writers doing read-modify-write on the same key can lose one update.
//! The adapter assumes a single writer.

use std::sync::Arc;

use jotter_core::Repositories;

mod collections;
mod note;
mod query;
mod revision;
mod store;
mod tag;

pub use collections::{Collections, NOTES_KEY, RELATIONS_KEY, REVISIONS_KEY, TAGS_KEY};
pub use note::KvNoteRepository;
pub use query::{KvNoteQueries, KvTagQueries};
pub use revision::KvRevisionRepository;
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use tag::KvTagRepository;

use crate::best_effort::BestEffortProvider;

/// All five ports over `store`.
pub fn repositories(store: Arc<dyn KeyValueStore>) -> Repositories {
    let collections = Collections::new(store);
    Repositories {
        notes: Arc::new(KvNoteRepository::new(collections.clone())),
        tags: Arc::new(KvTagRepository::new(collections.clone())),
        revisions: Arc::new(KvRevisionRepository::new(collections.clone())),
        note_queries: Arc::new(KvNoteQueries::new(collections.clone())),
        tag_queries: Arc::new(KvTagQueries::new(collections)),
    }
}

/// Best-effort unit-of-work provider over `store`.
pub fn provider(store: Arc<dyn KeyValueStore>) -> BestEffortProvider {
    BestEffortProvider::new("key_value", repositories(store))
}
