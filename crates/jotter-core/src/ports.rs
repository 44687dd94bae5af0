//! # Ports
//!
//! Storage contracts every backend implements identically.
//!
//! ## Unit of Work Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     provider.run(|repos| ...)                           │
//! │                                                                         │
//! │  use-case                                                               │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  UnitOfWorkProvider::begin()                                            │
//! │     │   relational → BEGIN (sqlx::Transaction)                          │
//! │     │   embedded   → raw connection, autocommit                         │
//! │     │   key-value  → nothing                                            │
//! │     ▼                                                                   │
//! │  Repositories { notes, tags, revisions, note_queries, tag_queries }     │
//! │     │   every port bound to the same execution context                  │
//! │     ▼                                                                   │
//! │  f(repos).await                                                         │
//! │     ├── Ok  → commit()                                                  │
//! │     └── Err → rollback()  (only Atomic backends undo anything)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Ordering Rule for Best-Effort Backends
//! Multi-step workflows must leave valid state after any prefix of their
//! steps. Relations are removed before the entities they point at, and
//! repeating a step is harmless (deletes of missing rows succeed).

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::error::StoreResult;
use crate::types::{
    Note, NoteId, NoteOrderBy, NoteSearch, Page, Pagination, Revision, RevisionId, SortOrder, Tag,
    TagId, TagName, TagOrderBy,
};

// =============================================================================
// Repositories
// =============================================================================

/// Persistence of notes and their tag relations.
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Creates or replaces the note and rewrites its relation rows to exactly
    /// `note.tag_ids()`.
    async fn save(&self, note: &Note) -> StoreResult<()>;

    /// A clean miss is `Ok(None)`.
    async fn find_by_id(&self, id: NoteId) -> StoreResult<Option<Note>>;

    async fn find_all(
        &self,
        pagination: Pagination,
        order: SortOrder,
        order_by: NoteOrderBy,
    ) -> StoreResult<Page<Note>>;

    /// Deletes the note and its relations. Missing notes are ignored.
    async fn delete(&self, id: NoteId) -> StoreResult<()>;
}

/// Persistence of tags. Usage is computed from relations, never stored.
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// Creates or replaces the tag's name and timestamps.
    async fn save(&self, tag: &Tag) -> StoreResult<()>;

    async fn find_by_id(&self, id: TagId) -> StoreResult<Option<Tag>>;

    async fn find_by_name(&self, name: &TagName) -> StoreResult<Option<Tag>>;

    /// Tags among `ids` that exist, ordered by id.
    async fn find_by_ids(&self, ids: &[TagId]) -> StoreResult<Vec<Tag>>;

    async fn find_all(
        &self,
        pagination: Pagination,
        order: SortOrder,
        order_by: TagOrderBy,
    ) -> StoreResult<Page<Tag>>;

    /// Tags linked to no note, ordered by name.
    async fn find_unused(&self) -> StoreResult<Vec<Tag>>;

    /// Deletes the tag and its relations. Missing tags are ignored.
    async fn delete(&self, id: TagId) -> StoreResult<()>;

    /// Deletes several tags; returns how many existed.
    async fn delete_many(&self, ids: &[TagId]) -> StoreResult<u64>;
}

/// Persistence of revision snapshots.
#[async_trait]
pub trait RevisionRepository: Send + Sync {
    async fn save(&self, revision: &Revision) -> StoreResult<()>;

    async fn find_by_id(&self, id: RevisionId) -> StoreResult<Option<Revision>>;

    /// Newest first.
    async fn find_by_note(&self, note_id: NoteId) -> StoreResult<Vec<Revision>>;

    /// Keeps the newest `keep` revisions of the note; returns how many were
    /// deleted.
    async fn prune(&self, note_id: NoteId, keep: usize) -> StoreResult<u64>;

    async fn delete_by_note(&self, note_id: NoteId) -> StoreResult<u64>;
}

// =============================================================================
// Query Services
// =============================================================================

/// Cross-entity note queries.
#[async_trait]
pub trait NoteQueryService: Send + Sync {
    /// Text filter (case-insensitive substring) AND tag filter (superset),
    /// sorted with an id tie-break, then paginated. `count` is the number of
    /// matches before pagination.
    async fn combined_search(&self, search: &NoteSearch) -> StoreResult<Page<Note>>;
}

/// Cross-entity tag queries.
#[async_trait]
pub trait TagQueryService: Send + Sync {
    /// Every tag with its live usage; usage desc, name asc, id asc.
    async fn find_with_usage(&self) -> StoreResult<Vec<Tag>>;

    /// Tags whose name contains `fragment` (ASCII case-insensitive).
    async fn search_by_name(&self, fragment: &str, limit: u32) -> StoreResult<Vec<Tag>>;
}

// =============================================================================
// Unit of Work
// =============================================================================

/// What a backend guarantees for a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionCapability {
    /// All writes of a unit commit together or not at all.
    Atomic,
    /// Each write commits on its own; a failure can leave a partial write.
    BestEffort,
}

impl TransactionCapability {
    pub fn is_atomic(self) -> bool {
        matches!(self, TransactionCapability::Atomic)
    }
}

/// Every port bound to one execution context.
#[derive(Clone)]
pub struct Repositories {
    pub notes: Arc<dyn NoteRepository>,
    pub tags: Arc<dyn TagRepository>,
    pub revisions: Arc<dyn RevisionRepository>,
    pub note_queries: Arc<dyn NoteQueryService>,
    pub tag_queries: Arc<dyn TagQueryService>,
}

/// One open unit of work.
#[async_trait]
pub trait UnitOfWork: Send {
    fn repositories(&self) -> Repositories;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

/// Opens units of work against one backend.
#[async_trait]
pub trait UnitOfWorkProvider: Send + Sync {
    fn capability(&self) -> TransactionCapability;

    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;
}

/// `run(f)` on top of [`UnitOfWorkProvider::begin`].
///
/// ## Example
/// ```rust,ignore
/// let note = provider
///     .run(|repos| async move {
///         let note = Note::new(now());
///         repos.notes.save(&note).await?;
///         Ok(note)
///     })
///     .await?;
/// ```
pub trait UnitOfWorkExt: UnitOfWorkProvider {
    /// Runs `f` in a new unit of work; commits on `Ok`, rolls back on `Err`.
    fn run<T, F, Fut>(&self, f: F) -> impl Future<Output = StoreResult<T>> + Send
    where
        T: Send,
        F: FnOnce(Repositories) -> Fut + Send,
        Fut: Future<Output = StoreResult<T>> + Send,
    {
        async move {
            let uow = self.begin().await?;
            let repos = uow.repositories();

            match f(repos).await {
                Ok(value) => {
                    uow.commit().await?;
                    Ok(value)
                }
                Err(err) => {
                    if let Err(rollback_err) = uow.rollback().await {
                        warn!(error = %rollback_err, "Rollback failed");
                    }
                    Err(err)
                }
            }
        }
    }
}

impl<P: UnitOfWorkProvider + ?Sized> UnitOfWorkExt for P {}
