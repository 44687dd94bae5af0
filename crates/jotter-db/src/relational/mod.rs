//! # Relational Adapter
//!
//! sqlx over SQLite, with every query assembled by [`sqlx::QueryBuilder`]
//! and the schema managed by the sqlx migrator.
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  RelationalProvider (Atomic)                                            │
//! │     │ begin() → pool.begin() → SqlContext::Transaction                  │
//! │     ▼                                                                   │
//! │  SqlContext ── Pool(SqlitePool) | Transaction(SharedTransaction)        │
//! │     │                                                                   │
//! │     ├── SqlNoteRepository      notes + note_tag_relations               │
//! │     ├── SqlTagRepository       tags, usage via LEFT JOIN                │
//! │     ├── SqlRevisionRepository  revisions                                │
//! │     ├── SqlNoteQueries         combined search                          │
//! │     └── SqlTagQueries          usage listing, name search               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod context;
mod note;
mod query;
mod revision;
mod tag;
mod unit_of_work;

pub use context::{SharedTransaction, SqlContext};
pub use note::SqlNoteRepository;
pub use query::{SqlNoteQueries, SqlTagQueries};
pub use revision::SqlRevisionRepository;
pub use tag::SqlTagRepository;
pub use unit_of_work::{RelationalProvider, RelationalUnitOfWork};
