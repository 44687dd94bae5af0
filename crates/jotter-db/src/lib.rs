//! # jotter-db: Storage Adapters for Jotter
//!
//! Three interchangeable implementations of the `jotter-core` ports.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Jotter Data Flow                                 │
//! │                                                                         │
//! │  NoteService (jotter-core)                                              │
//! │       │  ports only                                                     │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     jotter-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────────┐   ┌──────────────┐   ┌──────────────┐       │   │
//! │  │   │  relational  │   │   embedded   │   │   keyvalue   │       │   │
//! │  │   │  sqlx pool   │   │   rusqlite   │   │  JSON blobs  │       │   │
//! │  │   │  Atomic      │   │  BestEffort  │   │  BestEffort  │       │   │
//! │  │   └──────────────┘   └──────────────┘   └──────────────┘       │   │
//! │  │          ▲                  ▲                  ▲               │   │
//! │  │          └────────── backend::Backend ─────────┘               │   │
//! │  │                     (StorageConfig)                            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  jotter.db (SQLite, shared schema)  or  jotter-kv/*.json               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`relational`] - sqlx repositories, transactions
//! - [`embedded`] - rusqlite repositories, connection registry, schema upgrades
//! - [`keyvalue`] - blob stores and collection repositories
//! - [`backend`] - composition root
//! - [`config`] - storage configuration
//! - [`pool`] / [`migrations`] - relational pool and sqlx migrations
//! - [`error`] - adapter error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use jotter_db::{Backend, StorageConfig};
//!
//! let backend = Backend::open(&StorageConfig::load(None)?).await?;
//! let notes = backend.note_service();
//!
//! let note = notes.create_note().await?;
//! notes.update_content(note.id(), Document::from_plain_text("Hello #world")).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backend;
pub mod best_effort;
pub mod config;
pub mod embedded;
pub mod error;
pub mod keyvalue;
pub mod migrations;
pub mod pool;
pub mod relational;

mod rows;

// =============================================================================
// Re-exports
// =============================================================================

pub use backend::Backend;
pub use best_effort::BestEffortProvider;
pub use config::{BackendKind, StorageConfig};
pub use embedded::{ConnectionRegistry, EngineConnection};
pub use error::{ConfigError, DbError, KvError};
pub use keyvalue::{FileStore, KeyValueStore, MemoryStore};
pub use pool::{Database, DbConfig};
pub use relational::{RelationalProvider, SqlContext};
