//! # jotter-core: Domain Model and Storage Ports for Jotter
//!
//! Jotter is a local-first note app. This crate holds the note/tag/revision
//! model and the storage contracts that every backend in `jotter-db`
//! implements identically.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Jotter Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Editor UI                                    │   │
//! │  │    Note list ──► Editor ──► Tag sidebar ──► History            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ jotter-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │ document  │  │   ports   │  │  service  │  │   │
//! │  │   │ Note, Tag │  │ text proj │  │ repos, UoW│  │ use-cases │  │   │
//! │  │   │ Revision  │  │ #hashtags │  │ queries   │  │ tag sync  │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO FILE SYSTEM                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    jotter-db (Storage Backends)                 │   │
//! │  │        relational (sqlx) • embedded (rusqlite) • key-value      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Note, Tag, Revision, Pagination, NoteSearch)
//! - [`document`] - Editor documents and their plain-text projection
//! - [`ports`] - Repository, query and unit-of-work traits
//! - [`service`] - Use-cases on top of the ports
//! - [`error`] - The storage error taxonomy
//! - [`validation`] - Value-object rules
//!
//! ## Example Usage
//!
//! ```rust
//! use jotter_core::{Document, Note, NoteSearch, Pagination};
//!
//! let mut note = Note::new(jotter_core::now());
//! note.set_content(Document::from_plain_text("Apple pie #dessert"), jotter_core::now());
//!
//! assert_eq!(note.text(), "Apple pie #dessert");
//! assert!(NoteSearch::new(Pagination::first(20)).query("apple").matches(&note));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod document;
pub mod error;
pub mod ports;
pub mod service;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use document::{extract_tag_names, Document};
pub use error::{StorageErrorKind, StoreError, StoreResult, ValidationError};
pub use ports::{
    NoteQueryService, NoteRepository, Repositories, RevisionRepository, TagQueryService,
    TagRepository, TransactionCapability, UnitOfWork, UnitOfWorkExt, UnitOfWorkProvider,
};
pub use service::NoteService;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum tag name length, in characters.
pub const TAG_NAME_MAX_CHARS: usize = 50;

/// Revisions kept per note unless configured otherwise.
pub const DEFAULT_REVISION_KEEP_COUNT: usize = 20;
