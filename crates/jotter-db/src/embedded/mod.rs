//! # Embedded-Engine Adapter
//!
//! The relational model reached through rusqlite with hand-written SQL. The
//! adapter owns its connection lifecycle ([`ConnectionRegistry`]) and its
//! schema upgrades (`schema`).
//!
//! ## Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ConnectionRegistry ──open(path)──► EngineConnection                    │
//! │                                        │  Arc<Mutex<Option<Connection>>>│
//! │                                        │  call(f) → spawn_blocking      │
//! │                                        ▼                                │
//! │      EngineNoteRepository, EngineTagRepository,                         │
//! │      EngineRevisionRepository, EngineNoteQueries, EngineTagQueries      │
//! │                                                                         │
//! │  Unit of work: BestEffort, every statement autocommits                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

mod connection;
mod note;
mod query;
mod registry;
mod revision;
mod schema;
mod tag;

pub use connection::EngineConnection;
pub use note::EngineNoteRepository;
pub use query::{EngineNoteQueries, EngineTagQueries};
pub use registry::ConnectionRegistry;
pub use revision::EngineRevisionRepository;
pub use tag::EngineTagRepository;

use crate::best_effort::BestEffortProvider;

/// Newest schema this build reads and writes.
pub const LATEST_SCHEMA_VERSION: i64 = 3;

/// Upper bound on opening and migrating an embedded database.
pub const EMBEDDED_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Best-effort unit-of-work provider over `conn`.
pub fn provider(conn: &EngineConnection) -> BestEffortProvider {
    BestEffortProvider::new("embedded", conn.repositories())
}

/// `?, ?, ...` with `n` placeholders.
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders() {
        assert_eq!(placeholders(1), "?");
        assert_eq!(placeholders(3), "?, ?, ?");
    }
}
