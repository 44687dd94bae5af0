//! One rusqlite connection shared by the embedded repositories.
//!
//! rusqlite is blocking, so every call hops onto the blocking pool with
//! `spawn_blocking` and runs against the connection behind a mutex.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{error, info, warn};

use jotter_core::Repositories;

use crate::error::{DbError, DbResult};

use super::note::EngineNoteRepository;
use super::query::{EngineNoteQueries, EngineTagQueries};
use super::revision::EngineRevisionRepository;
use super::schema;
use super::tag::EngineTagRepository;

const IN_MEMORY_PATH: &str = ":memory:";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to an open, migrated embedded database.
///
/// Clones share the connection. Once [`EngineConnection::close`] runs, every
/// call on every clone fails with `ConnectionFailed`.
#[derive(Clone)]
pub struct EngineConnection {
    path: PathBuf,
    inner: Arc<Mutex<Option<Connection>>>,
}

impl std::fmt::Debug for EngineConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConnection")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

impl EngineConnection {
    /// Opens (creating if needed) the database file and brings its schema up
    /// to date. Blocking.
    pub fn open(path: &Path) -> DbResult<Self> {
        let started_at = Instant::now();
        info!(path = %path.display(), "Opening embedded database");

        let conn = if path == Path::new(IN_MEMORY_PATH) {
            Connection::open_in_memory()
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbError::ConnectionFailed(format!("{}: {e}", parent.display())))?;
            }
            Connection::open(path)
        };

        let mut conn = conn.map_err(|e| {
            error!(path = %path.display(), error = %e, "Embedded open failed");
            DbError::ConnectionFailed(format!("{}: {e}", path.display()))
        })?;

        bootstrap(&mut conn)?;

        info!(
            path = %path.display(),
            duration_ms = started_at.elapsed().as_millis() as u64,
            "Embedded database ready"
        );

        Ok(EngineConnection {
            path: path.to_path_buf(),
            inner: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// A private in-memory database.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::open(Path::new(IN_MEMORY_PATH))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Runs `f` against the connection on the blocking pool.
    pub async fn call<T, F>(&self, f: F) -> DbResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> DbResult<T> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let mut slot = inner.lock();
            let conn = slot.as_mut().ok_or_else(|| {
                DbError::ConnectionFailed(format!("{} is closed", path.display()))
            })?;
            f(conn)
        })
        .await?
    }

    /// Closes the connection for every clone of this handle.
    pub fn close(&self) {
        let Some(conn) = self.inner.lock().take() else {
            return;
        };

        match conn.close() {
            Ok(()) => info!(path = %self.path.display(), "Embedded database closed"),
            Err((_, e)) => warn!(path = %self.path.display(), error = %e, "Embedded close failed"),
        }
    }

    /// All five ports bound to this connection.
    pub fn repositories(&self) -> Repositories {
        Repositories {
            notes: Arc::new(EngineNoteRepository::new(self.clone())),
            tags: Arc::new(EngineTagRepository::new(self.clone())),
            revisions: Arc::new(EngineRevisionRepository::new(self.clone())),
            note_queries: Arc::new(EngineNoteQueries::new(self.clone())),
            tag_queries: Arc::new(EngineTagQueries::new(self.clone())),
        }
    }
}

fn bootstrap(conn: &mut Connection) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    schema::migrate(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_runs_on_the_connection() {
        let conn = EngineConnection::open_in_memory().unwrap();
        let one: i64 = conn
            .call(|c| Ok(c.query_row("SELECT 1", [], |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn test_closed_connection_rejects_calls() {
        let conn = EngineConnection::open_in_memory().unwrap();
        let clone = conn.clone();
        conn.close();

        assert!(!clone.is_open());
        let err = clone.call(|_| Ok(())).await.unwrap_err();
        assert!(matches!(err, DbError::ConnectionFailed(_)));
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("notes.db");

        let conn = EngineConnection::open(&path).unwrap();
        assert!(path.exists());
        conn.close();
    }
}
