//! # Connection Registry
//!
//! Keeps at most one embedded connection open and makes concurrent opens of
//! the same file share one attempt.
//!
//! ## Open Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  open(path)                                                             │
//! │     │                                                                   │
//! │     ├── slot.path == path → reuse slot.attempt                          │
//! │     └── otherwise         → retire previous attempt, new attempt        │
//! │     ▼                                                                   │
//! │  attempt.connect()                                                      │
//! │     ├── connection cached       → return it                             │
//! │     ├── open task pending       → await that task                       │
//! │     └── nothing yet             → spawn the open task, await it         │
//! │     ▼                                                                   │
//! │  task result                                                            │
//! │     ├── Ok, attempt live        → cached until retired                  │
//! │     ├── Ok, attempt retired     → close it, ConnectionFailed            │
//! │     └── Err                     → task cleared, next call tries again   │
//! │                                                                         │
//! │  each caller waits at most connect_timeout; the open task keeps going   │
//! │  and the next caller for the same path picks it up                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};

use super::connection::EngineConnection;
use super::EMBEDDED_CONNECT_TIMEOUT;

type OpenTask = JoinHandle<DbResult<EngineConnection>>;

#[derive(Default)]
struct AttemptState {
    conn: Option<EngineConnection>,
    retired: bool,
}

/// Everything the registry knows about one path, from the first open until
/// another path replaces it.
struct Attempt {
    path: PathBuf,
    /// Held across the await, so one open task runs per attempt.
    task: Mutex<Option<OpenTask>>,
    state: parking_lot::Mutex<AttemptState>,
}

impl Attempt {
    fn new(path: PathBuf) -> Self {
        Attempt {
            path,
            task: Mutex::new(None),
            state: parking_lot::Mutex::new(AttemptState::default()),
        }
    }

    async fn connect(&self, open_attempts: &AtomicUsize) -> DbResult<EngineConnection> {
        let mut task = self.task.lock().await;

        if let Some(conn) = self.established()? {
            return Ok(conn);
        }

        let pending = task.get_or_insert_with(|| {
            open_attempts.fetch_add(1, Ordering::SeqCst);
            let path = self.path.clone();
            tokio::task::spawn_blocking(move || EngineConnection::open(&path))
        });
        // Cancelling here leaves the task in the slot for the next caller.
        let result = pending.await;
        *task = None;

        self.settle(result??)
    }

    fn established(&self) -> DbResult<Option<EngineConnection>> {
        let state = self.state.lock();
        if state.retired {
            return Err(self.replaced());
        }
        Ok(state.conn.clone())
    }

    fn settle(&self, conn: EngineConnection) -> DbResult<EngineConnection> {
        let mut state = self.state.lock();
        if state.retired {
            drop(state);
            debug!(path = %self.path.display(), "Closing connection opened for a replaced path");
            conn.close();
            return Err(self.replaced());
        }
        state.conn = Some(conn.clone());
        Ok(conn)
    }

    /// Closes the connection, now or when the pending open finishes.
    fn retire(&self) {
        let conn = {
            let mut state = self.state.lock();
            state.retired = true;
            state.conn.take()
        };
        if let Some(conn) = conn {
            conn.close();
            return;
        }

        // A caller awaiting the task will see `retired` in `settle`. A task
        // nobody awaits any more (its caller timed out) is closed here.
        if let Ok(mut task) = self.task.try_lock() {
            if let Some(pending) = task.take() {
                let path = self.path.clone();
                tokio::spawn(async move {
                    if let Ok(Ok(conn)) = pending.await {
                        debug!(path = %path.display(), "Closing late connection");
                        conn.close();
                    }
                });
            }
        }
    }

    fn replaced(&self) -> DbError {
        DbError::ConnectionFailed(format!(
            "{} was replaced by another database",
            self.path.display()
        ))
    }
}

/// Owner of the embedded connection, held by the composition root.
pub struct ConnectionRegistry {
    slot: Mutex<Option<Arc<Attempt>>>,
    open_attempts: AtomicUsize,
    connect_timeout: Duration,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::with_connect_timeout(EMBEDDED_CONNECT_TIMEOUT)
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose callers give up after `timeout`.
    pub fn with_connect_timeout(timeout: Duration) -> Self {
        ConnectionRegistry {
            slot: Mutex::new(None),
            open_attempts: AtomicUsize::new(0),
            connect_timeout: timeout,
        }
    }

    /// Returns the connection for `path`, opening it if needed.
    ///
    /// Fails with `Timeout` when the open takes longer than the registry's
    /// connect timeout, and with `ConnectionFailed` when another path was
    /// opened before this one finished.
    pub async fn open(&self, path: impl AsRef<Path>) -> DbResult<EngineConnection> {
        let path = path.as_ref().to_path_buf();
        let attempt = self.attempt_for(&path).await;

        let connect = attempt.connect(&self.open_attempts);

        match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    path = %path.display(),
                    timeout_ms = self.connect_timeout.as_millis() as u64,
                    "Embedded open timed out"
                );
                Err(DbError::Timeout(format!(
                    "opening {} took longer than {:?}",
                    path.display(),
                    self.connect_timeout
                )))
            }
        }
    }

    async fn attempt_for(&self, path: &Path) -> Arc<Attempt> {
        let mut slot = self.slot.lock().await;

        if let Some(current) = slot.as_ref() {
            if current.path == path {
                debug!(path = %path.display(), "Reusing embedded connection");
                return Arc::clone(current);
            }
        }

        if let Some(previous) = slot.take() {
            info!(
                from = %previous.path.display(),
                to = %path.display(),
                "Switching embedded database"
            );
            previous.retire();
        }

        let attempt = Arc::new(Attempt::new(path.to_path_buf()));
        *slot = Some(Arc::clone(&attempt));
        attempt
    }

    /// Path of the current slot, open or still connecting.
    pub async fn current_path(&self) -> Option<PathBuf> {
        self.slot.lock().await.as_ref().map(|slot| slot.path.clone())
    }

    /// Closes the current connection, including one still being opened, and
    /// empties the slot.
    pub async fn close(&self) {
        if let Some(attempt) = self.slot.lock().await.take() {
            attempt.retire();
        }
    }

    /// Number of connection attempts started so far.
    pub fn open_attempts(&self) -> usize {
        self.open_attempts.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Keeps every other connection from reading `path` until dropped.
    fn hold_exclusive_lock(path: &Path) -> rusqlite::Connection {
        let conn = rusqlite::Connection::open(path).unwrap();
        conn.execute_batch("CREATE TABLE held (id INTEGER); BEGIN EXCLUSIVE;")
            .unwrap();
        conn
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_opens_share_one_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.db");
        let registry = Arc::new(ConnectionRegistry::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let path = path.clone();
                tokio::spawn(async move { registry.open(&path).await })
            })
            .collect();

        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_open());
        }
        assert_eq!(registry.open_attempts(), 1);
    }

    #[tokio::test]
    async fn test_same_path_returns_cached_connection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.db");
        let registry = ConnectionRegistry::new();

        registry.open(&path).await.unwrap();
        registry.open(&path).await.unwrap();

        assert_eq!(registry.open_attempts(), 1);
        assert_eq!(registry.current_path().await, Some(path));
    }

    #[tokio::test]
    async fn test_switching_path_closes_previous() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ConnectionRegistry::new();

        let first = registry.open(dir.path().join("a.db")).await.unwrap();
        let second = registry.open(dir.path().join("b.db")).await.unwrap();

        assert!(!first.is_open());
        assert!(second.is_open());
        assert_eq!(registry.open_attempts(), 2);
    }

    #[tokio::test]
    async fn test_failed_open_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be opened as a database file.
        let path = dir.path().join("occupied");
        std::fs::create_dir(&path).unwrap();

        let registry = ConnectionRegistry::new();
        assert!(registry.open(&path).await.is_err());
        assert!(registry.open(&path).await.is_err());
        assert_eq!(registry.open_attempts(), 2);
    }

    #[tokio::test]
    async fn test_close_empties_the_slot() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ConnectionRegistry::new();

        let conn = registry.open(dir.path().join("a.db")).await.unwrap();
        registry.close().await;

        assert!(!conn.is_open());
        assert_eq!(registry.current_path().await, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_switching_while_an_open_is_pending_closes_it() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.db");
        let b = dir.path().join("b.db");
        let held = hold_exclusive_lock(&a);
        let registry = Arc::new(ConnectionRegistry::new());

        let first = {
            let registry = Arc::clone(&registry);
            let a = a.clone();
            tokio::spawn(async move { registry.open(&a).await })
        };
        while registry.open_attempts() == 0 {
            tokio::task::yield_now().await;
        }

        let second = registry.open(&b).await.unwrap();
        drop(held);

        let err = first.await.unwrap().unwrap_err();
        assert!(matches!(err, DbError::ConnectionFailed(_)), "{err}");
        assert!(second.is_open());
        assert_eq!(registry.current_path().await, Some(b));
        assert_eq!(registry.open_attempts(), 2);

        registry.close().await;
        assert!(!second.is_open());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_retry_after_timeout_joins_the_pending_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slow.db");
        let held = hold_exclusive_lock(&path);
        let registry = ConnectionRegistry::with_connect_timeout(Duration::from_millis(500));

        let err = registry.open(&path).await.unwrap_err();
        assert!(matches!(err, DbError::Timeout(_)), "{err}");
        assert_eq!(registry.open_attempts(), 1);

        drop(held);
        let conn = registry.open(&path).await.unwrap();
        assert!(conn.is_open());
        assert_eq!(registry.open_attempts(), 1);
        assert_eq!(registry.current_path().await, Some(path));
    }
}
