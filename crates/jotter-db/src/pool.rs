//! # Relational Pool
//!
//! The sqlx side of a Jotter database file.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  DbConfig ──► Database::new ──► SqlitePool ──► migrations               │
//! │                                     │                                   │
//! │                                     ├── repositories()  pool-bound ports│
//! │                                     └── provider()      one tx per unit │
//! │                                                                         │
//! │  file      : WAL, synchronous=NORMAL, foreign_keys=ON                   │
//! │  :memory:  : single pinned connection (each connection is its own db)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tracing::info;

use jotter_core::Repositories;

use crate::error::{DbError, DbResult};
use crate::migrations;
use crate::relational::{RelationalProvider, SqlContext};

const IN_MEMORY_PATH: &str = ":memory:";

/// Pool settings for one database file.
///
/// ```rust,ignore
/// let config = DbConfig::new("./jotter.db")
///     .max_connections(4)
///     .connect_timeout(Duration::from_secs(3));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,
    pub max_connections: u32,
    /// Bounds both the first connect and every later acquire.
    pub connect_timeout: Duration,
    /// `None` keeps idle connections forever.
    pub idle_timeout: Option<Duration>,
}

impl DbConfig {
    /// File database; created if missing.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 5,
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Some(Duration::from_secs(600)),
        }
    }

    /// Private in-memory database, mostly for tests.
    pub fn in_memory() -> Self {
        DbConfig {
            database_path: PathBuf::from(IN_MEMORY_PATH),
            max_connections: 1,
            connect_timeout: Duration::from_secs(5),
            idle_timeout: None,
        }
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_path == Path::new(IN_MEMORY_PATH)
    }

    fn connect_options(&self) -> DbResult<SqliteConnectOptions> {
        let options = if self.is_in_memory() {
            SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(|e| DbError::ConnectionFailed(e.to_string()))?
        } else {
            SqliteConnectOptions::new()
                .filename(&self.database_path)
                .journal_mode(SqliteJournalMode::Wal)
                .create_if_missing(true)
        };

        // Relations and revisions rely on ON DELETE CASCADE.
        Ok(options
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true))
    }

    fn pool_options(&self) -> SqlitePoolOptions {
        let options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(1)
            .acquire_timeout(self.connect_timeout)
            .idle_timeout(self.idle_timeout);

        if self.is_in_memory() {
            // Recycling the only connection would drop the whole database.
            options.max_connections(1).max_lifetime(None)
        } else {
            options
        }
    }
}

/// The relational backend: a migrated pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connects and brings the schema up to date.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening relational database");

        let pool = config
            .pool_options()
            .connect_with(config.connect_options()?)
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        migrations::run_migrations(&pool).await?;

        info!(max_connections = config.max_connections, "Relational database ready");
        Ok(Database { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Ports bound to the pool; every call runs on its own connection.
    pub fn repositories(&self) -> Repositories {
        SqlContext::Pool(self.pool.clone()).repositories()
    }

    /// Unit-of-work provider; every unit is one SQL transaction.
    pub fn provider(&self) -> RelationalProvider {
        RelationalProvider::new(self.pool.clone())
    }

    /// Closes the pool. Later calls through its repositories fail with a
    /// connection error.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Relational database closed");
    }

    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
