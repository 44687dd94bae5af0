//! # Composition Root
//!
//! Turns a [`StorageConfig`] into a provider and repository bundle for the
//! selected backend.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  StorageConfig.backend                                                  │
//! │     ├── relational → Database::new(DbConfig)  → RelationalProvider      │
//! │     ├── embedded   → ConnectionRegistry::open → BestEffortProvider      │
//! │     └── key_value  → FileStore::open          → BestEffortProvider      │
//! │                                                                         │
//! │  Backend { provider, repositories, registry }                           │
//! │     └── note_service() → NoteService<dyn UnitOfWorkProvider>            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//! ```rust,ignore
//! let config = StorageConfig::load(None)?;
//! let backend = Backend::open(&config).await?;
//!
//! let notes = backend.note_service();
//! let note = notes.create_note().await?;
//! ```

use std::sync::Arc;

use tracing::info;

use jotter_core::{
    NoteService, Repositories, StoreResult, TransactionCapability, UnitOfWorkProvider,
};

use crate::config::{BackendKind, StorageConfig};
use crate::embedded::{self, ConnectionRegistry, EngineConnection};
use crate::keyvalue::{self, FileStore, KeyValueStore};
use crate::pool::{Database, DbConfig};

enum Handle {
    Relational(Database),
    Embedded(EngineConnection),
    KeyValue,
}

/// An opened backend.
pub struct Backend {
    kind: BackendKind,
    provider: Arc<dyn UnitOfWorkProvider>,
    repos: Repositories,
    registry: Arc<ConnectionRegistry>,
    handle: Handle,
    revision_keep_count: usize,
}

impl Backend {
    /// Opens the configured backend with a registry of its own.
    pub async fn open(config: &StorageConfig) -> StoreResult<Self> {
        Self::open_with_registry(config, Arc::new(ConnectionRegistry::new())).await
    }

    /// Opens the configured backend; embedded connections go through
    /// `registry`.
    pub async fn open_with_registry(
        config: &StorageConfig,
        registry: Arc<ConnectionRegistry>,
    ) -> StoreResult<Self> {
        info!(backend = %config.backend, "Opening storage backend");

        let (provider, repos, handle): (Arc<dyn UnitOfWorkProvider>, Repositories, Handle) =
            match config.backend {
                BackendKind::Relational => {
                    let db_config = DbConfig::new(&config.database_path)
                        .max_connections(config.max_connections)
                        .connect_timeout(config.connect_timeout());
                    let db = Database::new(db_config).await?;
                    (Arc::new(db.provider()), db.repositories(), Handle::Relational(db))
                }
                BackendKind::Embedded => {
                    let conn = registry.open(&config.database_path).await?;
                    (
                        Arc::new(embedded::provider(&conn)),
                        conn.repositories(),
                        Handle::Embedded(conn),
                    )
                }
                BackendKind::KeyValue => {
                    let store: Arc<dyn KeyValueStore> = Arc::new(
                        FileStore::open(&config.kv_directory, config.kv_quota_bytes).await?,
                    );
                    (
                        Arc::new(keyvalue::provider(Arc::clone(&store))),
                        keyvalue::repositories(store),
                        Handle::KeyValue,
                    )
                }
            };

        Ok(Backend {
            kind: config.backend,
            provider,
            repos,
            registry,
            handle,
            revision_keep_count: config.revision_keep_count,
        })
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn capability(&self) -> TransactionCapability {
        self.provider.capability()
    }

    pub fn provider(&self) -> Arc<dyn UnitOfWorkProvider> {
        Arc::clone(&self.provider)
    }

    /// Ports outside any unit of work.
    pub fn repositories(&self) -> Repositories {
        self.repos.clone()
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Note use-cases with the configured revision keep-count.
    pub fn note_service(&self) -> NoteService<dyn UnitOfWorkProvider> {
        NoteService::new(self.provider()).with_revision_keep_count(self.revision_keep_count)
    }

    /// Releases the pool or the embedded connection.
    pub async fn close(&self) {
        match &self.handle {
            Handle::Relational(db) => db.close().await,
            Handle::Embedded(_) => self.registry.close().await,
            Handle::KeyValue => {}
        }
        info!(backend = %self.kind, "Storage backend closed");
    }
}
