//! # Storage Error Types
//!
//! Adapter-internal error types and their translation into the port-level
//! [`StoreError`].
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  sqlx::Error / rusqlite::Error        std::io::Error / serde_json       │
//! │       │                                      │                          │
//! │       ▼                                      ▼                          │
//! │  DbError (this module)                KvError (this module)             │
//! │       │  adds categorization                 │  quota vs corruption     │
//! │       └──────────────────┬───────────────────┘                          │
//! │                          ▼                                              │
//! │  StoreError (jotter-core) ← the only error a port returns               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use jotter_core::{StorageErrorKind, StoreError};
use thiserror::Error;

// =============================================================================
// DbError
// =============================================================================

/// SQL engine errors (relational and embedded adapters).
#[derive(Debug, Error)]
pub enum DbError {
    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Saving a tag whose name another tag already has
    #[error("Duplicate {field}")]
    UniqueViolation { field: String },

    /// Foreign key constraint violation.
    ///
    /// ## When This Occurs
    /// - Linking a note to a tag id that does not exist
    /// - Saving a revision for a note that does not exist
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The engine reported a full disk or database.
    #[error("Database is full: {0}")]
    DiskFull(String),

    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created or opened
    /// - File permissions issue
    /// - The connection was closed by the registry
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// The file was written by a newer build.
    #[error("Unsupported schema version {found}; latest supported is {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },

    /// A stored row could not be decoded.
    #[error("Corrupted row: {0}")]
    Corrupted(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction failed or was already finished.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// An operation exceeded its deadline.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a Corrupted error for an undecodable column.
    pub fn corrupted(what: impl std::fmt::Display) -> Self {
        DbError::Corrupted(what.to_string())
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → Analyze message for constraint type
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::ColumnDecode   → DbError::Corrupted
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => classify_message(db_err.message()),

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(e) => DbError::ConnectionFailed(e.to_string()),

            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                DbError::Corrupted(err.to_string())
            }

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Convert rusqlite errors to DbError.
impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        match &err {
            rusqlite::Error::SqliteFailure(failure, message) => {
                let message = message.clone().unwrap_or_else(|| failure.to_string());
                match failure.code {
                    ErrorCode::ConstraintViolation => classify_message(&message),
                    ErrorCode::DiskFull => DbError::DiskFull(message),
                    ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => {
                        DbError::Timeout(message)
                    }
                    ErrorCode::CannotOpen | ErrorCode::PermissionDenied => {
                        DbError::ConnectionFailed(message)
                    }
                    ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => {
                        DbError::Corrupted(message)
                    }
                    _ => DbError::QueryFailed(message),
                }
            }

            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::InvalidColumnType(..)
            | rusqlite::Error::IntegralValueOutOfRange(..) => DbError::Corrupted(err.to_string()),

            _ => DbError::QueryFailed(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for DbError {
    fn from(err: tokio::task::JoinError) -> Self {
        DbError::Internal(format!("engine task failed: {err}"))
    }
}

/// SQLite reports constraint failures as text:
/// `UNIQUE constraint failed: <table>.<column>` and
/// `FOREIGN KEY constraint failed`.
fn classify_message(msg: &str) -> DbError {
    if msg.contains("UNIQUE constraint failed") {
        let field = msg
            .split("UNIQUE constraint failed: ")
            .nth(1)
            .unwrap_or("unknown")
            .to_string();
        DbError::UniqueViolation { field }
    } else if msg.contains("FOREIGN KEY constraint failed") {
        DbError::ForeignKeyViolation {
            message: msg.to_string(),
        }
    } else if msg.contains("database or disk is full") {
        DbError::DiskFull(msg.to_string())
    } else {
        DbError::QueryFailed(msg.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        let message = err.to_string();
        match err {
            DbError::UniqueViolation { field } => StoreError::Conflict {
                entity: if field.starts_with("tags.") { "Tag" } else { "Record" },
                message,
            },
            DbError::ForeignKeyViolation { .. } => StoreError::Conflict {
                entity: "Relation",
                message,
            },
            DbError::DiskFull(_) => StoreError::storage(StorageErrorKind::QuotaExceeded, message),
            DbError::ConnectionFailed(_) | DbError::PoolExhausted => {
                StoreError::storage(StorageErrorKind::Connection, message)
            }
            DbError::MigrationFailed(_) | DbError::UnsupportedSchemaVersion { .. } => {
                StoreError::storage(StorageErrorKind::Migration, message)
            }
            DbError::Corrupted(_) => StoreError::storage(StorageErrorKind::Corrupted, message),
            DbError::Timeout(_) => StoreError::storage(StorageErrorKind::Timeout, message),
            DbError::QueryFailed(_) | DbError::TransactionFailed(_) | DbError::Internal(_) => {
                StoreError::storage(StorageErrorKind::Io, message)
            }
        }
    }
}

// =============================================================================
// KvError
// =============================================================================

/// Key-value store errors.
///
/// Quota and corruption are separate variants so the user-actionable case
/// ("free some space") is never reported as a generic failure.
#[derive(Debug, Error)]
pub enum KvError {
    /// The store refused a write because it would exceed its quota.
    #[error("Quota exceeded writing {key}: {size} bytes would exceed {quota} bytes")]
    QuotaExceeded { key: String, size: u64, quota: u64 },

    /// The stored value is not valid JSON for its collection.
    #[error("Corrupted value under {key}: {message}")]
    Corrupted { key: String, message: String },

    /// A collection could not be encoded.
    #[error("Failed to encode {key}: {message}")]
    Encode { key: String, message: String },

    /// File-system failure of the file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for key-value operations.
pub type KvResult<T> = Result<T, KvError>;

impl From<KvError> for StoreError {
    fn from(err: KvError) -> Self {
        let message = err.to_string();
        match err {
            KvError::QuotaExceeded { .. } => {
                StoreError::storage(StorageErrorKind::QuotaExceeded, message)
            }
            KvError::Corrupted { .. } => StoreError::storage(StorageErrorKind::Corrupted, message),
            KvError::Encode { .. } | KvError::Io(_) => {
                StoreError::storage(StorageErrorKind::Io, message)
            }
        }
    }
}

// =============================================================================
// ConfigError
// =============================================================================

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

// =============================================================================
// Unit Tests
// =============================================================================
