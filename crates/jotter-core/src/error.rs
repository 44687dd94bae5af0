//! # Error Types
//!
//! The single error taxonomy every port returns.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  jotter-core errors (this file)                                         │
//! │  ├── StoreError        - What every port returns                        │
//! │  │   ├── NotFound      - lookup by id missed (services only)            │
//! │  │   ├── Validation    - bad value object (tag name, pagination)        │
//! │  │   ├── Storage       - engine failure, with a StorageErrorKind        │
//! │  │   └── Conflict      - unique constraint violations                   │
//! │  └── ValidationError   - Input validation failures                      │
//! │                                                                         │
//! │  jotter-db errors (separate crate, never leave it)                      │
//! │  ├── DbError           - sqlx / rusqlite failures                       │
//! │  └── KvError           - key-value store failures                       │
//! │                                                                         │
//! │  Flow: DbError / KvError → StoreError (at the port boundary)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repository lookups report a clean miss as `Ok(None)`. Empty collection
//! queries are a success with zero items. `NotFound` is raised by use-case
//! code that requires an entity to exist.

use std::fmt;

use thiserror::Error;

// =============================================================================
// Storage Error Kind
// =============================================================================

/// Sub-kind of a storage failure.
///
/// `QuotaExceeded` is user-actionable (free some space) and must never be
/// folded into the generic kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageErrorKind {
    /// The store refused a write because it is full.
    QuotaExceeded,
    /// Stored data could not be decoded (corrupted JSON, bad id, bad row).
    Corrupted,
    /// Opening or reaching the engine failed.
    Connection,
    /// Schema creation or migration failed.
    Migration,
    /// The engine did not answer in time.
    Timeout,
    /// Any other engine or file-system failure.
    Io,
}

impl fmt::Display for StorageErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StorageErrorKind::QuotaExceeded => "quota exceeded",
            StorageErrorKind::Corrupted => "corrupted data",
            StorageErrorKind::Connection => "connection",
            StorageErrorKind::Migration => "migration",
            StorageErrorKind::Timeout => "timeout",
            StorageErrorKind::Io => "io",
        };
        f.write_str(label)
    }
}

// =============================================================================
// Store Error
// =============================================================================

/// Error returned by every repository, query service and unit of work.
///
/// ## Partial Writes
/// A `Storage` error from a best-effort backend (embedded engine, key-value)
/// may describe a write sequence that stopped half way. Check
/// [`TransactionCapability`](crate::ports::TransactionCapability) before
/// assuming anything was undone.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A value object failed validation.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The storage engine failed.
    #[error("Storage error ({kind}): {message}")]
    Storage {
        kind: StorageErrorKind,
        message: String,
    },

    /// A uniqueness rule was violated.
    #[error("{entity} conflict: {message}")]
    Conflict {
        entity: &'static str,
        message: String,
    },
}

impl StoreError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Creates a Storage error of the given kind.
    pub fn storage(kind: StorageErrorKind, message: impl Into<String>) -> Self {
        StoreError::Storage {
            kind,
            message: message.into(),
        }
    }

    /// Creates a Storage error for undecodable stored data.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::storage(StorageErrorKind::Corrupted, message)
    }

    /// Returns the storage sub-kind, if this is a storage failure.
    pub fn storage_kind(&self) -> Option<StorageErrorKind> {
        match self {
            StoreError::Storage { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// True if the store rejected a write for lack of space.
    pub fn is_quota_exceeded(&self) -> bool {
        self.storage_kind() == Some(StorageErrorKind::QuotaExceeded)
    }

    /// True for a NotFound error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when a value object is constructed from bad input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid UUID, forbidden characters).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with StoreError.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = StoreError::not_found("Note", "0190a1b2");
        assert_eq!(err.to_string(), "Note not found: 0190a1b2");

        let err = StoreError::storage(StorageErrorKind::QuotaExceeded, "jotter.notes");
        assert_eq!(
            err.to_string(),
            "Storage error (quota exceeded): jotter.notes"
        );
    }

    #[test]
    fn test_quota_is_distinct_from_corruption() {
        let quota = StoreError::storage(StorageErrorKind::QuotaExceeded, "full");
        let corrupt = StoreError::corrupted("bad json");

        assert!(quota.is_quota_exceeded());
        assert!(!corrupt.is_quota_exceeded());
        assert_eq!(corrupt.storage_kind(), Some(StorageErrorKind::Corrupted));
    }

    #[test]
    fn test_validation_converts_to_store_error() {
        let validation_err = ValidationError::Required {
            field: "tag name".to_string(),
        };
        let err: StoreError = validation_err.into();
        assert!(matches!(err, StoreError::Validation(_)));
        assert_eq!(err.storage_kind(), None);
    }
}
