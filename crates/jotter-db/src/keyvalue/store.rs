//! Blob stores behind the key-value adapter.
//!
//! A store maps string keys to string values and nothing more. Quotas are
//! counted in bytes of key plus value across every entry.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{KvError, KvResult};

/// String blob storage.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// `None` if nothing is stored under `key`.
    async fn get_item(&self, key: &str) -> KvResult<Option<String>>;

    /// Replaces the value under `key`.
    async fn set_item(&self, key: &str, value: String) -> KvResult<()>;

    /// Removes `key`. Missing keys are ignored.
    async fn remove_item(&self, key: &str) -> KvResult<()>;
}

fn check_quota(key: &str, used_elsewhere: u64, value_len: u64, quota: Option<u64>) -> KvResult<()> {
    let Some(quota) = quota else {
        return Ok(());
    };

    let size = used_elsewhere + key.len() as u64 + value_len;
    if size > quota {
        return Err(KvError::QuotaExceeded {
            key: key.to_string(),
            size,
            quota,
        });
    }
    Ok(())
}

// =============================================================================
// MemoryStore
// =============================================================================

/// In-process store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
    quota: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses writes once key plus value bytes would exceed
    /// `quota_bytes`.
    pub fn with_quota(quota_bytes: u64) -> Self {
        MemoryStore {
            items: Mutex::new(HashMap::new()),
            quota: Some(quota_bytes),
        }
    }

    /// Bytes currently stored, keys included.
    pub fn used_bytes(&self) -> u64 {
        self.items
            .lock()
            .iter()
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_item(&self, key: &str) -> KvResult<Option<String>> {
        Ok(self.items.lock().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: String) -> KvResult<()> {
        let mut items = self.items.lock();

        let used_elsewhere: u64 = items
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| (k.len() + v.len()) as u64)
            .sum();
        check_quota(key, used_elsewhere, value.len() as u64, self.quota)?;

        items.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> KvResult<()> {
        self.items.lock().remove(key);
        Ok(())
    }
}

// =============================================================================
// FileStore
// =============================================================================

const VALUE_EXTENSION: &str = "json";

/// One file per key inside a directory.
///
/// Values are written to a temporary file and renamed over the old one, so a
/// crash never leaves a half-written collection.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    quota: Option<u64>,
}

impl FileStore {
    /// Opens (creating if needed) the store directory.
    pub async fn open(dir: impl Into<PathBuf>, quota: Option<u64>) -> KvResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), ?quota, "Key-value directory ready");
        Ok(FileStore { dir, quota })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file_name: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{file_name}.{VALUE_EXTENSION}"))
    }

    async fn used_bytes_except(&self, skip: &Path) -> KvResult<u64> {
        let mut used = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path == skip || path.extension().and_then(|e| e.to_str()) != Some(VALUE_EXTENSION) {
                continue;
            }
            let key_len = path
                .file_stem()
                .map(|stem| stem.len() as u64)
                .unwrap_or_default();
            used += key_len + entry.metadata().await?.len();
        }
        Ok(used)
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_item(&self, key: &str) -> KvResult<Option<String>> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item(&self, key: &str, value: String) -> KvResult<()> {
        let path = self.path_for(key);

        if self.quota.is_some() {
            let used_elsewhere = self.used_bytes_except(&path).await?;
            check_quota(key, used_elsewhere, value.len() as u64, self.quota)?;
        }

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, value.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> KvResult<()> {
        match tokio::fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get_item("k").await.unwrap(), None);

        store.set_item("k", "v".to_string()).await.unwrap();
        assert_eq!(store.get_item("k").await.unwrap().as_deref(), Some("v"));

        store.remove_item("k").await.unwrap();
        store.remove_item("k").await.unwrap();
        assert_eq!(store.get_item("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_quota_counts_replacement_not_sum() {
        // "k" + 9 bytes = 10
        let store = MemoryStore::with_quota(10);
        store.set_item("k", "123456789".to_string()).await.unwrap();
        store.set_item("k", "987654321".to_string()).await.unwrap();

        let err = store.set_item("k", "0123456789".to_string()).await.unwrap_err();
        assert!(matches!(err, KvError::QuotaExceeded { size: 11, quota: 10, .. }));
        assert_eq!(store.get_item("k").await.unwrap().as_deref(), Some("987654321"));
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("kv"), None).await.unwrap();

        store.set_item("jotter.notes", "{}".to_string()).await.unwrap();
        assert_eq!(
            store.get_item("jotter.notes").await.unwrap().as_deref(),
            Some("{}")
        );
        assert!(store.dir().join("jotter.notes.json").exists());

        store.remove_item("jotter.notes").await.unwrap();
        assert_eq!(store.get_item("jotter.notes").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_quota() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path(), Some(32)).await.unwrap();

        store.set_item("a", "x".repeat(10)).await.unwrap();
        let err = store.set_item("b", "y".repeat(30)).await.unwrap_err();
        assert!(matches!(err, KvError::QuotaExceeded { .. }));
        assert_eq!(store.get_item("b").await.unwrap(), None);
    }
}
