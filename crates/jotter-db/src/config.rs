//! # Storage Configuration
//!
//! Which backend to open and where its data lives.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     JOTTER_BACKEND=embedded                                            │
//! │     JOTTER_DB_PATH=/data/jotter.db                                     │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/jotter/jotter.toml (Linux)                               │
//! │     ~/Library/Application Support/com.jotter.jotter/jotter.toml (macOS)│
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     relational backend, ./jotter.db                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # jotter.toml
//! backend = "embedded"          # relational | embedded | key_value
//! database_path = "/data/jotter.db"
//! kv_directory = "/data/kv"
//! kv_quota_bytes = 5242880
//! max_connections = 5
//! connect_timeout_secs = 10
//! revision_keep_count = 20
//! ```

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// Backend Kind
// =============================================================================

/// The storage backend to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// sqlx pool with real transactions.
    #[default]
    Relational,
    /// In-process engine with hand-written SQL.
    Embedded,
    /// Whole collections as JSON blobs.
    KeyValue,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Relational => write!(f, "relational"),
            BackendKind::Embedded => write!(f, "embedded"),
            BackendKind::KeyValue => write!(f, "key_value"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relational" | "sqlx" => Ok(BackendKind::Relational),
            "embedded" | "engine" => Ok(BackendKind::Embedded),
            "key_value" | "keyvalue" | "kv" => Ok(BackendKind::KeyValue),
            other => Err(ConfigError::Invalid(format!(
                "Unknown backend: '{}'. Valid options: relational, embedded, key_value",
                other
            ))),
        }
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

fn default_database_path() -> PathBuf {
    PathBuf::from("./jotter.db")
}

fn default_kv_directory() -> PathBuf {
    PathBuf::from("./jotter-kv")
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_revision_keep_count() -> usize {
    jotter_core::DEFAULT_REVISION_KEEP_COUNT
}

/// Complete storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// SQLite file for the relational and embedded backends.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Directory of the file-backed key-value store.
    #[serde(default = "default_kv_directory")]
    pub kv_directory: PathBuf,

    /// Optional byte quota of the key-value store.
    #[serde(default)]
    pub kv_quota_bytes: Option<u64>,

    /// Pool size of the relational backend.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Connect timeout of both SQL backends.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Revisions kept per note.
    #[serde(default = "default_revision_keep_count")]
    pub revision_keep_count: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            backend: BackendKind::default(),
            database_path: default_database_path(),
            kv_directory: default_kv_directory(),
            kv_quota_bytes: None,
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout(),
            revision_keep_count: default_revision_keep_count(),
        }
    }
}

impl StorageConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (jotter.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading storage config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load storage config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ConfigResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ConfigError::Invalid("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Storage config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_connections must be greater than 0".into(),
            ));
        }

        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_secs must be greater than 0".into(),
            ));
        }

        if self.revision_keep_count == 0 {
            return Err(ConfigError::Invalid(
                "revision_keep_count must be greater than 0".into(),
            ));
        }

        match self.backend {
            BackendKind::Relational | BackendKind::Embedded
                if self.database_path.as_os_str().is_empty() =>
            {
                Err(ConfigError::Invalid("database_path is required".into()))
            }
            BackendKind::KeyValue if self.kv_directory.as_os_str().is_empty() => {
                Err(ConfigError::Invalid("kv_directory is required".into()))
            }
            _ => Ok(()),
        }
    }

    /// Applies environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(backend) = std::env::var("JOTTER_BACKEND") {
            match backend.parse() {
                Ok(parsed) => {
                    debug!(backend = %backend, "Overriding backend from environment");
                    self.backend = parsed;
                }
                Err(e) => warn!(error = %e, "Ignoring JOTTER_BACKEND"),
            }
        }

        if let Ok(path) = std::env::var("JOTTER_DB_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database_path = PathBuf::from(path);
        }

        if let Ok(dir) = std::env::var("JOTTER_KV_DIR") {
            self.kv_directory = PathBuf::from(dir);
        }

        if let Ok(quota) = std::env::var("JOTTER_KV_QUOTA") {
            if let Ok(q) = quota.parse::<u64>() {
                self.kv_quota_bytes = Some(q);
            }
        }

        if let Ok(keep) = std::env::var("JOTTER_REVISION_KEEP") {
            if let Ok(k) = keep.parse::<usize>() {
                self.revision_keep_count = k;
            }
        }
    }

    /// Returns the default config file path.
    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "jotter", "jotter")
            .map(|dirs| dirs.config_dir().join("jotter.toml"))
    }

    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parsing() {
        assert_eq!("relational".parse::<BackendKind>().unwrap(), BackendKind::Relational);
        assert_eq!("Embedded".parse::<BackendKind>().unwrap(), BackendKind::Embedded);
        assert_eq!("kv".parse::<BackendKind>().unwrap(), BackendKind::KeyValue);
        assert!("postgres".parse::<BackendKind>().is_err());
    }

    #[test]
    fn test_default_config() {
        let config = StorageConfig::default();
        assert_eq!(config.backend, BackendKind::Relational);
        assert_eq!(config.revision_keep_count, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = StorageConfig::default();
        config.max_connections = 0;
        assert!(config.validate().is_err());

        config.max_connections = 1;
        config.backend = BackendKind::KeyValue;
        config.kv_directory = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_src = r#"
            backend = "key_value"
            kv_directory = "/tmp/jotter-kv"
            kv_quota_bytes = 1024
        "#;
        let config: StorageConfig = toml::from_str(toml_src).unwrap();

        assert_eq!(config.backend, BackendKind::KeyValue);
        assert_eq!(config.kv_quota_bytes, Some(1024));
        assert_eq!(config.max_connections, 5);

        let written = toml::to_string_pretty(&config).unwrap();
        let reparsed: StorageConfig = toml::from_str(&written).unwrap();
        assert_eq!(reparsed, config);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jotter.toml");
        std::fs::write(&path, "backend = \"embedded\"\nrevision_keep_count = 5\n").unwrap();

        let config = StorageConfig::load(Some(path)).unwrap();
        // Env overrides may be present on a developer machine; the file value
        // is only checked when none are.
        if std::env::var("JOTTER_BACKEND").is_err() {
            assert_eq!(config.backend, BackendKind::Embedded);
        }
        if std::env::var("JOTTER_REVISION_KEEP").is_err() {
            assert_eq!(config.revision_keep_count, 5);
        }
    }
}
