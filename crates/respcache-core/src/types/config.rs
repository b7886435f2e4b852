//! Cache configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{CacheError, Result};

/// Which store backs the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process LRU store
    Memory,
    /// Distributed store (redis)
    Network,
    /// Local filesystem store
    Disk,
}

/// Key normalization policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyNormalization {
    /// Collapse whitespace runs and trim before hashing
    pub normalize_whitespace: bool,
    /// Keep prompt casing; when false the prompt is lowercased
    pub case_sensitive: bool,
    /// Strip non-alphanumeric, non-whitespace characters
    pub ignore_punctuation: bool,
    /// Recursively sort parameter object keys before hashing
    pub sort_json_keys: bool,
}

impl Default for KeyNormalization {
    fn default() -> Self {
        Self {
            normalize_whitespace: true,
            case_sensitive: false,
            ignore_punctuation: false,
            sort_json_keys: true,
        }
    }
}

/// Connection settings for the distributed backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Logical database index
    pub db: i64,
    /// Prefix applied to every stored key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,
    /// Connect timeout in seconds
    pub connection_timeout: u64,
    /// Connection pool size
    pub pool_size: u32,
    /// Compress serialized entries before writing
    pub enable_compression: bool,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            db: 0,
            key_prefix: Some("respcache".to_string()),
            connection_timeout: 5,
            pool_size: 10,
            enable_compression: false,
        }
    }
}

impl NetworkConfig {
    /// Create config for a host/port pair
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the key prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    /// Connection URL in redis form
    pub fn url(&self) -> String {
        match &self.password {
            Some(password) => {
                format!("redis://:{}@{}:{}/{}", password, self.host, self.port, self.db)
            }
            None => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// Settings for the filesystem backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskConfig {
    /// Directory holding one file per entry
    pub cache_path: PathBuf,
    /// Seconds between quota/expiry sweeps
    pub cleanup_interval: u64,
    /// Aggregate byte quota for the directory
    pub max_disk_usage: u64,
    /// Compress serialized entries before writing
    pub enable_compression: bool,
}

impl Default for DiskConfig {
    fn default() -> Self {
        Self {
            cache_path: PathBuf::from(".respcache"),
            cleanup_interval: 300,
            max_disk_usage: 512 * 1024 * 1024,
            enable_compression: false,
        }
    }
}

/// Top-level cache configuration.
///
/// Immutable after manager construction; `validate` runs there and is the
/// one place a configuration error can surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// When false, every get is a miss and every set a no-op
    pub enabled: bool,
    /// LRU entry-count bound (memory backend)
    pub max_entries: usize,
    /// LRU byte bound (memory backend)
    pub max_size_bytes: u64,
    /// Default TTL in seconds; 0 = never expire
    pub default_ttl: u64,
    pub backend: BackendKind,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub disk: DiskConfig,
    /// Gates statistics updates (events are always emitted)
    pub enable_metrics: bool,
    #[serde(default)]
    pub key_normalization: KeyNormalization,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
            max_size_bytes: 100 * 1024 * 1024,
            default_ttl: 3600,
            backend: BackendKind::Memory,
            network: NetworkConfig::default(),
            disk: DiskConfig::default(),
            enable_metrics: true,
            key_normalization: KeyNormalization::default(),
        }
    }
}

impl CacheConfig {
    /// Default configuration over the given backend
    pub fn with_backend(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Default::default()
        }
    }

    /// Check the configuration for values no backend can honor
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(CacheError::Configuration(
                "max_entries must be positive".to_string(),
            ));
        }
        if self.max_size_bytes == 0 {
            return Err(CacheError::Configuration(
                "max_size_bytes must be positive".to_string(),
            ));
        }
        match self.backend {
            BackendKind::Memory => {}
            BackendKind::Network => {
                if self.network.host.is_empty() {
                    return Err(CacheError::Configuration(
                        "network backend requires a host".to_string(),
                    ));
                }
                if self.network.port == 0 {
                    return Err(CacheError::Configuration(
                        "network backend requires a port".to_string(),
                    ));
                }
            }
            BackendKind::Disk => {
                if self.disk.cache_path.as_os_str().is_empty() {
                    return Err(CacheError::Configuration(
                        "disk backend requires a cache path".to_string(),
                    ));
                }
                if self.disk.max_disk_usage == 0 {
                    return Err(CacheError::Configuration(
                        "disk backend requires a positive quota".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}
