//! Filesystem cache backend
//!
//! One `<key>.json` file per entry under the configured directory. Reads
//! bump access metadata and persist the update before returning; quota
//! enforcement happens in a periodic cleanup pass, not on write.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;

use respcache_core::{
    compress, decompress, now_millis, CacheBackend, CacheEntry, CacheError, CacheEvent, DiskConfig,
    EntryMetadata, EventBus, EvictionReason, ModelResponse, Provider, Result,
};

/// Reserved key used by the health probe
pub const HEALTH_CHECK_KEY: &str = "__health_check__";

const ENTRY_SUFFIX: &str = ".json";

/// Filesystem cache backend
pub struct DiskBackend {
    config: DiskConfig,
    events: EventBus,
    cleanup_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl DiskBackend {
    /// Create the backend, its directory, and the periodic cleanup task.
    ///
    /// The task holds only a weak reference, so dropping the last handle
    /// ends it; `close` aborts it eagerly.
    pub async fn new(config: DiskConfig, events: EventBus) -> Result<Arc<Self>> {
        fs::create_dir_all(&config.cache_path).await?;
        let backend = Arc::new(Self {
            config,
            events,
            cleanup_task: Mutex::new(None),
        });
        Self::spawn_cleanup(&backend);
        Ok(backend)
    }

    fn spawn_cleanup(backend: &Arc<Self>) {
        let interval_secs = backend.config.cleanup_interval;
        if interval_secs == 0 {
            return;
        }
        let weak = Arc::downgrade(backend);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(backend) = weak.upgrade() else { break };
                if let Err(err) = backend.cleanup().await {
                    tracing::warn!(target: "respcache", error = %err, "disk cache cleanup failed");
                }
            }
        });
        *backend.cleanup_task.lock() = Some(handle);
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.config.cache_path.join(format!("{key}{ENTRY_SUFFIX}"))
    }

    /// Read and decode an entry; a malformed file is treated as absent and
    /// unlinked best-effort
    async fn read_entry(&self, key: &str) -> Result<Option<CacheEntry>> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(CacheError::Io(err.to_string())),
        };
        let bytes = decompress(&bytes)?;
        match serde_json::from_slice(&bytes) {
            Ok(entry) => Ok(Some(entry)),
            Err(err) => {
                tracing::warn!(target: "respcache", key, error = %err, "dropping undecodable cache file");
                let _ = fs::remove_file(&path).await;
                Ok(None)
            }
        }
    }

    async fn write_entry(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let bytes =
            serde_json::to_vec(entry).map_err(|e| CacheError::Serialization(e.to_string()))?;
        let bytes = if self.config.enable_compression {
            compress(&bytes)?
        } else {
            bytes
        };
        fs::write(self.entry_path(key), bytes).await?;
        Ok(())
    }

    /// Aggregate byte usage of all entry files
    async fn disk_usage(&self) -> Result<u64> {
        let mut total = 0u64;
        let mut dir = fs::read_dir(&self.config.cache_path).await?;
        while let Some(file) = dir.next_entry().await? {
            if file.file_name().to_string_lossy().ends_with(ENTRY_SUFFIX) {
                total += file.metadata().await?.len();
            }
        }
        Ok(total)
    }

    fn sentinel_entry() -> CacheEntry {
        let now = now_millis();
        CacheEntry {
            key: HEALTH_CHECK_KEY.to_string(),
            response: ModelResponse::text("ok"),
            prompt_hash: String::new(),
            model: String::new(),
            provider: Provider::OpenAi,
            parameters: None,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            ttl: 0,
            expires_at: 0,
            size_bytes: 2,
            metadata: EntryMetadata::default(),
        }
    }
}

#[async_trait]
impl CacheBackend for DiskBackend {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let Some(mut entry) = self.read_entry(key).await? else {
            return Ok(None);
        };
        let now = now_millis();
        if entry.is_expired_at(now) {
            let _ = fs::remove_file(self.entry_path(key)).await;
            self.events.emit(CacheEvent::Evict {
                key: key.to_string(),
                reason: EvictionReason::Ttl,
            });
            return Ok(None);
        }
        entry.touch(now);
        self.write_entry(key, &entry).await?;
        Ok(Some(entry))
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        self.write_entry(key, &entry).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(CacheError::Io(err.to_string())),
        }
    }

    async fn clear(&self) -> Result<()> {
        for key in self.keys().await? {
            let _ = fs::remove_file(self.entry_path(&key)).await;
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut dir = fs::read_dir(&self.config.cache_path).await?;
        while let Some(file) = dir.next_entry().await? {
            let name = file.file_name().to_string_lossy().into_owned();
            if let Some(key) = name.strip_suffix(ENTRY_SUFFIX) {
                keys.push(key.to_string());
            }
        }
        Ok(keys)
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.keys().await?.len())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        let Some(entry) = self.read_entry(key).await? else {
            return Ok(false);
        };
        if entry.is_expired_at(now_millis()) {
            let _ = fs::remove_file(self.entry_path(key)).await;
            self.events.emit(CacheEvent::Evict {
                key: key.to_string(),
                reason: EvictionReason::Ttl,
            });
            return Ok(false);
        }
        Ok(true)
    }

    async fn health_check(&self) -> Result<bool> {
        let sentinel = Self::sentinel_entry();
        self.write_entry(HEALTH_CHECK_KEY, &sentinel).await?;
        let read_back = self.read_entry(HEALTH_CHECK_KEY).await?;
        self.delete(HEALTH_CHECK_KEY).await?;
        Ok(read_back.is_some_and(|e| e.response.content == sentinel.response.content))
    }

    async fn close(&self) -> Result<()> {
        if let Some(task) = self.cleanup_task.lock().take() {
            task.abort();
        }
        Ok(())
    }

    /// Drop expired entries, then delete files in observed order until the
    /// directory is back under quota. Returns the expired count.
    async fn cleanup(&self) -> Result<u64> {
        let now = now_millis();
        let mut removed = 0u64;
        for key in self.keys().await? {
            if let Some(entry) = self.read_entry(&key).await? {
                if entry.is_expired_at(now) && self.delete(&key).await? {
                    removed += 1;
                    self.events.emit(CacheEvent::Evict {
                        key,
                        reason: EvictionReason::Ttl,
                    });
                }
            }
        }

        let mut usage = self.disk_usage().await?;
        if usage > self.config.max_disk_usage {
            for key in self.keys().await? {
                if usage <= self.config.max_disk_usage {
                    break;
                }
                let size = fs::metadata(self.entry_path(&key))
                    .await
                    .map(|m| m.len())
                    .unwrap_or(0);
                if self.delete(&key).await? {
                    usage = usage.saturating_sub(size);
                    self.events.emit(CacheEvent::Evict {
                        key,
                        reason: EvictionReason::Lru,
                    });
                }
            }
        }
        Ok(removed)
    }
}
