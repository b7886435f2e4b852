//! Portable cache snapshots
//!
//! A snapshot captures configuration, entries, and statistics in a stable
//! JSON document, so a cache can be exported on one host and replayed on
//! another. Import writes entries straight through the backend; expired
//! ones fall out lazily on first read.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

use respcache_core::{
    now_millis, CacheConfig, CacheEntry, CacheError, CacheEvent, CacheStats, Result,
};

use crate::manager::ResponseCacheManager;

/// Snapshot format version
pub const SNAPSHOT_VERSION: &str = "1.0.0";

/// A portable snapshot of a cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub version: String,
    /// When the snapshot was taken (ms)
    pub timestamp: u64,
    pub config: CacheConfig,
    pub entries: Vec<CacheEntry>,
    pub stats: CacheStats,
}

impl ResponseCacheManager {
    /// Write a snapshot of the whole cache to `path`
    pub async fn export_cache(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut entries = Vec::new();
        for key in self.backend().keys().await? {
            if let Some(entry) = self.backend().get(&key).await? {
                entries.push(entry);
            }
        }

        let mut stats = self.stats_recorder().snapshot();
        stats.entries = entries.len() as u64;

        let snapshot = CacheSnapshot {
            version: SNAPSHOT_VERSION.to_string(),
            timestamp: now_millis(),
            config: self.config().clone(),
            entries,
            stats,
        };

        let bytes = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        fs::write(path, bytes).await?;
        Ok(())
    }

    /// Replay a snapshot's entries into this cache.
    ///
    /// Returns the number of entries imported; per-entry backend failures
    /// surface as `backend:error` events and skip the entry.
    pub async fn import_cache(&self, path: impl AsRef<Path>) -> Result<u64> {
        let bytes = fs::read(path).await?;
        let snapshot: CacheSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| CacheError::Deserialization(e.to_string()))?;

        tracing::debug!(
            target: "respcache",
            version = %snapshot.version,
            entries = snapshot.entries.len(),
            "importing cache snapshot"
        );

        let mut imported = 0u64;
        for entry in snapshot.entries {
            let key = entry.key.clone();
            let size_bytes = entry.size_bytes;
            match self.backend().set(&key, entry).await {
                Ok(()) => {
                    imported += 1;
                    self.events().emit(CacheEvent::Set { key, size_bytes });
                }
                Err(err) => self.events().emit(CacheEvent::BackendError {
                    message: err.to_string(),
                }),
            }
        }
        Ok(imported)
    }
}
