//! Cache backend trait

use async_trait::async_trait;
use crate::error::Result;
use crate::types::CacheEntry;

/// Core trait for all cache storage backends.
///
/// Implementations include the in-process LRU store, the filesystem store,
/// and the redis-backed distributed store. Absence of a key is `None`, not
/// an error; expired entries must be dropped before an operation reports on
/// them.
#[async_trait]
pub trait CacheBackend: Send + Sync + 'static {
    /// Get an entry.
    ///
    /// Returns `None` if the key doesn't exist or has expired (deleting the
    /// expired entry). A successful read updates `last_accessed_at` and
    /// `access_count` atomically with the retrieval.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Store an entry, replacing any existing entry for the key
    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()>;

    /// Delete a key.
    ///
    /// Returns `true` if the key existed and was deleted.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Remove all entries
    async fn clear(&self) -> Result<()>;

    /// All stored keys
    async fn keys(&self) -> Result<Vec<String>>;

    /// Current entry count
    async fn len(&self) -> Result<usize>;

    /// Whether a live (non-expired) entry exists for the key
    async fn contains(&self, key: &str) -> Result<bool>;

    /// Whether the backend can serve operations
    async fn health_check(&self) -> Result<bool>;

    /// Release resources; the backend must not be used afterwards
    async fn close(&self) -> Result<()>;

    /// Check if the store is empty
    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Remove expired entries and return how many were dropped.
    ///
    /// The default walks the key set and lets the lazy expiry in `get` do
    /// the removal; backends with a cheaper full scan override this.
    async fn cleanup(&self) -> Result<u64> {
        let before = self.len().await?;
        for key in self.keys().await? {
            let _ = self.get(&key).await?;
        }
        let after = self.len().await?;
        Ok(before.saturating_sub(after) as u64)
    }
}
