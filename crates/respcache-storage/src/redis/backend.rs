//! Redis-backed distributed cache backend
//!
//! Entries are serialized as JSON (optionally zstd-compressed) and TTL is
//! enforced server-side with `SET .. EX`. Access metadata is bumped on read
//! and written back with the remaining TTL, so the behaviors observable
//! through the manager mirror the memory backend.

use async_trait::async_trait;
use bb8::{Pool, PooledConnection};
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

use respcache_core::{
    compress, decompress, now_millis, CacheBackend, CacheEntry, CacheError, CacheEvent, EventBus,
    EvictionReason, NetworkConfig, Result,
};

/// Redis backend implementation
#[derive(Clone)]
pub struct RedisBackend {
    pool: Pool<RedisConnectionManager>,
    config: NetworkConfig,
    events: EventBus,
}

impl RedisBackend {
    /// Create a new redis backend; connections are established lazily by
    /// the pool
    pub async fn new(config: NetworkConfig, events: EventBus) -> Result<Self> {
        let manager = RedisConnectionManager::new(config.url().as_str())
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(Duration::from_secs(config.connection_timeout))
            .build(manager)
            .await
            .map_err(|e| CacheError::Connection(e.to_string()))?;

        Ok(Self {
            pool,
            config,
            events,
        })
    }

    fn prefixed_key(&self, key: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => format!("{prefix}:{key}"),
            None => key.to_string(),
        }
    }

    fn strip_prefix(&self, raw: &str) -> String {
        match &self.config.key_prefix {
            Some(prefix) => raw
                .strip_prefix(&format!("{prefix}:"))
                .unwrap_or(raw)
                .to_string(),
            None => raw.to_string(),
        }
    }

    async fn get_connection(&self) -> Result<PooledConnection<'_, RedisConnectionManager>> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::Unavailable(e.to_string()))
    }

    fn encode(&self, entry: &CacheEntry) -> Result<Vec<u8>> {
        let bytes =
            serde_json::to_vec(entry).map_err(|e| CacheError::Serialization(e.to_string()))?;
        if self.config.enable_compression {
            compress(&bytes)
        } else {
            Ok(bytes)
        }
    }

    fn decode(&self, data: &[u8]) -> Result<CacheEntry> {
        let bytes = decompress(data)?;
        serde_json::from_slice(&bytes).map_err(|e| CacheError::Deserialization(e.to_string()))
    }

    /// Write an entry under its remaining server-side TTL
    async fn write_entry(&self, key: &str, entry: &CacheEntry) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let prefixed = self.prefixed_key(key);
        let bytes = self.encode(entry)?;

        match entry.ttl_remaining_secs(now_millis()) {
            Some(remaining) => {
                let _: () = conn
                    .set_ex(&prefixed, &bytes, remaining.max(1))
                    .await
                    .map_err(|e| CacheError::Backend(e.to_string()))?;
            }
            None => {
                let _: () = conn
                    .set(&prefixed, &bytes)
                    .await
                    .map_err(|e| CacheError::Backend(e.to_string()))?;
            }
        }
        Ok(())
    }

    /// SCAN all keys under the configured prefix (prefixed form)
    async fn scan_keys(&self) -> Result<Vec<String>> {
        let mut conn = self.get_connection().await?;
        let match_pattern = match &self.config.key_prefix {
            Some(prefix) => format!("{prefix}:*"),
            None => "*".to_string(),
        };

        let mut found = Vec::new();
        let mut cursor = 0u64;
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .cursor_arg(cursor)
                .arg("MATCH")
                .arg(&match_pattern)
                .arg("COUNT")
                .arg(1000)
                .query_async(&mut *conn)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?;

            found.extend(keys);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        Ok(found)
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let prefixed = self.prefixed_key(key);
        let bytes: Option<Vec<u8>> = {
            let mut conn = self.get_connection().await?;
            conn.get(&prefixed)
                .await
                .map_err(|e| CacheError::Backend(e.to_string()))?
        };

        let Some(data) = bytes else { return Ok(None) };

        let mut entry = match self.decode(&data) {
            Ok(entry) => entry,
            Err(CacheError::Deserialization(err)) => {
                // Malformed on-wire entry: treat as absent, drop the key
                tracing::warn!(target: "respcache", key, error = %err, "dropping undecodable redis entry");
                let _ = self.delete(key).await;
                return Ok(None);
            }
            Err(err) => return Err(err),
        };

        let now = now_millis();
        if entry.is_expired_at(now) {
            let _ = self.delete(key).await;
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
        let mut conn = self.get_connection().await?;
        let prefixed = self.prefixed_key(key);

        conn.del(&prefixed)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn clear(&self) -> Result<()> {
        let keys = self.scan_keys().await?;
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.get_connection().await?;
        let _: usize = conn
            .unlink(&keys)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self
            .scan_keys()
            .await?
            .iter()
            .map(|raw| self.strip_prefix(raw))
            .collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.scan_keys().await?.len())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let prefixed = self.prefixed_key(key);

        conn.exists(&prefixed)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))
    }

    async fn health_check(&self) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING")
            .query_async(&mut *conn)
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?;
        Ok(pong == "PONG")
    }

    async fn close(&self) -> Result<()> {
        // The pool tears down idle connections on drop
        Ok(())
    }
}
