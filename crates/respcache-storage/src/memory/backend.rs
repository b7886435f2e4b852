//! In-memory LRU cache backend

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use respcache_core::{
    now_millis, CacheBackend, CacheEntry, CacheEvent, EventBus, EvictionReason, Result,
};

use super::lru::LruStore;

/// Configuration for the memory backend
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Maximum number of entries
    pub max_entries: usize,
    /// Maximum byte total across all entries
    pub max_size_bytes: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_size_bytes: 100 * 1024 * 1024,
        }
    }
}

impl MemoryConfig {
    /// Create config with a specific entry capacity
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            max_entries,
            ..Default::default()
        }
    }
}

/// In-memory cache backend: constant-time LRU with count and byte bounds.
///
/// The map, list, and byte counter form one critical section behind a single
/// mutex, so list position, map membership, and size totals always agree.
/// Cloning creates a new handle to the SAME underlying store.
#[derive(Clone)]
pub struct MemoryBackend {
    store: Arc<Mutex<LruStore>>,
    config: MemoryConfig,
    events: EventBus,
}

impl MemoryBackend {
    /// Create a new memory backend publishing to the given event bus
    pub fn new(config: MemoryConfig, events: EventBus) -> Self {
        Self {
            store: Arc::new(Mutex::new(LruStore::new())),
            config,
            events,
        }
    }

    /// Byte total of all live entries
    pub fn current_size_bytes(&self) -> u64 {
        self.store.lock().current_size()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let now = now_millis();
        let mut store = self.store.lock();

        if store.peek(key).is_some_and(|e| e.is_expired_at(now)) {
            store.remove(key);
            drop(store);
            self.events.emit(CacheEvent::Evict {
                key: key.to_string(),
                reason: EvictionReason::Ttl,
            });
            return Ok(None);
        }

        match store.get_mut(key) {
            Some(entry) => {
                entry.touch(now);
                Ok(Some(entry.clone()))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, entry: CacheEntry) -> Result<()> {
        let size = entry.size_bytes;
        let mut store = self.store.lock();
        let mut evicted = Vec::new();

        // Capacity is enforced before admitting a NEW key; replacing an
        // existing key adjusts the byte total in place. If the list drains
        // and an oversized entry still does not fit, it is admitted anyway.
        if !store.contains_key(key) {
            while store.len() >= self.config.max_entries
                || store.current_size().saturating_add(size) > self.config.max_size_bytes
            {
                match store.pop_lru() {
                    Some((victim, _)) => evicted.push(victim),
                    None => break,
                }
            }
        }

        store.insert(key.to_string(), entry);
        drop(store);

        for victim in evicted {
            self.events.emit(CacheEvent::Evict {
                key: victim,
                reason: EvictionReason::Lru,
            });
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.store.lock().remove(key).is_some())
    }

    async fn clear(&self) -> Result<()> {
        self.store.lock().clear();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>> {
        Ok(self.store.lock().keys())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.store.lock().len())
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        let now = now_millis();
        let mut store = self.store.lock();
        if store.peek(key).is_some_and(|e| e.is_expired_at(now)) {
            store.remove(key);
            drop(store);
            self.events.emit(CacheEvent::Evict {
                key: key.to_string(),
                reason: EvictionReason::Ttl,
            });
            return Ok(false);
        }
        Ok(store.contains_key(key))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn close(&self) -> Result<()> {
        self.store.lock().clear();
        Ok(())
    }

    async fn cleanup(&self) -> Result<u64> {
        let now = now_millis();
        let mut store = self.store.lock();
        let expired = store.expired_keys(now);
        for key in &expired {
            store.remove(key);
        }
        drop(store);

        let count = expired.len() as u64;
        for key in expired {
            self.events.emit(CacheEvent::Evict {
                key,
                reason: EvictionReason::Ttl,
            });
        }
        Ok(count)
    }
}
