//! Backend construction from configuration

use std::sync::Arc;

use respcache_core::{BackendKind, CacheBackend, CacheConfig, EventBus, Result};

use crate::disk::DiskBackend;
use crate::memory::{MemoryBackend, MemoryConfig};

/// Build the backend the configuration selects, sharing the given event bus.
///
/// The `network` kind requires the `redis` cargo feature; without it the
/// selection is a configuration error rather than a silent fallback.
pub async fn create_backend(
    config: &CacheConfig,
    events: EventBus,
) -> Result<Arc<dyn CacheBackend>> {
    match config.backend {
        BackendKind::Memory => {
            let memory = MemoryConfig {
                max_entries: config.max_entries,
                max_size_bytes: config.max_size_bytes,
            };
            Ok(Arc::new(MemoryBackend::new(memory, events)))
        }
        BackendKind::Disk => {
            let backend = DiskBackend::new(config.disk.clone(), events).await?;
            Ok(backend)
        }
        #[cfg(feature = "redis")]
        BackendKind::Network => {
            let backend = crate::redis::RedisBackend::new(config.network.clone(), events).await?;
            Ok(Arc::new(backend))
        }
        #[cfg(not(feature = "redis"))]
        BackendKind::Network => Err(respcache_core::CacheError::Configuration(
            "network backend requires the `redis` feature".to_string(),
        )),
    }
}
