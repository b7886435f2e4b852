//! respcache: Response caching for generative-AI gateways
//!
//! # Features
//!
//! - **Deterministic request fingerprinting** (messages + model + provider +
//!   generation parameters, with configurable normalization)
//! - **Pluggable backends**: in-memory dual-bound LRU, filesystem, redis
//! - **TTL expiration** with lazy eviction and a periodic sweeper
//! - **Operation-level event stream** and statistics
//! - **Cache warming** from a declarative query list
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use respcache::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let cache = ResponseCacheManager::new(CacheConfig::default()).await?;
//!
//!     let messages = vec![ChatMessage::user("Hello, world!")];
//!     cache
//!         .set(&messages, "gpt-3.5-turbo", Provider::OpenAi, "Hi there!".into(), None, None)
//!         .await;
//!
//!     let lookup = cache
//!         .get(&messages, "gpt-3.5-turbo", Provider::OpenAi, None, false)
//!         .await;
//!     if lookup.hit {
//!         println!("cached: {}", lookup.data.map(|r| r.content).unwrap_or_default());
//!     }
//!     Ok(())
//! }
//! ```

mod manager;
mod snapshot;
mod warmer;

// Re-export core
pub use respcache_core::*;

// Re-export storage
pub use respcache_storage::{create_backend, DiskBackend, MemoryBackend, MemoryConfig, HEALTH_CHECK_KEY};

#[cfg(feature = "redis")]
pub use respcache_storage::RedisBackend;

// Export manager, snapshot, and warmer
pub use manager::{CacheLookup, ResponseCacheManager};
pub use snapshot::{CacheSnapshot, SNAPSHOT_VERSION};
pub use warmer::{CacheWarmer, WarmerConfig, WarmupQuery, WarmupReport};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BackendKind, CacheConfig, CacheError, CacheEvent, CacheLookup, CacheStats, ChatMessage,
        EventKind, EvictionReason, GenerationParams, KeyNormalization, ModelResponse, Provider,
        ResponseCacheManager, ResponseFetcher, Result, Role, TokenUsage, WarmupQuery,
    };
    pub use crate::{CacheWarmer, WarmerConfig, WarmupReport};

    #[cfg(feature = "redis")]
    pub use crate::RedisBackend;
}

#[cfg(test)]
mod tests;
