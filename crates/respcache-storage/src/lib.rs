//! respcache-storage: Storage backends for respcache
//!
//! Provides the in-memory LRU backend, the filesystem backend, the
//! redis-backed distributed backend (behind the `redis` feature), and the
//! factory that builds whichever one the configuration selects.

mod disk;
mod factory;
mod memory;

#[cfg(feature = "redis")]
mod redis;

pub use disk::{DiskBackend, HEALTH_CHECK_KEY};
pub use factory::create_backend;
pub use memory::{LruStore, MemoryBackend, MemoryConfig};

#[cfg(feature = "redis")]
pub use redis::RedisBackend;
