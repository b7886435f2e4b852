//! respcache-core: Core traits and types for the respcache library
//!
//! This crate provides the foundational types, the deterministic key
//! generator, the event stream, and the backend contract used throughout
//! the respcache ecosystem.

mod compression;
mod error;
mod events;
mod key;
mod traits;
mod types;

pub use compression::{compress, decompress, is_compressed, MIN_COMPRESS_SIZE};
pub use error::{CacheError, Result};
pub use events::{CacheEvent, EventBus, EventKind, EvictionReason};
pub use key::{cache_params, is_valid_key, KeyGenerator};
pub use traits::*;
pub use types::*;
