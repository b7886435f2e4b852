//! Core data types

mod config;
mod entry;
mod message;
mod params;
mod response;
mod stats;

pub use config::{BackendKind, CacheConfig, DiskConfig, KeyNormalization, NetworkConfig};
pub use entry::{now_millis, CacheEntry, EntryMetadata};
pub use message::{ChatMessage, ContentPart, MessageContent, Provider, Role};
pub use params::{GenerationParams, StopSequences};
pub use response::{ModelResponse, TokenUsage};
pub use stats::CacheStats;
