//! Cache entry type

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use super::message::Provider;
use super::response::ModelResponse;

/// Milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Accounting metadata attached to an entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Total tokens the cached response originally consumed
    pub tokens_used: u64,
    /// Estimated upstream cost of producing the response, in dollars
    pub estimated_cost: f64,
    /// Free-form tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// A cached response with full metadata.
///
/// Timestamps are epoch milliseconds; `ttl` is in seconds with `0` meaning
/// the entry never expires, and `expires_at == 0` iff `ttl == 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// 64-hex request fingerprint
    pub key: String,
    /// The cached response
    pub response: ModelResponse,
    /// Fingerprint of the normalized prompt text alone
    pub prompt_hash: String,
    /// Lowercased, trimmed model identifier
    pub model: String,
    /// Upstream provider
    pub provider: Provider,
    /// Canonical cache-sensitive parameter subset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    /// When the entry was created (ms)
    pub created_at: u64,
    /// When the entry was last read (ms)
    pub last_accessed_at: u64,
    /// Number of successful reads
    pub access_count: u64,
    /// Time-to-live in seconds; 0 = never expires
    pub ttl: u64,
    /// Absolute expiry (ms); 0 = never expires
    pub expires_at: u64,
    /// Estimated serialized length of the response in bytes
    pub size_bytes: u64,
    #[serde(default)]
    pub metadata: EntryMetadata,
}

impl CacheEntry {
    /// Whether the entry is expired at the given instant
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expires_at != 0 && now_ms >= self.expires_at
    }

    /// Whether the entry is expired now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_millis())
    }

    /// Record a successful read
    pub fn touch(&mut self, now_ms: u64) {
        self.last_accessed_at = now_ms.max(self.created_at);
        self.access_count += 1;
    }

    /// Remaining TTL in whole seconds; `None` when the entry never expires
    pub fn ttl_remaining_secs(&self, now_ms: u64) -> Option<u64> {
        if self.expires_at == 0 {
            return None;
        }
        Some(self.expires_at.saturating_sub(now_ms) / 1000)
    }
}
