//! Cache event stream
//!
//! The manager and the backends publish operation-level events through a
//! shared [`EventBus`]. Observers register per event kind and receive a
//! stream of [`CacheEvent`] records; closed subscribers are pruned on the
//! next emission for their kind.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Why an entry left the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvictionReason {
    /// Removed to satisfy a capacity bound
    Lru,
    /// Removed because its TTL elapsed
    Ttl,
    /// Removed by an explicit delete
    Manual,
}

impl EvictionReason {
    /// Get reason as string label
    pub fn as_str(&self) -> &'static str {
        match self {
            EvictionReason::Lru => "lru",
            EvictionReason::Ttl => "ttl",
            EvictionReason::Manual => "manual",
        }
    }
}

/// An operation-level cache event
#[derive(Debug, Clone)]
pub enum CacheEvent {
    Hit { key: String, latency_ms: f64 },
    Miss { key: String },
    Set { key: String, size_bytes: u64 },
    Evict { key: String, reason: EvictionReason },
    Clear,
    BackendError { message: String },
}

/// Event kind, used for subscription registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Hit,
    Miss,
    Set,
    Evict,
    Clear,
    BackendError,
}

impl CacheEvent {
    /// The kind this event registers under
    pub fn kind(&self) -> EventKind {
        match self {
            CacheEvent::Hit { .. } => EventKind::Hit,
            CacheEvent::Miss { .. } => EventKind::Miss,
            CacheEvent::Set { .. } => EventKind::Set,
            CacheEvent::Evict { .. } => EventKind::Evict,
            CacheEvent::Clear => EventKind::Clear,
            CacheEvent::BackendError { .. } => EventKind::BackendError,
        }
    }
}

/// Fan-out hub for cache events.
///
/// Cloning creates a new handle to the SAME subscriber registry, so the
/// manager and every backend share one bus. Emission never blocks: senders
/// are unbounded and dead receivers are dropped from the registry.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<DashMap<EventKind, Vec<mpsc::UnboundedSender<CacheEvent>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for one event kind
    pub fn subscribe(&self, kind: EventKind) -> mpsc::UnboundedReceiver<CacheEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.entry(kind).or_default().push(tx);
        rx
    }

    /// Publish an event to every live observer of its kind
    pub fn emit(&self, event: CacheEvent) {
        self.log(&event);
        if let Some(mut senders) = self.subscribers.get_mut(&event.kind()) {
            senders.retain(|tx| tx.send(event.clone()).is_ok());
        }
    }

    /// Number of live subscriptions for a kind
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers.get(&kind).map_or(0, |s| s.len())
    }

    fn log(&self, event: &CacheEvent) {
        match event {
            CacheEvent::Hit { key, latency_ms } => {
                tracing::debug!(target: "respcache", event = "hit", key = %key, latency_ms, "cache hit");
            }
            CacheEvent::Miss { key } => {
                tracing::debug!(target: "respcache", event = "miss", key = %key, "cache miss");
            }
            CacheEvent::Set { key, size_bytes } => {
                tracing::debug!(target: "respcache", event = "set", key = %key, size_bytes, "cache set");
            }
            CacheEvent::Evict { key, reason } => {
                tracing::debug!(target: "respcache", event = "evict", key = %key, reason = reason.as_str(), "cache evict");
            }
            CacheEvent::Clear => {
                tracing::debug!(target: "respcache", event = "clear", "cache cleared");
            }
            CacheEvent::BackendError { message } => {
                tracing::warn!(target: "respcache", event = "backend_error", %message, "cache backend error");
            }
        }
    }
}
