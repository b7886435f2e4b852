//! High-level cache manager
//!
//! Orchestrates the key generator, the configured backend, the event
//! stream, and the statistics. Every read/write operation is infallible at
//! the caller boundary: backend failures surface as `backend:error` events
//! plus a miss or no-op, so a degraded cache behaves like an absent cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

use respcache_core::{
    cache_params, now_millis, CacheBackend, CacheConfig, CacheEntry, CacheEvent, CacheStats,
    ChatMessage, EntryMetadata, EventBus, EventKind, EvictionReason, GenerationParams,
    KeyGenerator, ModelResponse, Provider, Result, TokenUsage,
};
use respcache_storage::create_backend;

mod stats;
use stats::StatsRecorder;

/// How often the sweeper removes expired entries
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Cost estimation rates, dollars per 1K tokens
const INPUT_RATE_PER_1K: f64 = 0.0015;
const OUTPUT_RATE_PER_1K: f64 = 0.002;

/// Result of a cache lookup
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub hit: bool,
    /// The cached response on a hit
    pub data: Option<ModelResponse>,
    /// The full entry on a hit
    pub entry: Option<CacheEntry>,
    /// Wall-clock time the lookup took
    pub latency_ms: f64,
}

impl CacheLookup {
    fn miss(latency_ms: f64) -> Self {
        Self {
            hit: false,
            data: None,
            entry: None,
            latency_ms,
        }
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn estimate_cost(usage: &TokenUsage) -> f64 {
    (usage.prompt_tokens as f64 / 1000.0) * INPUT_RATE_PER_1K
        + (usage.completion_tokens as f64 / 1000.0) * OUTPUT_RATE_PER_1K
}

/// Response cache manager.
///
/// Construction validates the configuration and builds the selected
/// backend; that is the only point a `CacheError` reaches the caller.
pub struct ResponseCacheManager {
    config: CacheConfig,
    keygen: KeyGenerator,
    backend: Arc<dyn CacheBackend>,
    stats: Arc<StatsRecorder>,
    events: EventBus,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ResponseCacheManager {
    /// Build the manager, its backend, the sweeper, and the stats observer
    pub async fn new(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let events = EventBus::new();
        let backend = create_backend(&config, events.clone()).await?;
        Self::with_backend(config, backend, events)
    }

    /// Build the manager over a caller-provided backend.
    ///
    /// The backend should publish to the same `events` bus so its evictions
    /// reach subscribers and the statistics.
    pub fn with_backend(
        config: CacheConfig,
        backend: Arc<dyn CacheBackend>,
        events: EventBus,
    ) -> Result<Self> {
        config.validate()?;

        let manager = Self {
            keygen: KeyGenerator::new(config.key_normalization),
            config,
            backend,
            stats: Arc::new(StatsRecorder::new()),
            events,
            tasks: Mutex::new(Vec::new()),
        };
        manager.spawn_sweeper();
        if manager.config.enable_metrics {
            manager.spawn_eviction_observer();
        }
        Ok(manager)
    }

    /// Register an observer for one event kind
    pub fn subscribe(&self, kind: EventKind) -> UnboundedReceiver<CacheEvent> {
        self.events.subscribe(kind)
    }

    /// Derive the cache key this manager would use for a request
    pub fn key_for(
        &self,
        messages: &[ChatMessage],
        model: &str,
        provider: Provider,
        params: Option<&GenerationParams>,
    ) -> String {
        self.keygen.generate(messages, model, provider, params)
    }

    /// Look up a cached response.
    ///
    /// `bypass` skips the backend entirely and reports a miss.
    pub async fn get(
        &self,
        messages: &[ChatMessage],
        model: &str,
        provider: Provider,
        params: Option<&GenerationParams>,
        bypass: bool,
    ) -> CacheLookup {
        let start = Instant::now();
        if !self.config.enabled || bypass {
            return CacheLookup::miss(elapsed_ms(start));
        }

        let key = self.keygen.generate(messages, model, provider, params);
        match self.backend.get(&key).await {
            Ok(Some(entry)) => {
                let latency_ms = elapsed_ms(start);
                if self.config.enable_metrics {
                    self.stats.record_hit(latency_ms);
                    self.stats
                        .record_savings(entry.metadata.tokens_used, entry.metadata.estimated_cost);
                }
                self.events.emit(CacheEvent::Hit {
                    key,
                    latency_ms,
                });
                CacheLookup {
                    hit: true,
                    data: Some(entry.response.clone()),
                    entry: Some(entry),
                    latency_ms,
                }
            }
            Ok(None) => {
                let latency_ms = elapsed_ms(start);
                if self.config.enable_metrics {
                    self.stats.record_miss(latency_ms);
                }
                self.events.emit(CacheEvent::Miss { key });
                CacheLookup::miss(latency_ms)
            }
            Err(err) => {
                self.events.emit(CacheEvent::BackendError {
                    message: err.to_string(),
                });
                CacheLookup::miss(elapsed_ms(start))
            }
        }
    }

    /// Store a response.
    ///
    /// `ttl` (seconds) overrides the configured default; `0` means never
    /// expire. No-op when caching is disabled; backend failures surface as
    /// `backend:error` events only.
    pub async fn set(
        &self,
        messages: &[ChatMessage],
        model: &str,
        provider: Provider,
        response: ModelResponse,
        params: Option<&GenerationParams>,
        ttl: Option<u64>,
    ) {
        if !self.config.enabled {
            return;
        }

        let key = self.keygen.generate(messages, model, provider, params);
        let prompt_hash = self.keygen.prompt_hash(messages);
        let size_bytes = serde_json::to_vec(&response)
            .map(|bytes| bytes.len() as u64)
            .unwrap_or(response.content.len() as u64);

        let ttl = ttl.unwrap_or(self.config.default_ttl);
        let now = now_millis();
        let expires_at = if ttl > 0 { now + ttl * 1000 } else { 0 };

        let (tokens_used, estimated_cost) = match &response.usage {
            Some(usage) => (usage.total_tokens, estimate_cost(usage)),
            None => (0, 0.0),
        };

        let entry = CacheEntry {
            key: key.clone(),
            response,
            prompt_hash,
            model: model.trim().to_lowercase(),
            provider,
            parameters: params.map(cache_params),
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            ttl,
            expires_at,
            size_bytes,
            metadata: EntryMetadata {
                tokens_used,
                estimated_cost,
                tags: Vec::new(),
            },
        };

        match self.backend.set(&key, entry).await {
            Ok(()) => {
                if self.config.enable_metrics {
                    self.stats.record_set(size_bytes);
                    if let Ok(entries) = self.backend.len().await {
                        self.stats.set_entries(entries as u64);
                    }
                }
                self.events.emit(CacheEvent::Set { key, size_bytes });
            }
            Err(err) => self.events.emit(CacheEvent::BackendError {
                message: err.to_string(),
            }),
        }
    }

    /// Delete an entry by key; `true` if something was removed
    pub async fn delete(&self, key: &str) -> bool {
        match self.backend.delete(key).await {
            Ok(true) => {
                if self.config.enable_metrics {
                    if let Ok(entries) = self.backend.len().await {
                        self.stats.set_entries(entries as u64);
                    }
                }
                self.events.emit(CacheEvent::Evict {
                    key: key.to_string(),
                    reason: EvictionReason::Manual,
                });
                true
            }
            Ok(false) => false,
            Err(err) => {
                self.events.emit(CacheEvent::BackendError {
                    message: err.to_string(),
                });
                false
            }
        }
    }

    /// Remove every entry
    pub async fn clear(&self) {
        match self.backend.clear().await {
            Ok(()) => {
                self.stats.clear_storage();
                self.events.emit(CacheEvent::Clear);
            }
            Err(err) => self.events.emit(CacheEvent::BackendError {
                message: err.to_string(),
            }),
        }
    }

    /// All stored keys; empty on backend failure
    pub async fn keys(&self) -> Vec<String> {
        match self.backend.keys().await {
            Ok(keys) => keys,
            Err(err) => {
                self.events.emit(CacheEvent::BackendError {
                    message: err.to_string(),
                });
                Vec::new()
            }
        }
    }

    /// Current entry count; 0 on backend failure
    pub async fn size(&self) -> usize {
        match self.backend.len().await {
            Ok(len) => len,
            Err(err) => {
                self.events.emit(CacheEvent::BackendError {
                    message: err.to_string(),
                });
                0
            }
        }
    }

    /// Whether the backend can serve operations
    pub async fn health_check(&self) -> bool {
        match self.backend.health_check().await {
            Ok(healthy) => healthy,
            Err(err) => {
                self.events.emit(CacheEvent::BackendError {
                    message: err.to_string(),
                });
                false
            }
        }
    }

    /// Remove expired entries; returns how many were dropped
    pub async fn cleanup(&self) -> u64 {
        match self.backend.cleanup().await {
            Ok(removed) => {
                if removed > 0 {
                    tracing::debug!(target: "respcache", removed, "cleanup removed expired entries");
                }
                removed
            }
            Err(err) => {
                self.events.emit(CacheEvent::BackendError {
                    message: err.to_string(),
                });
                0
            }
        }
    }

    /// Stop the background tasks and release the backend
    pub async fn close(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
        if let Err(err) = self.backend.close().await {
            self.events.emit(CacheEvent::BackendError {
                message: err.to_string(),
            });
        }
    }

    /// Statistics snapshot with a freshly read entry count
    pub async fn stats(&self) -> CacheStats {
        if let Ok(entries) = self.backend.len().await {
            self.stats.set_entries(entries as u64);
        }
        self.stats.snapshot()
    }

    /// Reinitialize counters and latency accumulators
    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Read-only view of the configuration
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub(crate) fn backend(&self) -> &Arc<dyn CacheBackend> {
        &self.backend
    }

    pub(crate) fn events(&self) -> &EventBus {
        &self.events
    }

    pub(crate) fn stats_recorder(&self) -> &StatsRecorder {
        &self.stats
    }

    /// Periodic expired-entry sweep; holds only a weak backend reference so
    /// a dropped manager ends the task
    fn spawn_sweeper(&self) {
        let backend = Arc::downgrade(&self.backend);
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(backend) = backend.upgrade() else { break };
                match backend.cleanup().await {
                    Ok(removed) if removed > 0 => {
                        tracing::debug!(target: "respcache", removed, "sweeper removed expired entries");
                    }
                    Ok(_) => {}
                    Err(err) => events.emit(CacheEvent::BackendError {
                        message: err.to_string(),
                    }),
                }
            }
        });
        self.tasks.lock().push(handle);
    }

    /// Fold backend-emitted evictions into the statistics
    fn spawn_eviction_observer(&self) {
        let mut rx = self.events.subscribe(EventKind::Evict);
        let stats = self.stats.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if let CacheEvent::Evict { reason, .. } = event {
                    match reason {
                        EvictionReason::Ttl => stats.record_expiration(),
                        EvictionReason::Lru | EvictionReason::Manual => stats.record_eviction(),
                    }
                }
            }
        });
        self.tasks.lock().push(handle);
    }
}
