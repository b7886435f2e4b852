//! Manager-owned statistics
//!
//! Integer counters are atomics; the running-mean accumulators and the cost
//! total share one small mutex. Snapshots recompute the derived fields.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use respcache_core::{now_millis, CacheStats};

#[derive(Debug, Default)]
struct Accumulators {
    hit_latency_total_ms: f64,
    hit_samples: u64,
    miss_latency_total_ms: f64,
    miss_samples: u64,
    cost_saved: f64,
}

/// Concurrent statistics recorder shared by all manager callers
#[derive(Debug)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
    entries: AtomicU64,
    size_bytes: AtomicU64,
    tokens_saved: AtomicU64,
    last_reset: AtomicU64,
    accum: Mutex<Accumulators>,
}

impl Default for StatsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
            entries: AtomicU64::new(0),
            size_bytes: AtomicU64::new(0),
            tokens_saved: AtomicU64::new(0),
            last_reset: AtomicU64::new(now_millis()),
            accum: Mutex::new(Accumulators::default()),
        }
    }

    pub fn record_hit(&self, latency_ms: f64) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        let mut accum = self.accum.lock();
        accum.hit_latency_total_ms += latency_ms;
        accum.hit_samples += 1;
    }

    pub fn record_miss(&self, latency_ms: f64) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        let mut accum = self.accum.lock();
        accum.miss_latency_total_ms += latency_ms;
        accum.miss_samples += 1;
    }

    pub fn record_savings(&self, tokens: u64, cost: f64) {
        self.tokens_saved.fetch_add(tokens, Ordering::Relaxed);
        self.accum.lock().cost_saved += cost;
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    /// Bytes written through a successful set
    pub fn record_set(&self, size_bytes: u64) {
        self.size_bytes.fetch_add(size_bytes, Ordering::Relaxed);
    }

    /// Refresh the live entry-count gauge
    pub fn set_entries(&self, entries: u64) {
        self.entries.store(entries, Ordering::Relaxed);
    }

    /// Zero the storage gauges after a clear
    pub fn clear_storage(&self) {
        self.entries.store(0, Ordering::Relaxed);
        self.size_bytes.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let accum = self.accum.lock();

        let mean = |total: f64, samples: u64| if samples == 0 { 0.0 } else { total / samples as f64 };
        let total = hits + misses;

        CacheStats {
            hits,
            misses,
            hit_rate: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
            entries: self.entries.load(Ordering::Relaxed),
            size_bytes: self.size_bytes.load(Ordering::Relaxed),
            avg_hit_latency_ms: mean(accum.hit_latency_total_ms, accum.hit_samples),
            avg_miss_latency_ms: mean(accum.miss_latency_total_ms, accum.miss_samples),
            total_tokens_saved: self.tokens_saved.load(Ordering::Relaxed),
            total_cost_saved: accum.cost_saved,
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            last_reset: self.last_reset.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
        self.tokens_saved.store(0, Ordering::Relaxed);
        self.last_reset.store(now_millis(), Ordering::Relaxed);
        *self.accum.lock() = Accumulators::default();
    }
}
