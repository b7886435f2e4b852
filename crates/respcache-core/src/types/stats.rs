//! Cache statistics

use serde::{Deserialize, Serialize};

/// Snapshot of cache statistics.
///
/// Produced by the manager; `hit_rate` and the latency means are recomputed
/// at snapshot time, so the struct itself is plain data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// hits / (hits + misses); 0 when no lookups have happened
    pub hit_rate: f64,
    /// Current number of entries
    pub entries: u64,
    /// Approximate byte total of stored responses
    pub size_bytes: u64,
    /// Running mean latency of hits, in milliseconds
    pub avg_hit_latency_ms: f64,
    /// Running mean overhead of misses, in milliseconds
    pub avg_miss_latency_ms: f64,
    /// Cumulative tokens served from cache instead of upstream
    pub total_tokens_saved: u64,
    /// Cumulative estimated dollars saved
    pub total_cost_saved: f64,
    /// Entries removed for capacity
    pub evictions: u64,
    /// Entries removed for TTL
    pub expirations: u64,
    /// When the statistics were last reset (ms)
    pub last_reset: u64,
}

impl CacheStats {
    /// Recompute the hit ratio from the raw counters
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Total lookups (hits + misses)
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stats() {
        let stats = CacheStats::default();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.hit_ratio(), 0.0);
    }

    #[test]
    fn test_hit_ratio() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_ratio() - 0.8).abs() < f64::EPSILON);
        assert_eq!(stats.total_requests(), 100);
    }

    #[test]
    fn test_serde_roundtrip() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            hit_rate: 0.75,
            total_cost_saved: 0.125,
            ..Default::default()
        };
        let json = serde_json::to_string(&stats).unwrap();
        let back: CacheStats = serde_json::from_str(&json).unwrap();
        assert_eq!(stats, back);
    }
}
