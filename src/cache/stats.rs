//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, sets and evictions.

use serde::Serialize;

// == Cache Stats ==
/// Running counters owned by the cache store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of live lookups
    pub hits: u64,
    /// Number of lookups that found nothing or an expired entry
    pub misses: u64,
    /// Number of insertions and overwrites
    pub sets: u64,
    /// Number of entries removed to respect capacity
    pub evictions: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_requests();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Hits plus misses.
    pub fn total_requests(&self) -> u64 {
        self.hits + self.misses
    }

    // == Recorders ==
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_set(&mut self) {
        self.sets += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    // == Reset ==
    /// Zeroes every counter.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    // == Snapshot ==
    /// Builds the operator-facing snapshot for the given occupancy.
    pub fn snapshot(&self, size: usize, max_size: usize) -> CacheStatistics {
        let usage = if max_size == 0 {
            0.0
        } else {
            size as f64 / max_size as f64 * 100.0
        };

        CacheStatistics {
            size,
            max_size,
            usage_percent: round2(usage),
            hits: self.hits,
            misses: self.misses,
            hit_rate_percent: round2(self.hit_rate() * 100.0),
            evictions: self.evictions,
            total_sets: self.sets,
            total_requests: self.total_requests(),
        }
    }
}

// == Cache Statistics ==
/// Point-in-time statistics snapshot, serialized by the admin surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatistics {
    pub size: usize,
    pub max_size: usize,
    pub usage_percent: f64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
    pub evictions: u64,
    pub total_sets: u64,
    pub total_requests: u64,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.sets, 0);
        assert_eq!(stats.evictions, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        stats.record_set();
        stats.record_eviction();
        stats.reset();
        assert_eq!(stats, CacheStats::default());
    }

    #[test]
    fn test_snapshot_derived_fields() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        stats.record_set();

        let snapshot = stats.snapshot(3, 8);
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.hit_rate_percent, 66.67);
        assert_eq!(snapshot.usage_percent, 37.5);
        assert_eq!(snapshot.total_sets, 1);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let json = serde_json::to_value(CacheStats::new().snapshot(0, 10)).unwrap();
        assert_eq!(json["maxSize"], 10);
        assert!(json.get("hitRatePercent").is_some());
        assert!(json.get("totalSets").is_some());
        assert!(json.get("usagePercent").is_some());
    }
}
