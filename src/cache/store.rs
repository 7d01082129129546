//! Cache Store Module
//!
//! Single-threaded cache core: HashMap storage with TTL expiration and
//! creation-order eviction. [`CacheEngine`](super::CacheEngine) wraps it in a
//! lock for shared use.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{CacheEntry, CacheStatistics, CacheStats, Clock};
use crate::error::{Error, Result};

// == Cache Store ==
/// Main cache storage with TTL support and capacity-bounded eviction.
#[derive(Debug)]
pub struct CacheStore<V> {
    /// Key-value storage
    entries: HashMap<String, CacheEntry<V>>,
    /// Performance statistics
    stats: CacheStats,
    /// Maximum number of entries allowed
    max_size: usize,
    /// Default TTL in seconds for entries without explicit TTL
    default_ttl: i64,
    /// Next insertion sequence number
    next_sequence: u64,
    /// Time source for expiry checks
    clock: Arc<dyn Clock>,
}

impl<V: Clone> CacheStore<V> {
    // == Constructor ==
    /// Creates a new CacheStore with specified capacity and default TTL.
    ///
    /// A capacity of zero is rejected as a configuration error.
    pub fn new(max_size: usize, default_ttl: i64, clock: Arc<dyn Clock>) -> Result<Self> {
        if max_size == 0 {
            return Err(Error::Configuration(
                "cache max size must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            max_size,
            default_ttl,
            next_sequence: 0,
            clock,
        })
    }

    // == Set ==
    /// Stores a key-value pair with optional TTL.
    ///
    /// If the key already exists, the value is overwritten and both TTL and
    /// creation time are reset. If the cache is at capacity and the key is
    /// new, the oldest entries are evicted first.
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Option<i64>) {
        let key = key.into();

        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_size {
            self.evict_oldest();
        }

        let ttl = ttl.unwrap_or(self.default_ttl);
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let entry = CacheEntry::new(value, self.clock.now(), ttl, sequence);
        self.entries.insert(key.clone(), entry);
        self.stats.record_set();

        debug!(key = %key, ttl, size = self.entries.len(), "Cache set");
    }

    // == Get ==
    /// Retrieves a value by key.
    ///
    /// Returns the value if found and not expired. Expired entries are
    /// removed and counted as misses.
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = self.clock.now();

        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                debug!(key, "Cache hit");
                Some(value)
            }
            Some(_) => {
                self.entries.remove(key);
                self.stats.record_miss();
                debug!(key, "Cache expired");
                None
            }
            None => {
                self.stats.record_miss();
                debug!(key, "Cache miss");
                None
            }
        }
    }

    // == Contains ==
    /// Checks for a live entry without touching statistics.
    pub fn contains(&self, key: &str) -> bool {
        let now = self.clock.now();
        self.entries
            .get(key)
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Remaining TTL of a live entry in whole seconds.
    pub fn ttl_remaining(&self, key: &str) -> Option<i64> {
        let now = self.clock.now();
        self.entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.ttl_remaining(now))
    }

    // == Delete ==
    /// Removes an entry by key, returning whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        let existed = self.entries.remove(key).is_some();
        if existed {
            debug!(key, "Cache key deleted");
        }
        existed
    }

    // == Delete By Pattern ==
    /// Removes every key containing `pattern` as a literal substring.
    pub fn delete_by_pattern(&mut self, pattern: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.contains(pattern));
        let removed = before - self.entries.len();

        if removed > 0 {
            info!(pattern, count = removed, "Cache pattern delete");
        }
        removed
    }

    // == Clear ==
    /// Removes everything and returns how many entries were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        info!(entries_removed = count, "Cache cleared");
        count
    }

    // == Sweep Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let removed = before - self.entries.len();

        if removed > 0 {
            debug!(expired_entries = removed, "Expired entries swept");
        }
        removed
    }

    // == Evict Oldest ==
    /// Evicts `max(1, size / 10)` entries with the oldest creation time.
    ///
    /// Ordering is by insertion, not by last access.
    fn evict_oldest(&mut self) -> usize {
        if self.entries.is_empty() {
            return 0;
        }

        let evict_count = (self.entries.len() / 10).max(1);

        let mut by_age: Vec<_> = self
            .entries
            .iter()
            .map(|(key, entry)| (entry.age_key(), key.clone()))
            .collect();
        by_age.sort_unstable();

        for (_, key) in by_age.into_iter().take(evict_count) {
            self.entries.remove(&key);
            self.stats.record_eviction();
        }

        info!(
            evicted = evict_count,
            remaining = self.entries.len(),
            "Cache eviction"
        );
        evict_count
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStatistics {
        self.stats.snapshot(self.entries.len(), self.max_size)
    }

    /// Zeroes hit/miss/set/eviction counters, leaving entries untouched.
    pub fn reset_stats(&mut self) {
        self.stats.reset();
        info!("Cache statistics reset");
    }

    // == Accessors ==
    /// Returns the current number of entries in the cache, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn default_ttl(&self) -> i64 {
        self.default_ttl
    }

    /// Keys of live entries, sorted.
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }
}
