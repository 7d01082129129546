//! Cache Engine Module
//!
//! Thread-safe handle over [`CacheStore`]. Cloning the handle shares the
//! same store; the engine is built once at startup and passed to every
//! consumer.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{CacheCategory, CacheStatistics, CacheStore, CategoryTtls, Clock};
use crate::config::CacheConfig;
use crate::error::Result;

// == Cache Engine ==
/// Shared key-value cache with TTL expiration and bounded size.
///
/// Every operation, reads included, takes the write lock except those that
/// leave statistics and entries untouched (`stats`, `contains`, `len`, `keys`).
#[derive(Debug)]
pub struct CacheEngine<V> {
    store: Arc<RwLock<CacheStore<V>>>,
    ttls: Arc<CategoryTtls>,
    max_size: usize,
    enabled: bool,
}

impl<V> Clone for CacheEngine<V> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            ttls: Arc::clone(&self.ttls),
            max_size: self.max_size,
            enabled: self.enabled,
        }
    }
}

impl<V: Clone + Send + Sync + 'static> CacheEngine<V> {
    // == Constructors ==
    /// Creates an enabled engine with default category TTLs.
    pub fn new(max_size: usize, default_ttl: i64, clock: Arc<dyn Clock>) -> Result<Self> {
        let store = CacheStore::new(max_size, default_ttl, clock)?;
        Ok(Self {
            store: Arc::new(RwLock::new(store)),
            ttls: Arc::new(CategoryTtls::default()),
            max_size,
            enabled: true,
        })
    }

    /// Creates an engine from the cache section of the configuration.
    pub fn from_config(config: &CacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self::new(config.max_size, config.default_ttl, clock)?
            .with_category_ttls(config.category_ttls.clone())
            .with_enabled(config.enabled))
    }

    pub fn with_category_ttls(mut self, ttls: CategoryTtls) -> Self {
        self.ttls = Arc::new(ttls);
        self
    }

    /// A disabled engine still answers admin operations but
    /// [`get_or_insert_with`](Self::get_or_insert_with) bypasses it.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// TTL configured for a category.
    pub fn category_ttl(&self, category: CacheCategory) -> i64 {
        self.ttls.get(category)
    }

    // == Reads ==
    /// Returns the value if present and unexpired.
    pub async fn get(&self, key: &str) -> Option<V> {
        self.store.write().await.get(key)
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.store.read().await.contains(key)
    }

    pub async fn ttl_remaining(&self, key: &str) -> Option<i64> {
        self.store.read().await.ttl_remaining(key)
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.store.read().await.is_empty()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.store.read().await.keys()
    }

    pub async fn stats(&self) -> CacheStatistics {
        self.store.read().await.stats()
    }

    // == Writes ==
    /// Inserts or overwrites; `None` uses the default TTL.
    pub async fn set(&self, key: impl Into<String>, value: V, ttl: Option<i64>) {
        self.store.write().await.set(key, value, ttl);
    }

    /// Inserts with the TTL configured for `category`.
    pub async fn set_for(&self, category: CacheCategory, key: impl Into<String>, value: V) {
        let ttl = self.ttls.get(category);
        self.set(key, value, Some(ttl)).await;
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.store.write().await.delete(key)
    }

    pub async fn delete_by_pattern(&self, pattern: &str) -> usize {
        self.store.write().await.delete_by_pattern(pattern)
    }

    pub async fn clear(&self) -> usize {
        self.store.write().await.clear()
    }

    pub async fn sweep_expired(&self) -> usize {
        self.store.write().await.sweep_expired()
    }

    pub async fn reset_stats(&self) {
        self.store.write().await.reset_stats();
    }

    // == Read-Through ==
    /// Returns the cached value for `key`, or awaits `fetch` and caches its
    /// `Ok` result. Errors are returned untouched and never cached.
    ///
    /// The lock is not held while `fetch` runs, so two concurrent misses on
    /// the same key may both fetch; the later write wins.
    pub async fn get_or_insert_with<F, Fut, E>(
        &self,
        key: &str,
        ttl: Option<i64>,
        fetch: F,
    ) -> std::result::Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, E>>,
    {
        if !self.enabled {
            return fetch().await;
        }

        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let value = fetch().await?;
        self.set(key, value.clone(), ttl).await;
        debug!(key, "Cache populated from fetch");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn engine(max_size: usize) -> (CacheEngine<String>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        (CacheEngine::new(max_size, 300, clock.clone()).unwrap(), clock)
    }

    #[tokio::test]
    async fn test_clones_share_the_store() {
        let (cache, _) = engine(10);
        let other = cache.clone();

        cache.set("a", "1".to_string(), None).await;

        assert_eq!(other.get("a").await.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_max_ttl_entry_is_served() {
        let (cache, _) = engine(10);

        cache.set("k", "v".to_string(), Some(i64::MAX)).await;

        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
        assert!(cache.ttl_remaining("k").await.unwrap_or(0) > 0);
    }

    #[tokio::test]
    async fn test_set_for_uses_category_ttl() {
        let (cache, clock) = engine(10);
        let mut ttls = CategoryTtls::default();
        ttls.set(CacheCategory::Incident, 30);
        let cache = cache.with_category_ttls(ttls);

        cache
            .set_for(CacheCategory::Incident, "sn:incident:1", "x".to_string())
            .await;
        assert_eq!(cache.ttl_remaining("sn:incident:1").await, Some(30));

        clock.advance(Duration::from_secs(30));
        assert!(cache.get("sn:incident:1").await.is_none());
    }

    #[tokio::test]
    async fn test_get_or_insert_with_caches_success() {
        let (cache, _) = engine(10);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value: std::result::Result<String, String> = cache
                .get_or_insert_with("nt:device:pc1", Some(60), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("payload".to_string())
                })
                .await;
            assert_eq!(value.unwrap(), "payload");
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_get_or_insert_with_does_not_cache_errors() {
        let (cache, _) = engine(10);

        let first: std::result::Result<String, &str> = cache
            .get_or_insert_with("k", None, || async { Err("boom") })
            .await;
        assert_eq!(first, Err("boom"));
        assert!(!cache.contains("k").await);
    }

    #[tokio::test]
    async fn test_disabled_engine_always_fetches() {
        let (cache, _) = engine(10);
        let cache = cache.with_enabled(false);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let _: std::result::Result<String, ()> = cache
                .get_or_insert_with("k", None, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("v".to_string())
                })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_concurrent_sets_respect_capacity() {
        let (cache, _) = engine(20);

        let mut handles = Vec::new();
        for task in 0..8 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    cache.set(format!("t{task}:k{i}"), i.to_string(), None).await;
                    assert!(cache.len().await <= 20);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let stats = cache.stats().await;
        assert!(stats.size <= 20);
        assert!(stats.evictions > 0);
        assert_eq!(stats.total_sets, 400);
    }

    #[tokio::test]
    async fn test_end_to_end_eviction_of_first_inserted() {
        let (cache, clock) = engine(10);
        for i in 0..10 {
            cache.set(format!("key{i}"), i.to_string(), Some(300)).await;
            clock.advance(Duration::from_millis(1));
        }

        cache.set("key10", "10".to_string(), Some(300)).await;

        let stats = cache.stats().await;
        assert_eq!(stats.evictions, 1);
        assert!(!cache.contains("key0").await);
        assert!(cache.contains("key10").await);
        assert_eq!(cache.len().await, 10);
    }
}
