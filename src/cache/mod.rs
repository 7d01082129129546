//! Cache Module
//!
//! Provides in-memory caching with TTL expiration, creation-order eviction
//! and hit/miss statistics.

mod category;
mod clock;
mod engine;
mod entry;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use category::{CacheCategory, CategoryTtls};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::CacheEngine;
pub use entry::CacheEntry;
pub(crate) use entry::expiry_after;
pub use stats::{CacheStatistics, CacheStats};
pub use store::CacheStore;

/// Builds a namespaced key: `"<system>:<operation>:<args>"`.
pub fn cache_key(system: &str, operation: &str, args: &[&str]) -> String {
    let mut key = format!("{system}:{operation}");
    for arg in args {
        key.push(':');
        key.push_str(arg);
    }
    key
}
