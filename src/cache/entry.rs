//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

use chrono::{DateTime, Duration, Utc};

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Insertion timestamp
    pub created_at: DateTime<Utc>,
    /// Expiration timestamp (`created_at + ttl`)
    pub expires_at: DateTime<Utc>,
    /// Insertion sequence, orders entries created within the same instant
    pub sequence: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry expiring `ttl_seconds` after `now`.
    ///
    /// A TTL of zero or less yields an entry that is already expired.
    pub fn new(value: V, now: DateTime<Utc>, ttl_seconds: i64, sequence: u64) -> Self {
        Self {
            value,
            created_at: now,
            expires_at: expiry_after(now, ttl_seconds),
            sequence,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// An entry is expired once `now >= expires_at`, so it is never served at
    /// the exact instant its TTL elapses.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    // == Time To Live ==
    /// Returns remaining TTL in whole seconds, 0 once expired.
    pub fn ttl_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }

    /// Key used to pick eviction victims: oldest creation first.
    pub(crate) fn age_key(&self) -> (DateTime<Utc>, u64) {
        (self.created_at, self.sequence)
    }
}

/// Instant `ttl_seconds` after `now`, saturating at the representable range.
pub(crate) fn expiry_after(now: DateTime<Utc>, ttl_seconds: i64) -> DateTime<Utc> {
    let saturated = if ttl_seconds < 0 {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    };
    Duration::try_seconds(ttl_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(saturated)
}
