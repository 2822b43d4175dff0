//! TTL response cache
//!
//! Maps a request signature to a cached value with a per-entry time-to-live.
//! Expired entries are dropped lazily on read. When the cache grows past its
//! capacity the oldest-inserted entry is evicted. Eviction follows insertion
//! order, not access recency; overwriting a live key keeps its position.

use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{duration_ms, Clock};

/// Default entry bound
pub const DEFAULT_CAPACITY: usize = 100;

/// A cached value with its insertion time and TTL
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub data: V,
    pub timestamp_ms: u64,
    pub ttl_ms: u64,
}

impl<V> CacheEntry<V> {
    /// Expired once strictly older than its TTL
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.timestamp_ms) > self.ttl_ms
    }
}

/// Cache counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

/// Bounded TTL cache with insertion-order eviction
pub struct ResponseCache<V> {
    entries: IndexMap<String, CacheEntry<V>>,
    capacity: usize,
    clock: Arc<dyn Clock>,
    stats: CacheStats,
}

impl<V: Clone> ResponseCache<V> {
    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: IndexMap::new(),
            capacity: capacity.max(1),
            clock,
            stats: CacheStats::default(),
        }
    }

    /// Fresh value for `key`, dropping it if expired
    pub fn get(&mut self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();

        let expired = match self.entries.get(key) {
            None => {
                self.stats.misses += 1;
                return None;
            }
            Some(entry) => entry.is_expired(now),
        };

        if expired {
            self.entries.shift_remove(key);
            self.stats.expirations += 1;
            self.stats.misses += 1;
            tracing::trace!(key = %key, "Cache entry expired");
            return None;
        }

        self.stats.hits += 1;
        self.entries.get(key).map(|entry| entry.data.clone())
    }

    /// Store `value` under `key` for `ttl`
    pub fn set(&mut self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            data: value,
            timestamp_ms: self.clock.now_ms(),
            ttl_ms: duration_ms(ttl),
        };
        self.entries.insert(key.into(), entry);

        while self.entries.len() > self.capacity {
            if let Some((evicted, _)) = self.entries.shift_remove_index(0) {
                self.stats.evictions += 1;
                tracing::debug!(key = %evicted, capacity = self.capacity, "Evicted oldest cache entry");
            }
        }
    }

    /// Remove `key`, returning its value regardless of freshness
    pub fn remove(&mut self, key: &str) -> Option<V> {
        self.entries.shift_remove(key).map(|entry| entry.data)
    }

    /// Drop every expired entry, returning how many were dropped
    pub fn purge_expired(&mut self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let purged = before - self.entries.len();
        self.stats.expirations += purged as u64;
        purged
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entry count, including expired entries not yet read
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Keys in eviction order (oldest first)
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

/// Opaque cache key for a request, built from its parameters
pub fn request_signature<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        // Separator so ("ab", "c") and ("a", "bc") differ
        hasher.update([0u8]);
    }
    hex::encode(hasher.finalize())
}
