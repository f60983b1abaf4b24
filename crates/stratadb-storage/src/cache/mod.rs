//! Bounded, recency-ordered caching over the state stack.
//!
//! [`LruStorage`] answers the row-access contract from its resident set,
//! missing through to the chain below, while a single background worker
//! keeps an approximate LRU order and evicts once the resident byte size
//! exceeds the configured capacity.
//!
//! # Thread model
//!
//! Callers never take a cache-internal lock on the read/write path: every
//! access enqueues a touch event on an unbounded channel and returns. The
//! maintenance worker is the only thread that ever mutates the
//! [`RecencyIndex`], so recency bookkeeping needs no synchronization at
//! all. The trade is approximate ordering across concurrent producers and
//! an unbounded queue under sustained eviction pressure.

mod lru;
#[cfg(test)]
mod lru_tests;
mod recency;

pub use lru::LruStorage;
pub use recency::RecencyIndex;

/// Cache access statistics for monitoring.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Lookups answered from the resident set.
    pub hits: u64,
    /// Total row lookups since construction.
    pub queries: u64,
    /// Rows evicted by the maintenance worker.
    pub evictions: u64,
}

impl CacheStats {
    /// Share of lookups answered from the resident set (0.0 to 1.0).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            self.hits as f64 / self.queries as f64
        }
    }
}
