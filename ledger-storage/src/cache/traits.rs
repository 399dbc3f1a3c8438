//! Cache backend trait and statistics.

use async_trait::async_trait;
use ledger_core::{LedgerResult, Preference, UserId};

use super::user_key::PreferenceCacheKey;

/// Cache backend trait for pluggable cache implementations.
///
/// Entries are written without expiry: they live until `forget` or
/// `forget_user` removes them. The cache is derived data; the repository
/// stays authoritative.
///
/// Implementations must be thread-safe.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Whether an entry exists for `key`.
    async fn has(&self, key: &PreferenceCacheKey) -> LedgerResult<bool> {
        Ok(self.get(key).await?.is_some())
    }

    /// Get a cached preference, or None if not present.
    async fn get(&self, key: &PreferenceCacheKey) -> LedgerResult<Option<Preference>>;

    /// Store a preference with no expiry, replacing any previous entry.
    async fn put_forever(&self, key: &PreferenceCacheKey, preference: &Preference)
        -> LedgerResult<()>;

    /// Remove a single entry. Returns whether an entry was removed.
    async fn forget(&self, key: &PreferenceCacheKey) -> LedgerResult<bool>;

    /// Remove every entry belonging to a user. Returns the number removed.
    async fn forget_user(&self, user_id: UserId) -> LedgerResult<u64>;

    /// Get cache statistics.
    async fn stats(&self) -> LedgerResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Approximate memory usage in bytes.
    pub memory_bytes: u64,
    /// Number of evictions due to capacity.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
