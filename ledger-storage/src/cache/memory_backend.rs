//! Process-local cache backend.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use ledger_core::{CacheError, LedgerResult, Preference, UserId};

use super::traits::{CacheBackend, CacheStats};
use super::user_key::PreferenceCacheKey;

#[derive(Debug, Default)]
struct MemoryState {
    entries: HashMap<PreferenceCacheKey, Preference>,
    hits: u64,
    misses: u64,
}

/// In-memory cache backed by a `HashMap`.
///
/// Entries never expire and are lost when the process exits.
#[derive(Debug, Default)]
pub struct InMemoryCacheBackend {
    state: RwLock<MemoryState>,
}

impl InMemoryCacheBackend {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.read().map(|s| s.entries.len()).unwrap_or(0)
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, MemoryState>> {
        self.state.read().map_err(|_| poisoned())
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state.write().map_err(|_| poisoned())
    }
}

fn poisoned() -> ledger_core::LedgerError {
    CacheError::Backend {
        reason: "in-memory cache lock poisoned".to_string(),
    }
    .into()
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn has(&self, key: &PreferenceCacheKey) -> LedgerResult<bool> {
        Ok(self.read()?.entries.contains_key(key))
    }

    async fn get(&self, key: &PreferenceCacheKey) -> LedgerResult<Option<Preference>> {
        let mut state = self.write()?;
        match state.entries.get(key).cloned() {
            Some(preference) => {
                state.hits += 1;
                Ok(Some(preference))
            }
            None => {
                state.misses += 1;
                Ok(None)
            }
        }
    }

    async fn put_forever(
        &self,
        key: &PreferenceCacheKey,
        preference: &Preference,
    ) -> LedgerResult<()> {
        self.write()?.entries.insert(key.clone(), preference.clone());
        Ok(())
    }

    async fn forget(&self, key: &PreferenceCacheKey) -> LedgerResult<bool> {
        Ok(self.write()?.entries.remove(key).is_some())
    }

    async fn forget_user(&self, user_id: UserId) -> LedgerResult<u64> {
        let mut state = self.write()?;
        let before = state.entries.len();
        state.entries.retain(|key, _| key.user_id() != user_id);
        Ok((before - state.entries.len()) as u64)
    }

    async fn stats(&self) -> LedgerResult<CacheStats> {
        let state = self.read()?;
        let memory_bytes = state
            .entries
            .iter()
            .map(|(key, preference)| key.name().len() + preference.raw_data().len())
            .sum::<usize>() as u64;

        Ok(CacheStats {
            hits: state.hits,
            misses: state.misses,
            entry_count: state.entries.len() as u64,
            memory_bytes,
            evictions: 0,
        })
    }
}
