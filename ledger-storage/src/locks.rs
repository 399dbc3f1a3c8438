//! Per-key write serialization.
//!
//! Writers on the same `(user, name)` pair take turns; writers on different
//! keys never wait on each other. Readers do not take these locks.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use ledger_core::{LedgerResult, StorageError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::cache::PreferenceCacheKey;

/// Held while a write to one key is in progress.
pub type KeyWriteGuard = OwnedMutexGuard<()>;

/// Registry of async mutexes keyed by preference.
#[derive(Debug, Default)]
pub struct KeyedWriteLocks {
    slots: Mutex<HashMap<PreferenceCacheKey, Arc<AsyncMutex<()>>>>,
}

impl KeyedWriteLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive write access to `key`.
    ///
    /// Slots nobody holds or waits on are pruned on every call, so the
    /// registry only grows with the number of concurrent writers.
    pub async fn acquire(&self, key: &PreferenceCacheKey) -> LedgerResult<KeyWriteGuard> {
        let slot = {
            let mut slots = self.slots.lock().map_err(|_| StorageError::LockPoisoned)?;
            slots.retain(|held_key, slot| held_key == key || Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        Ok(slot.lock_owned().await)
    }

    /// Number of slots currently registered.
    pub fn slot_count(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }
}
