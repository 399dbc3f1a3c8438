//! Persistent preference storage.
//!
//! The repository is the source of truth. The production implementation
//! lives with the host application's database layer; this module defines the
//! contract and an in-memory implementation used by tests and embedders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use ledger_core::{
    EntityIdType, LedgerResult, NewPreference, Preference, PreferenceId, StorageError, UserId,
};

/// Storage contract for preference records.
///
/// Implementations must keep at most one record per `(user_id, name)`.
#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    /// Find the record for `name` owned by `user_id`.
    async fn find_one(&self, user_id: UserId, name: &str) -> LedgerResult<Option<Preference>>;

    /// Insert a new record, assigning its id and timestamps.
    async fn insert(&self, new: NewPreference) -> LedgerResult<Preference>;

    /// Persist changed `data` on an existing record. The id is preserved.
    async fn update(&self, preference: &Preference) -> LedgerResult<Preference>;

    /// Delete an existing record.
    async fn delete(&self, preference: &Preference) -> LedgerResult<()>;
}

/// In-memory preference repository.
#[derive(Debug, Default)]
pub struct InMemoryPreferenceRepository {
    records: RwLock<HashMap<(UserId, String), Preference>>,
    find_calls: AtomicU64,
}

impl InMemoryPreferenceRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn preference_count(&self) -> usize {
        self.read().map(|records| records.len()).unwrap_or(0)
    }

    /// Number of `find_one` calls served so far.
    pub fn find_calls(&self) -> u64 {
        self.find_calls.load(Ordering::SeqCst)
    }

    /// Clear all stored data.
    pub fn clear(&self) -> LedgerResult<()> {
        self.write()?.clear();
        Ok(())
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, HashMap<(UserId, String), Preference>>> {
        self.records
            .read()
            .map_err(|_| StorageError::LockPoisoned.into())
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, HashMap<(UserId, String), Preference>>> {
        self.records
            .write()
            .map_err(|_| StorageError::LockPoisoned.into())
    }
}

#[async_trait]
impl PreferenceRepository for InMemoryPreferenceRepository {
    async fn find_one(&self, user_id: UserId, name: &str) -> LedgerResult<Option<Preference>> {
        self.find_calls.fetch_add(1, Ordering::SeqCst);
        let records = self.read()?;
        Ok(records.get(&(user_id, name.to_string())).cloned())
    }

    async fn insert(&self, new: NewPreference) -> LedgerResult<Preference> {
        let mut records = self.write()?;
        let slot = (new.user_id, new.name.clone());
        if records.contains_key(&slot) {
            return Err(StorageError::InsertFailed {
                reason: format!("preference {:?} already exists for user {}", new.name, new.user_id),
            }
            .into());
        }

        let now = Utc::now();
        let preference = Preference {
            preference_id: PreferenceId::now_v7(),
            user_id: new.user_id,
            name: new.name,
            data: new.data,
            created_at: now,
            updated_at: now,
        };
        records.insert(slot, preference.clone());
        Ok(preference)
    }

    async fn update(&self, preference: &Preference) -> LedgerResult<Preference> {
        let mut records = self.write()?;
        let stored = records
            .get_mut(&(preference.user_id, preference.name.clone()))
            .ok_or_else(|| StorageError::NotFound {
                user_id: preference.user_id,
                name: preference.name.clone(),
            })?;

        if stored.preference_id != preference.preference_id {
            return Err(StorageError::UpdateFailed {
                id: preference.preference_id,
                reason: format!("slot is held by preference {}", stored.preference_id),
            }
            .into());
        }

        stored.data = preference.data.clone();
        stored.updated_at = Utc::now();
        Ok(stored.clone())
    }

    async fn delete(&self, preference: &Preference) -> LedgerResult<()> {
        let mut records = self.write()?;
        let slot = (preference.user_id, preference.name.clone());
        match records.get(&slot).map(|stored| stored.preference_id) {
            Some(held_by) if held_by == preference.preference_id => {
                records.remove(&slot);
                Ok(())
            }
            Some(held_by) => Err(StorageError::DeleteFailed {
                id: preference.preference_id,
                reason: format!("slot is held by preference {}", held_by),
            }
            .into()),
            None => Err(StorageError::NotFound {
                user_id: preference.user_id,
                name: preference.name.clone(),
            }
            .into()),
        }
    }
}
