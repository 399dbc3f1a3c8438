//! LMDB-backed cache implementation with per-user key prefixes.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep cached preferences
//! in a memory-mapped file, so the cache survives process restarts.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions. The backend uses:
//! - Read transactions for `has` and `get`
//! - Write transactions for `put_forever`, `forget` and `forget_user`
//! - Statistics are kept behind `RwLock`s outside of LMDB

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use ledger_core::{CacheBackendConfig, CacheError, LedgerResult, Preference, UserId};

use super::traits::{CacheBackend, CacheStats};
use super::user_key::PreferenceCacheKey;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// The configuration does not describe an LMDB cache.
    #[error("Cache configuration is not an LMDB backend")]
    NotLmdb,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for ledger_core::LedgerError {
    fn from(e: LmdbCacheError) -> Self {
        let error = match e {
            LmdbCacheError::Serialization(reason) => CacheError::Serialization { reason },
            LmdbCacheError::Deserialization(reason) => CacheError::Deserialization { reason },
            other => CacheError::Backend {
                reason: other.to_string(),
            },
        };
        ledger_core::LedgerError::Cache(error)
    }
}

/// Per-user statistics tracking.
#[derive(Debug, Default)]
struct UserStatsInner {
    hits: u64,
    misses: u64,
    entries: u64,
    size_bytes: u64,
}

/// LMDB-backed preference cache.
///
/// # Example
///
/// ```ignore
/// let backend = LmdbCacheBackend::new("/var/cache/ledger", 64)?;
/// let key = PreferenceCacheKey::new(user_id, "language");
/// backend.put_forever(&key, &preference).await?;
/// let cached = backend.get(&key).await?;
/// ```
pub struct LmdbCacheBackend {
    /// The LMDB environment.
    env: Env,
    /// The main database (single unnamed database).
    db: Database<Bytes, Bytes>,
    /// Per-user statistics.
    user_stats: Arc<RwLock<HashMap<UserId, UserStatsInner>>>,
    /// Global statistics.
    global_stats: Arc<RwLock<CacheStats>>,
}

impl LmdbCacheBackend {
    /// Create a new LMDB cache backend.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the LMDB
    /// environment or database cannot be opened.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            user_stats: Arc::new(RwLock::new(HashMap::new())),
            global_stats: Arc::new(RwLock::new(CacheStats::default())),
        })
    }

    /// Open the backend described by an `Lmdb` cache configuration.
    pub fn from_config(config: &CacheBackendConfig) -> Result<Self, LmdbCacheError> {
        match config {
            CacheBackendConfig::Lmdb { path, max_size_mb } => Self::new(path, *max_size_mb),
            CacheBackendConfig::Memory => Err(LmdbCacheError::NotLmdb),
        }
    }

    fn record_hit(&self, user_id: UserId) {
        if let Ok(mut stats) = self.user_stats.write() {
            stats.entry(user_id).or_default().hits += 1;
        }
        if let Ok(mut stats) = self.global_stats.write() {
            stats.hits += 1;
        }
    }

    fn record_miss(&self, user_id: UserId) {
        if let Ok(mut stats) = self.user_stats.write() {
            stats.entry(user_id).or_default().misses += 1;
        }
        if let Ok(mut stats) = self.global_stats.write() {
            stats.misses += 1;
        }
    }

    /// Account for a write of `size_bytes`, replacing an entry of
    /// `previous_bytes` when one existed.
    fn update_entry_stats(
        &self,
        user_id: UserId,
        size_bytes: usize,
        previous_bytes: Option<usize>,
    ) {
        let added = size_bytes as u64;
        let replaced = previous_bytes.unwrap_or(0) as u64;
        if let Ok(mut stats) = self.user_stats.write() {
            let user_stats = stats.entry(user_id).or_default();
            if previous_bytes.is_none() {
                user_stats.entries += 1;
            }
            user_stats.size_bytes = user_stats.size_bytes.saturating_sub(replaced) + added;
        }
        if let Ok(mut stats) = self.global_stats.write() {
            if previous_bytes.is_none() {
                stats.entry_count += 1;
            }
            stats.memory_bytes = stats.memory_bytes.saturating_sub(replaced) + added;
        }
    }

    /// Get statistics for a specific user.
    pub fn user_stats(&self, user_id: UserId) -> CacheStats {
        if let Ok(stats) = self.user_stats.read() {
            if let Some(user_stats) = stats.get(&user_id) {
                return CacheStats {
                    hits: user_stats.hits,
                    misses: user_stats.misses,
                    entry_count: user_stats.entries,
                    memory_bytes: user_stats.size_bytes,
                    evictions: 0, // LMDB doesn't track evictions directly
                };
            }
        }
        CacheStats::default()
    }

    /// Collect keys matching a prefix together with their value sizes.
    fn collect_keys_with_prefix(
        &self,
        prefix: &[u8],
    ) -> Result<Vec<(Vec<u8>, usize)>, LmdbCacheError> {
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let mut keys = Vec::new();
        let iter = self
            .db
            .iter(&rtxn)
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        for result in iter {
            let (key, value) = result.map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
            if key.starts_with(prefix) {
                keys.push((key.to_vec(), value.len()));
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl CacheBackend for LmdbCacheBackend {
    async fn has(&self, key: &PreferenceCacheKey) -> LedgerResult<bool> {
        let encoded_key = key.encode();
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let found = self
            .db
            .get(&rtxn, encoded_key.as_slice())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
            .is_some();
        Ok(found)
    }

    async fn get(&self, key: &PreferenceCacheKey) -> LedgerResult<Option<Preference>> {
        let encoded_key = key.encode();
        let rtxn = self
            .env
            .read_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        match self.db.get(&rtxn, encoded_key.as_slice()) {
            Ok(Some(bytes)) => {
                self.record_hit(key.user_id());
                let preference: Preference = serde_json::from_slice(bytes)
                    .map_err(|e| LmdbCacheError::Deserialization(e.to_string()))?;
                Ok(Some(preference))
            }
            Ok(None) => {
                self.record_miss(key.user_id());
                Ok(None)
            }
            Err(e) => {
                self.record_miss(key.user_id());
                Err(LmdbCacheError::Transaction(e.to_string()).into())
            }
        }
    }

    async fn put_forever(
        &self,
        key: &PreferenceCacheKey,
        preference: &Preference,
    ) -> LedgerResult<()> {
        let encoded_key = key.encode();
        let value_bytes = serde_json::to_vec(preference)
            .map_err(|e| LmdbCacheError::Serialization(e.to_string()))?;

        let previous_bytes = {
            let rtxn = self
                .env
                .read_txn()
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;
            self.db
                .get(&rtxn, encoded_key.as_slice())
                .ok()
                .flatten()
                .map(|bytes| bytes.len())
        };

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.db
            .put(&mut wtxn, encoded_key.as_slice(), value_bytes.as_slice())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        self.update_entry_stats(key.user_id(), value_bytes.len(), previous_bytes);

        Ok(())
    }

    async fn forget(&self, key: &PreferenceCacheKey) -> LedgerResult<bool> {
        let encoded_key = key.encode();

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let removed_bytes = self
            .db
            .get(&wtxn, encoded_key.as_slice())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
            .map(|bytes| bytes.len() as u64);

        let deleted = self
            .db
            .delete(&mut wtxn, encoded_key.as_slice())
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        if deleted {
            let removed_bytes = removed_bytes.unwrap_or(0);
            if let Ok(mut stats) = self.user_stats.write() {
                if let Some(user_stats) = stats.get_mut(&key.user_id()) {
                    user_stats.entries = user_stats.entries.saturating_sub(1);
                    user_stats.size_bytes = user_stats.size_bytes.saturating_sub(removed_bytes);
                }
            }
            if let Ok(mut stats) = self.global_stats.write() {
                stats.entry_count = stats.entry_count.saturating_sub(1);
                stats.memory_bytes = stats.memory_bytes.saturating_sub(removed_bytes);
            }
        }

        Ok(deleted)
    }

    async fn forget_user(&self, user_id: UserId) -> LedgerResult<u64> {
        let prefix = PreferenceCacheKey::user_prefix(user_id);
        let keys_to_delete = self.collect_keys_with_prefix(&prefix)?;

        let mut wtxn = self
            .env
            .write_txn()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        let mut deleted = 0u64;
        let mut removed_bytes = 0u64;
        for (key, size) in &keys_to_delete {
            if self
                .db
                .delete(&mut wtxn, key.as_slice())
                .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?
            {
                deleted += 1;
                removed_bytes += *size as u64;
            }
        }

        wtxn.commit()
            .map_err(|e| LmdbCacheError::Transaction(e.to_string()))?;

        if let Ok(mut stats) = self.user_stats.write() {
            stats.remove(&user_id);
        }
        if let Ok(mut stats) = self.global_stats.write() {
            stats.entry_count = stats.entry_count.saturating_sub(deleted);
            stats.memory_bytes = stats.memory_bytes.saturating_sub(removed_bytes);
        }

        Ok(deleted)
    }

    async fn stats(&self) -> LedgerResult<CacheStats> {
        Ok(self
            .global_stats
            .read()
            .map(|s| s.clone())
            .unwrap_or_default())
    }
}
