//! Cache backend chosen from configuration at runtime.

use async_trait::async_trait;
use ledger_core::{CacheBackendConfig, LedgerResult, Preference, UserId};

use super::lmdb_backend::{LmdbCacheBackend, LmdbCacheError};
use super::memory_backend::InMemoryCacheBackend;
use super::traits::{CacheBackend, CacheStats};
use super::user_key::PreferenceCacheKey;

/// Either of the built-in backends, as selected by [`CacheBackendConfig`].
pub enum ConfiguredCacheBackend {
    Memory(InMemoryCacheBackend),
    Lmdb(LmdbCacheBackend),
}

impl ConfiguredCacheBackend {
    /// Open the backend a configuration describes.
    pub fn from_config(config: &CacheBackendConfig) -> Result<Self, LmdbCacheError> {
        match config {
            CacheBackendConfig::Memory => Ok(Self::Memory(InMemoryCacheBackend::new())),
            CacheBackendConfig::Lmdb { .. } => LmdbCacheBackend::from_config(config).map(Self::Lmdb),
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, Self::Lmdb(_))
    }

    fn backend(&self) -> &dyn CacheBackend {
        match self {
            Self::Memory(backend) => backend,
            Self::Lmdb(backend) => backend,
        }
    }
}

#[async_trait]
impl CacheBackend for ConfiguredCacheBackend {
    async fn has(&self, key: &PreferenceCacheKey) -> LedgerResult<bool> {
        self.backend().has(key).await
    }

    async fn get(&self, key: &PreferenceCacheKey) -> LedgerResult<Option<Preference>> {
        self.backend().get(key).await
    }

    async fn put_forever(
        &self,
        key: &PreferenceCacheKey,
        preference: &Preference,
    ) -> LedgerResult<()> {
        self.backend().put_forever(key, preference).await
    }

    async fn forget(&self, key: &PreferenceCacheKey) -> LedgerResult<bool> {
        self.backend().forget(key).await
    }

    async fn forget_user(&self, user_id: UserId) -> LedgerResult<u64> {
        self.backend().forget_user(user_id).await
    }

    async fn stats(&self) -> LedgerResult<CacheStats> {
        self.backend().stats().await
    }
}
