//! Cache-aside preference store.
//!
//! Reads go to the cache first and fall back to the repository, filling the
//! cache on the way out. Writes invalidate the cache entry, persist, then put
//! the saved record back into the cache. A read that misses with a default
//! in hand persists that default.

use std::sync::Arc;

use ledger_core::{
    activity_stamp, content_digest, validate_preference_name, LedgerResult,
    MissingPreferencePolicy, NewPreference, Preference, PreferencesConfig, StorageError, User,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{CacheBackend, ConfiguredCacheBackend, PreferenceCacheKey};
use crate::locks::{KeyWriteGuard, KeyedWriteLocks};
use crate::repository::PreferenceRepository;

/// Per-user key/value preference store with a write-through cache.
///
/// # Type Parameters
///
/// - `R`: The repository holding the authoritative records
/// - `C`: The cache backend fronting the repository
///
/// # Consistency
///
/// Writers to the same key are serialized when `serialize_writes` is on.
/// Readers never lock: a read that misses the cache while a write to the
/// same key is in flight may put the pre-write record back into the cache.
pub struct PreferenceStore<R, C>
where
    R: PreferenceRepository,
    C: CacheBackend,
{
    repository: Arc<R>,
    cache: Arc<C>,
    config: PreferencesConfig,
    locks: KeyedWriteLocks,
}

impl<R, C> PreferenceStore<R, C>
where
    R: PreferenceRepository,
    C: CacheBackend,
{
    /// Create a new store.
    pub fn new(repository: Arc<R>, cache: Arc<C>, config: PreferencesConfig) -> Self {
        Self {
            repository,
            cache,
            config,
            locks: KeyedWriteLocks::new(),
        }
    }

    /// Create a new store with default configuration.
    pub fn with_defaults(repository: Arc<R>, cache: Arc<C>) -> Self {
        Self::new(repository, cache, PreferencesConfig::default())
    }

    /// Get the store configuration.
    pub fn config(&self) -> &PreferencesConfig {
        &self.config
    }

    /// Get a reference to the repository.
    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Get a reference to the cache backend.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// Read a preference for `user`.
    ///
    /// Returns the cached record when present, otherwise the repository
    /// record (which is then cached). When neither exists and `default` is
    /// given and not `null`, the default is persisted and returned as a new
    /// record.
    pub async fn get_for_user(
        &self,
        user: &User,
        name: &str,
        default: Option<Value>,
    ) -> LedgerResult<Option<Preference>> {
        validate_preference_name(name)?;
        let key = PreferenceCacheKey::new(user.user_id, name);

        if let Some(cached) = self.cache.get(&key).await? {
            debug!(user_id = %user.user_id, name, "preference cache hit");
            return Ok(Some(cached));
        }

        if let Some(found) = self.repository.find_one(user.user_id, name).await? {
            debug!(user_id = %user.user_id, name, "preference cache miss, loaded from repository");
            self.cache.put_forever(&key, &found).await?;
            return Ok(Some(found));
        }

        // A null default counts as no default.
        match default.filter(|value| !value.is_null()) {
            None => Ok(None),
            Some(value) => {
                debug!(user_id = %user.user_id, name, "materializing default preference");
                self.set_for_user(user, name, value).await.map(Some)
            }
        }
    }

    /// Create or replace a preference for `user`.
    ///
    /// An existing record keeps its id and gets the new value.
    pub async fn set_for_user(
        &self,
        user: &User,
        name: &str,
        value: Value,
    ) -> LedgerResult<Preference> {
        validate_preference_name(name)?;
        let key = PreferenceCacheKey::new(user.user_id, name);
        let _guard = self.write_guard(&key).await?;

        self.cache.forget(&key).await?;

        let saved = match self.repository.find_one(user.user_id, name).await? {
            Some(mut existing) => {
                existing.data = value;
                self.repository.update(&existing).await?
            }
            None => {
                self.repository
                    .insert(NewPreference::new(user.user_id, name, value))
                    .await?
            }
        };

        self.cache.put_forever(&key, &saved).await?;
        debug!(user_id = %user.user_id, name, preference_id = %saved.preference_id, "preference saved");
        Ok(saved)
    }

    /// Delete a preference for `user`, from the cache and the repository.
    ///
    /// Returns `true` when a record was removed. A missing record is an
    /// error under [`MissingPreferencePolicy::Error`] and `false` under
    /// [`MissingPreferencePolicy::Ignore`].
    pub async fn delete_for_user(&self, user: &User, name: &str) -> LedgerResult<bool> {
        validate_preference_name(name)?;
        let key = PreferenceCacheKey::new(user.user_id, name);
        let _guard = self.write_guard(&key).await?;

        if self.cache.has(&key).await? {
            self.cache.forget(&key).await?;
        }

        let Some(existing) = self.repository.find_one(user.user_id, name).await? else {
            return match self.config.missing_on_delete {
                MissingPreferencePolicy::Error => Err(StorageError::NotFound {
                    user_id: user.user_id,
                    name: name.to_string(),
                }
                .into()),
                MissingPreferencePolicy::Ignore => {
                    warn!(user_id = %user.user_id, name, "delete of absent preference ignored");
                    Ok(false)
                }
            };
        };

        self.repository.delete(&existing).await?;
        info!(user_id = %user.user_id, name, preference_id = %existing.preference_id, "preference deleted");
        Ok(true)
    }

    /// Record the current time as `user`'s last activity.
    ///
    /// Repeated calls update the same record.
    pub async fn mark_for_user(&self, user: &User) -> LedgerResult<Preference> {
        let name = self.config.last_activity_name.clone();
        self.set_for_user(user, &name, Value::String(activity_stamp()))
            .await
    }

    /// Digest of `user`'s last activity marker.
    ///
    /// A user without a marker gets one stamped now, which is persisted.
    pub async fn last_activity_for_user(&self, user: &User) -> LedgerResult<String> {
        let name = self.config.last_activity_name.clone();
        let preference = self
            .get_for_user(user, &name, Some(Value::String(activity_stamp())))
            .await?;

        Ok(match preference {
            Some(preference) => preference.digest(),
            // Unreachable with a default supplied, kept total for custom repositories.
            None => content_digest(&Value::Null),
        })
    }

    /// Drop every cached entry of `user`. The repository is not touched.
    pub async fn forget_cached(&self, user: &User) -> LedgerResult<u64> {
        let removed = self.cache.forget_user(user.user_id).await?;
        debug!(user_id = %user.user_id, removed, "cached preferences dropped");
        Ok(removed)
    }

    async fn write_guard(&self, key: &PreferenceCacheKey) -> LedgerResult<Option<KeyWriteGuard>> {
        if !self.config.serialize_writes {
            return Ok(None);
        }
        self.locks.acquire(key).await.map(Some)
    }
}

impl<R> PreferenceStore<R, ConfiguredCacheBackend>
where
    R: PreferenceRepository,
{
    /// Validate `config` and open the cache backend it names.
    pub fn from_config(repository: Arc<R>, config: PreferencesConfig) -> LedgerResult<Self> {
        config.validate()?;
        let cache = ConfiguredCacheBackend::from_config(&config.cache)?;
        info!(persistent = cache.is_persistent(), "preference store opened");
        Ok(Self::new(repository, Arc::new(cache), config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheBackend;
    use crate::repository::InMemoryPreferenceRepository;
    use ledger_core::{CacheBackendConfig, EntityIdType, LedgerError, UserId, ValidationError};
    use serde_json::json;

    type TestStore = PreferenceStore<InMemoryPreferenceRepository, InMemoryCacheBackend>;

    fn make_store(config: PreferencesConfig) -> TestStore {
        PreferenceStore::new(
            Arc::new(InMemoryPreferenceRepository::new()),
            Arc::new(InMemoryCacheBackend::new()),
            config,
        )
    }

    fn user() -> User {
        User::new(UserId::now_v7())
    }

    #[tokio::test]
    async fn test_get_missing_without_default_is_none() {
        let store = make_store(PreferencesConfig::default());
        let result = store.get_for_user(&user(), "language", None).await.unwrap();
        assert!(result.is_none());
        assert_eq!(store.repository().preference_count(), 0);
    }

    #[tokio::test]
    async fn test_get_loads_from_repository_and_caches() {
        let store = make_store(PreferencesConfig::default());
        let user = user();
        store
            .repository()
            .insert(NewPreference::new(user.user_id, "language", json!("en_US")))
            .await
            .unwrap();

        let first = store.get_for_user(&user, "language", None).await.unwrap();
        let second = store.get_for_user(&user, "language", None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.repository().find_calls(), 1);
        assert_eq!(store.cache().stats().await.unwrap().hits, 1);
    }

    #[tokio::test]
    async fn test_cached_entry_is_trusted_over_repository() {
        let store = make_store(PreferencesConfig::default());
        let user = user();
        let saved = store.set_for_user(&user, "viewRange", json!("1M")).await.unwrap();

        // Change the repository behind the cache's back.
        let mut changed = saved.clone();
        changed.data = json!("6M");
        store.repository().update(&changed).await.unwrap();

        let read = store.get_for_user(&user, "viewRange", None).await.unwrap();
        assert_eq!(read.unwrap().data, json!("1M"));
    }

    #[tokio::test]
    async fn test_set_updates_in_place() {
        let store = make_store(PreferencesConfig::default());
        let user = user();

        let first = store.set_for_user(&user, "language", json!("en_US")).await.unwrap();
        let second = store.set_for_user(&user, "language", json!("de_DE")).await.unwrap();

        assert_eq!(first.preference_id, second.preference_id);
        assert_eq!(second.data, json!("de_DE"));
        assert_eq!(store.repository().preference_count(), 1);
    }

    #[tokio::test]
    async fn test_default_is_materialized() {
        let store = make_store(PreferencesConfig::default());
        let user = user();

        let created = store
            .get_for_user(&user, "listPageSize", Some(json!(50)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(created.data, json!(50));

        // A later read with a different default still sees the stored value.
        let again = store
            .get_for_user(&user, "listPageSize", Some(json!(10)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(again.preference_id, created.preference_id);
        assert_eq!(again.data, json!(50));
    }

    #[tokio::test]
    async fn test_null_default_is_not_materialized() {
        let store = make_store(PreferencesConfig::default());
        let user = user();

        let result = store
            .get_for_user(&user, "language", Some(Value::Null))
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(store.repository().preference_count(), 0);
        assert!(store.cache().is_empty());
    }

    #[tokio::test]
    async fn test_from_config_uses_configured_backend() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = PreferencesConfig::default().with_cache(CacheBackendConfig::Lmdb {
            path: dir.path().to_path_buf(),
            max_size_mb: 8,
        });
        let store =
            PreferenceStore::from_config(Arc::new(InMemoryPreferenceRepository::new()), config)
                .unwrap();
        assert!(store.cache().is_persistent());

        let user = user();
        store.set_for_user(&user, "language", json!("en_US")).await.unwrap();
        let read = store.get_for_user(&user, "language", None).await.unwrap();
        assert_eq!(read.unwrap().data, json!("en_US"));
        assert_eq!(store.repository().find_calls(), 1);
    }

    #[test]
    fn test_from_config_rejects_invalid_config() {
        let mut config = PreferencesConfig::default();
        config.last_activity_name = String::new();
        let result =
            PreferenceStore::from_config(Arc::new(InMemoryPreferenceRepository::new()), config);
        assert!(matches!(result, Err(LedgerError::Config(_))));
    }

    #[tokio::test]
    async fn test_delete_missing_is_error_by_default() {
        let store = make_store(PreferencesConfig::default());
        let result = store.delete_for_user(&user(), "nothing").await;
        assert!(result.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_delete_missing_ignored_by_policy() {
        let store = make_store(
            PreferencesConfig::default().with_missing_on_delete(MissingPreferencePolicy::Ignore),
        );
        assert!(!store.delete_for_user(&user(), "nothing").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_clears_cache_and_repository() {
        let store = make_store(PreferencesConfig::default());
        let user = user();
        store.set_for_user(&user, "language", json!("en_US")).await.unwrap();

        assert!(store.delete_for_user(&user, "language").await.unwrap());

        let key = PreferenceCacheKey::new(user.user_id, "language");
        assert!(!store.cache().has(&key).await.unwrap());
        assert_eq!(store.repository().preference_count(), 0);
        assert!(store.get_for_user(&user, "language", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_name_rejected_before_io() {
        let store = make_store(PreferencesConfig::default());
        let result = store.get_for_user(&user(), "", None).await;
        assert!(matches!(
            result,
            Err(LedgerError::Validation(ValidationError::RequiredFieldMissing { .. }))
        ));
        assert_eq!(store.repository().find_calls(), 0);
    }

    #[tokio::test]
    async fn test_mark_reuses_record() {
        let store = make_store(PreferencesConfig::default());
        let user = user();

        let first = store.mark_for_user(&user).await.unwrap();
        let second = store.mark_for_user(&user).await.unwrap();

        assert_eq!(first.name, "lastActivity");
        assert_eq!(first.preference_id, second.preference_id);
        assert_eq!(store.repository().preference_count(), 1);
    }

    #[tokio::test]
    async fn test_last_activity_creates_marker_once() {
        let store = make_store(PreferencesConfig::default());
        let user = user();

        let first = store.last_activity_for_user(&user).await.unwrap();
        let second = store.last_activity_for_user(&user).await.unwrap();

        assert_eq!(first.len(), 64);
        assert_eq!(first, second);
        assert_eq!(store.repository().preference_count(), 1);
    }

    #[tokio::test]
    async fn test_last_activity_uses_configured_name() {
        let mut config = PreferencesConfig::default();
        config.last_activity_name = "seenAt".to_string();
        let store = make_store(config);
        let user = user();

        let marked = store.mark_for_user(&user).await.unwrap();
        assert_eq!(marked.name, "seenAt");
        assert_eq!(
            store.last_activity_for_user(&user).await.unwrap(),
            marked.digest()
        );
    }

    #[tokio::test]
    async fn test_forget_cached_keeps_repository() {
        let store = make_store(PreferencesConfig::default());
        let user = user();
        store.set_for_user(&user, "a", json!(1)).await.unwrap();
        store.set_for_user(&user, "b", json!(2)).await.unwrap();

        assert_eq!(store.forget_cached(&user).await.unwrap(), 2);
        assert_eq!(store.repository().preference_count(), 2);

        let reloaded = store.get_for_user(&user, "a", None).await.unwrap().unwrap();
        assert_eq!(reloaded.data, json!(1));
    }

    #[tokio::test]
    async fn test_unserialized_writes_still_work() {
        let store = make_store(PreferencesConfig::default().with_serialized_writes(false));
        let user = user();
        store.set_for_user(&user, "language", json!("en_US")).await.unwrap();
        assert!(store.delete_for_user(&user, "language").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers_keep_one_record() {
        let store = Arc::new(make_store(PreferencesConfig::default()));
        let user = user();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.set_for_user(&user, "counter", json!(i)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.repository().preference_count(), 1);
        let cached = store.get_for_user(&user, "counter", None).await.unwrap().unwrap();
        let stored = store
            .repository()
            .find_one(user.user_id, "counter")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cached.data, stored.data);
    }
}
