//! Ledger Test Utilities
//!
//! Shared test infrastructure for the ledger workspace:
//! - Proptest generators for users, names and preference values
//! - A call-counting repository wrapper
//! - Store and config fixtures
//! - Assertions over `LedgerResult`

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use tracing_subscriber::EnvFilter;

// Re-export core types for convenience
pub use ledger_core::{
    CacheBackendConfig, EntityIdType, LedgerError, LedgerResult, MissingPreferencePolicy,
    NewPreference, Preference, PreferenceId, PreferencesConfig, StorageError, User, UserId,
    ValidationError,
};
pub use ledger_storage::{
    CacheBackend, InMemoryCacheBackend, InMemoryPreferenceRepository, PreferenceRepository,
    PreferenceStore, StaticCurrentUser,
};

static TRACING: Once = Once::new();

/// Install a fmt subscriber writing through the test harness, once per process.
///
/// Honors `RUST_LOG`; defaults to `ledger_storage=debug`.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("ledger_storage=debug,warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_test_writer()
            .try_init();
    });
}

/// Single-threaded runtime for driving async code from proptest bodies.
pub fn test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build test runtime")
}

// ============================================================================
// COUNTING REPOSITORY
// ============================================================================

/// Repository wrapper that counts every call reaching the inner repository.
#[derive(Debug, Default)]
pub struct CountingRepository<R> {
    inner: R,
    finds: AtomicU64,
    inserts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
}

/// Snapshot of [`CountingRepository`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryCalls {
    pub finds: u64,
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
}

impl<R: PreferenceRepository> CountingRepository<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            finds: AtomicU64::new(0),
            inserts: AtomicU64::new(0),
            updates: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn calls(&self) -> RepositoryCalls {
        RepositoryCalls {
            finds: self.finds.load(Ordering::SeqCst),
            inserts: self.inserts.load(Ordering::SeqCst),
            updates: self.updates.load(Ordering::SeqCst),
            deletes: self.deletes.load(Ordering::SeqCst),
        }
    }

    pub fn reset(&self) {
        for counter in [&self.finds, &self.inserts, &self.updates, &self.deletes] {
            counter.store(0, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl<R: PreferenceRepository> PreferenceRepository for CountingRepository<R> {
    async fn find_one(&self, user_id: UserId, name: &str) -> LedgerResult<Option<Preference>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find_one(user_id, name).await
    }

    async fn insert(&self, new: NewPreference) -> LedgerResult<Preference> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(new).await
    }

    async fn update(&self, preference: &Preference) -> LedgerResult<Preference> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(preference).await
    }

    async fn delete(&self, preference: &Preference) -> LedgerResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(preference).await
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for preference store inputs.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{Map, Value};
    use uuid::Uuid;

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a random UserId.
    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        arb_uuid().prop_map(UserId::new)
    }

    pub fn arb_user() -> impl Strategy<Value = User> {
        arb_user_id().prop_map(User::new)
    }

    /// Two users with different ids.
    pub fn arb_distinct_users() -> impl Strategy<Value = (User, User)> {
        (arb_user(), arb_user()).prop_filter("users must differ", |(a, b)| a != b)
    }

    /// Generate a valid preference name.
    pub fn arb_preference_name() -> impl Strategy<Value = String> {
        prop_oneof![
            // Names the application actually uses
            Just("language".to_string()),
            Just("viewRange".to_string()),
            Just("listPageSize".to_string()),
            Just("frontpageAccounts".to_string()),
            // Identifiers
            "[a-zA-Z][a-zA-Z0-9_.]{0,31}",
            // Arbitrary unicode, still non-empty and bounded
            "\\PC{1,40}",
        ]
    }

    /// Generate a JSON leaf value. Floats are left out so equality stays exact.
    pub fn arb_json_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::from),
            "\\PC{0,24}".prop_map(Value::String),
        ]
    }

    /// Generate a JSON value up to three levels deep.
    pub fn arb_json_value() -> impl Strategy<Value = Value> {
        arb_json_scalar().prop_recursive(3, 24, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,8}", inner, 0..6)
                    .prop_map(|entries| Value::Object(entries.into_iter().collect::<Map<_, _>>())),
            ]
        })
    }

    pub fn arb_missing_policy() -> impl Strategy<Value = MissingPreferencePolicy> {
        prop_oneof![
            Just(MissingPreferencePolicy::Error),
            Just(MissingPreferencePolicy::Ignore),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built users, configs and stores.

    use super::*;

    /// Store over in-memory collaborators.
    pub type MemoryStore = PreferenceStore<InMemoryPreferenceRepository, InMemoryCacheBackend>;

    /// Store whose repository calls are counted.
    pub type CountingStore =
        PreferenceStore<CountingRepository<InMemoryPreferenceRepository>, InMemoryCacheBackend>;

    pub fn test_user() -> User {
        User::new(UserId::now_v7())
    }

    /// Config that treats deleting an absent preference as a no-op.
    pub fn lenient_config() -> PreferencesConfig {
        PreferencesConfig::default().with_missing_on_delete(MissingPreferencePolicy::Ignore)
    }

    pub fn memory_store() -> MemoryStore {
        memory_store_with(PreferencesConfig::default())
    }

    pub fn memory_store_with(config: PreferencesConfig) -> MemoryStore {
        PreferenceStore::new(
            Arc::new(InMemoryPreferenceRepository::new()),
            Arc::new(InMemoryCacheBackend::new()),
            config,
        )
    }

    pub fn counting_store() -> CountingStore {
        PreferenceStore::with_defaults(
            Arc::new(CountingRepository::new(InMemoryPreferenceRepository::new())),
            Arc::new(InMemoryCacheBackend::new()),
        )
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for ledger-specific results.

    use super::*;
    use serde_json::Value;

    /// Assert that a LedgerResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &LedgerResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a LedgerResult is Err.
    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &LedgerResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    /// Assert that a LedgerResult is a NotFound storage error for `name`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &LedgerResult<T>, name: &str) {
        match result {
            Err(LedgerError::Storage(StorageError::NotFound { name: missing, .. })) => {
                assert_eq!(missing, name, "Wrong name in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", name, other),
        }
    }

    /// Assert that a LedgerResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &LedgerResult<T>) {
        match result {
            Err(LedgerError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_no_current_user<T: std::fmt::Debug>(result: &LedgerResult<T>) {
        match result {
            Err(LedgerError::NoCurrentUser) => {}
            other => panic!("Expected NoCurrentUser error, got: {:?}", other),
        }
    }

    /// Assert that a preference belongs to `user` and holds `expected`.
    #[track_caller]
    pub fn assert_preference(preference: &Preference, user: &User, name: &str, expected: &Value) {
        assert_eq!(preference.user_id, user.user_id, "Preference owned by wrong user");
        assert_eq!(preference.name, name, "Preference name mismatch");
        assert_eq!(&preference.data, expected, "Preference data mismatch");
    }

    /// Assert that two preferences are the same stored record.
    #[track_caller]
    pub fn assert_same_record(a: &Preference, b: &Preference) {
        assert_eq!(
            a.preference_id, b.preference_id,
            "Expected one record, got {} and {}",
            a.preference_id, b.preference_id
        );
    }
}
