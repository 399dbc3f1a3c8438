//! Ledger Storage - Cached Preference Store
//!
//! Per-user key/value preferences with a write-through cache in front of a
//! pluggable repository. The production repository lives with the host
//! application's database layer.

pub mod cache;
pub mod current_user;
pub mod locks;
pub mod repository;
pub mod session;
pub mod store;

// Re-export cache types for host integration
pub use cache::{
    CacheBackend, CacheStats, ConfiguredCacheBackend, InMemoryCacheBackend, LmdbCacheBackend,
    LmdbCacheError, PreferenceCacheKey,
};
pub use current_user::{CurrentUserProvider, StaticCurrentUser};
pub use locks::{KeyWriteGuard, KeyedWriteLocks};
pub use repository::{InMemoryPreferenceRepository, PreferenceRepository};
pub use session::{CurrentUserPreferences, PreferenceLookup};
pub use store::PreferenceStore;
