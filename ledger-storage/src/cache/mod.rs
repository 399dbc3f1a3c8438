//! Cache layer for preferences.
//!
//! The cache sits in front of the preference repository and is never
//! authoritative: writes invalidate then repopulate it, deletes remove the
//! entry, and reads fill it on a miss. Entries have no expiry.
//!
//! # User Isolation
//!
//! Every entry is addressed by a [`PreferenceCacheKey`], which cannot be
//! built without a user id. Keys of different users never collide, and all
//! entries of one user share a byte prefix so they can be dropped together.

pub mod configured;
pub mod lmdb_backend;
pub mod memory_backend;
pub mod traits;
pub mod user_key;

pub use configured::ConfiguredCacheBackend;
pub use lmdb_backend::{LmdbCacheBackend, LmdbCacheError};
pub use memory_backend::InMemoryCacheBackend;
pub use traits::{CacheBackend, CacheStats};
pub use user_key::PreferenceCacheKey;
