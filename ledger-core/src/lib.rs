//! Ledger Core - Entity Types
//!
//! Pure data structures shared by the preference store crates.
//! This crate contains ONLY data types and pure helpers - no I/O besides
//! reading a configuration file.

pub mod config;
pub mod entities;
pub mod error;
pub mod identity;

pub use config::{
    CacheBackendConfig, MissingPreferencePolicy, PreferencesConfig, DEFAULT_LAST_ACTIVITY_NAME,
};
pub use entities::{
    validate_preference_name, NewPreference, Preference, User, MAX_PREFERENCE_NAME_LEN,
};
pub use error::{
    CacheError, ConfigError, LedgerError, LedgerResult, StorageError, ValidationError,
};
pub use identity::{
    activity_stamp, compute_content_hash, content_digest, raw_value, ContentHash, EntityIdType,
    PreferenceId, Timestamp, UserId,
};
