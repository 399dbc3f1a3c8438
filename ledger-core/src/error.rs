//! Error types for Ledger operations

use crate::{PreferenceId, UserId};
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Preference not found: {name:?} for user {user_id}")]
    NotFound { user_id: UserId, name: String },

    #[error("Insert failed: {reason}")]
    InsertFailed { reason: String },

    #[error("Update failed for preference {id}: {reason}")]
    UpdateFailed { id: PreferenceId, reason: String },

    #[error("Delete failed for preference {id}: {reason}")]
    DeleteFailed { id: PreferenceId, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Cache backend errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend failure: {reason}")]
    Backend { reason: String },

    #[error("Cache serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Cache deserialization failed: {reason}")]
    Deserialization { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },

    #[error("Failed to read configuration: {reason}")]
    Io { reason: String },
}

/// Master error type for all Ledger errors.
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("No authenticated user for this operation")]
    NoCurrentUser,
}

impl LedgerError {
    /// Whether this error reports a missing preference record.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LedgerError::Storage(StorageError::NotFound { .. }))
    }
}

/// Result type alias for Ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityIdType;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            user_id: UserId::nil(),
            name: "language".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Preference not found"));
        assert!(msg.contains("\"language\""));
        assert!(msg.contains("00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn test_cache_error_display() {
        let err = CacheError::Deserialization {
            reason: "trailing bytes".to_string(),
        };
        assert!(format!("{}", err).contains("trailing bytes"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "cache.max_size_mb".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("cache.max_size_mb"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_ledger_error_from_storage() {
        let err: LedgerError = StorageError::LockPoisoned.into();
        assert!(matches!(err, LedgerError::Storage(StorageError::LockPoisoned)));
        assert!(format!("{}", err).starts_with("Storage error"));
    }

    #[test]
    fn test_is_not_found() {
        let missing: LedgerError = StorageError::NotFound {
            user_id: UserId::nil(),
            name: "x".to_string(),
        }
        .into();
        assert!(missing.is_not_found());
        assert!(!LedgerError::NoCurrentUser.is_not_found());
    }
}
