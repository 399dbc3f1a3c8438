//! Configuration types

use crate::{ConfigError, LedgerResult, MAX_PREFERENCE_NAME_LEN};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the preference that records a user's last activity.
pub const DEFAULT_LAST_ACTIVITY_NAME: &str = "lastActivity";

/// What deleting a preference that does not exist does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPreferencePolicy {
    /// Report `StorageError::NotFound`.
    #[default]
    Error,
    /// Succeed without deleting anything.
    Ignore,
}

/// Which cache backend fronts the repository.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CacheBackendConfig {
    /// Process-local map, lost on restart.
    #[default]
    Memory,
    /// LMDB environment on disk.
    Lmdb { path: PathBuf, max_size_mb: usize },
}

/// Preference store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PreferencesConfig {
    pub last_activity_name: String,
    pub missing_on_delete: MissingPreferencePolicy,
    /// Serialize writers on the same `(user, name)` pair.
    pub serialize_writes: bool,
    pub cache: CacheBackendConfig,
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            last_activity_name: DEFAULT_LAST_ACTIVITY_NAME.to_string(),
            missing_on_delete: MissingPreferencePolicy::Error,
            serialize_writes: true,
            cache: CacheBackendConfig::Memory,
        }
    }
}

impl PreferencesConfig {
    /// Parse a TOML document and validate the result.
    pub fn from_toml_str(contents: &str) -> LedgerResult<Self> {
        let config: PreferencesConfig =
            toml::from_str(contents).map_err(|e| ConfigError::Parse {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> LedgerResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            reason: format!("{}: {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Set the missing-preference policy for deletes.
    pub fn with_missing_on_delete(mut self, policy: MissingPreferencePolicy) -> Self {
        self.missing_on_delete = policy;
        self
    }

    /// Enable or disable per-key write serialization.
    pub fn with_serialized_writes(mut self, enabled: bool) -> Self {
        self.serialize_writes = enabled;
        self
    }

    /// Select the cache backend.
    pub fn with_cache(mut self, cache: CacheBackendConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(LedgerError::Config) if invalid.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.last_activity_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "last_activity_name".to_string(),
                value: self.last_activity_name.clone(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        if self.last_activity_name.len() > MAX_PREFERENCE_NAME_LEN {
            return Err(ConfigError::InvalidValue {
                field: "last_activity_name".to_string(),
                value: self.last_activity_name.clone(),
                reason: format!("must be at most {} bytes", MAX_PREFERENCE_NAME_LEN),
            }
            .into());
        }

        if let CacheBackendConfig::Lmdb { path, max_size_mb } = &self.cache {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "cache.path".to_string(),
                    value: String::new(),
                    reason: "must not be empty".to_string(),
                }
                .into());
            }
            if *max_size_mb == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "cache.max_size_mb".to_string(),
                    value: max_size_mb.to_string(),
                    reason: "must be > 0".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }
}
