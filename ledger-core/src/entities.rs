//! Core entity structures

use crate::{
    content_digest, raw_value, LedgerResult, PreferenceId, Timestamp, UserId, ValidationError,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Longest accepted preference name, in bytes.
pub const MAX_PREFERENCE_NAME_LEN: usize = 255;

/// The authenticated principal on whose behalf preferences are read and written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct User {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub user_id: UserId,
}

impl User {
    pub fn new(user_id: UserId) -> Self {
        Self { user_id }
    }
}

/// Preference - one named setting for one user.
///
/// At most one preference exists per `(user_id, name)` pair. Updates keep the
/// `preference_id` and replace `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Preference {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub preference_id: PreferenceId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub user_id: UserId,
    pub name: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub data: serde_json::Value,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

impl Preference {
    /// The stored value rendered as raw text (strings verbatim, otherwise JSON).
    pub fn raw_data(&self) -> String {
        raw_value(&self.data)
    }

    /// SHA-256 hex digest of the raw stored value.
    pub fn digest(&self) -> String {
        content_digest(&self.data)
    }

    /// Decode the stored value into a concrete type.
    pub fn data_as<T: DeserializeOwned>(&self) -> LedgerResult<T> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            ValidationError::InvalidValue {
                field: self.name.clone(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

/// A preference that has not been persisted yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPreference {
    pub user_id: UserId,
    pub name: String,
    pub data: serde_json::Value,
}

impl NewPreference {
    pub fn new(user_id: UserId, name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            user_id,
            name: name.into(),
            data,
        }
    }
}

/// Check that a preference name can be stored.
pub fn validate_preference_name(name: &str) -> LedgerResult<()> {
    if name.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "name".to_string(),
        }
        .into());
    }
    if name.len() > MAX_PREFERENCE_NAME_LEN {
        return Err(ValidationError::InvalidValue {
            field: "name".to_string(),
            reason: format!(
                "{} bytes exceeds the limit of {}",
                name.len(),
                MAX_PREFERENCE_NAME_LEN
            ),
        }
        .into());
    }
    Ok(())
}
