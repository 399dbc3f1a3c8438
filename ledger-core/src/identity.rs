//! Identity types for Ledger entities

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// SHA-256 content hash for digests and integrity verification.
pub type ContentHash = [u8; 32];

/// Common behaviour of the strongly-typed entity identifiers.
///
/// All identifiers wrap a UUIDv7 so they sort by creation time.
pub trait EntityIdType: Copy + Eq + std::hash::Hash + fmt::Display {
    /// Wrap an existing UUID.
    fn new(uuid: Uuid) -> Self;

    /// Borrow the underlying UUID.
    fn as_uuid(&self) -> Uuid;

    /// Generate a fresh timestamp-sortable identifier.
    fn now_v7() -> Self {
        Self::new(Uuid::now_v7())
    }

    /// The all-zero identifier.
    fn nil() -> Self {
        Self::new(Uuid::nil())
    }
}

/// Identifier of a user owning preferences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

/// Identifier of a persisted preference record, assigned by the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PreferenceId(Uuid);

impl EntityIdType for UserId {
    fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl EntityIdType for PreferenceId {
    fn new(uuid: Uuid) -> Self {
        Self(uuid)
    }

    fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl fmt::Display for PreferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Compute SHA-256 hash of content.
pub fn compute_content_hash(content: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(content);
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Render a preference value the way it is fed to the digest.
///
/// Strings are taken verbatim; anything else uses compact JSON.
pub fn raw_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Lowercase hex SHA-256 digest of a preference value (64 characters).
pub fn content_digest(value: &serde_json::Value) -> String {
    hex::encode(compute_content_hash(raw_value(value).as_bytes()))
}

/// Current UTC time with microsecond precision, used as an activity marker.
pub fn activity_stamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ids_roundtrip_uuid() {
        let uuid = Uuid::now_v7();
        assert_eq!(UserId::new(uuid).as_uuid(), uuid);
        assert_eq!(PreferenceId::new(uuid).as_uuid(), uuid);
        assert_eq!(UserId::nil().as_uuid(), Uuid::nil());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = UserId::now_v7();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.as_uuid()));
    }

    #[test]
    fn test_content_hash_known_value() {
        let hash = compute_content_hash(b"");
        assert_eq!(
            hex::encode(hash),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_digest_of_string_hashes_raw_contents() {
        let digest = content_digest(&json!("abc"));
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_is_stable_and_fixed_length() {
        let value = json!({"theme": "dark", "page": 3});
        let first = content_digest(&value);
        let second = content_digest(&value);
        assert_eq!(first, second);
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_digest_of_string_and_number_share_raw_form() {
        assert_ne!(content_digest(&json!("1")), content_digest(&json!("2")));
        // "1" as a string and 1 as a number share a raw rendering
        assert_eq!(content_digest(&json!("1")), content_digest(&json!(1)));
    }

    #[test]
    fn test_activity_stamp_parses_back() {
        let stamp = activity_stamp();
        let parsed = DateTime::parse_from_rfc3339(&stamp);
        assert!(parsed.is_ok(), "stamp {} should be RFC 3339", stamp);
        assert!(stamp.ends_with('Z'));
    }
}
