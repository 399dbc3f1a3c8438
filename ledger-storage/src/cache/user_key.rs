//! User-scoped cache key for preference entries.
//!
//! `PreferenceCacheKey`'s private constructor means a key can only be built
//! from an explicit user id and preference name. Keys never collide across
//! users because the encoding is injective.

use std::fmt;

use ledger_core::{EntityIdType, UserId};
use uuid::Uuid;

/// Separator byte between the user id and the preference name.
///
/// `0xFF` never appears in well-formed UTF-8.
const SEPARATOR: u8 = 0xFF;

/// Length of the user prefix: 16 UUID bytes plus the separator.
const PREFIX_LEN: usize = 17;

/// A cache key scoped to one user and one preference name.
///
/// # Binary Format
///
/// - Bytes 0-15: user_id (UUID as bytes)
/// - Byte 16: separator (0xFF)
/// - Bytes 17..: preference name (UTF-8)
///
/// The user id is fixed width, so `(user 1, "0x")` and `(user 10, "x")`
/// can never encode to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreferenceCacheKey {
    inner: KeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct KeyInner {
    user_id: UserId,
    name: String,
}

impl PreferenceCacheKey {
    /// Create a key for `name` owned by `user_id`.
    pub fn new(user_id: UserId, name: impl Into<String>) -> Self {
        Self {
            inner: KeyInner {
                user_id,
                name: name.into(),
            },
        }
    }

    /// Get the user this key is scoped to.
    pub fn user_id(&self) -> UserId {
        self.inner.user_id
    }

    /// Get the preference name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Encode this key to bytes for storage.
    pub fn encode(&self) -> Vec<u8> {
        let name = self.inner.name.as_bytes();
        let mut bytes = Vec::with_capacity(PREFIX_LEN + name.len());
        bytes.extend_from_slice(&Self::user_prefix(self.inner.user_id));
        bytes.extend_from_slice(name);
        bytes
    }

    /// Decode a key from bytes.
    ///
    /// Returns `None` if the slice is shorter than the prefix, the separator
    /// is wrong, or the name is not valid UTF-8.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < PREFIX_LEN || bytes[16] != SEPARATOR {
            return None;
        }

        let user_id = UserId::new(Uuid::from_slice(&bytes[0..16]).ok()?);
        let name = std::str::from_utf8(&bytes[PREFIX_LEN..]).ok()?;

        Some(Self::new(user_id, name))
    }

    /// Prefix shared by every key belonging to `user_id`.
    ///
    /// Used for range scans when invalidating a whole user.
    pub fn user_prefix(user_id: UserId) -> [u8; PREFIX_LEN] {
        let mut prefix = [0u8; PREFIX_LEN];
        prefix[0..16].copy_from_slice(user_id.as_uuid().as_bytes());
        prefix[16] = SEPARATOR;
        prefix
    }
}

impl fmt::Display for PreferenceCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "preference:{}:{}", self.inner.user_id, self.inner.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_and_getters() {
        let user_id = UserId::now_v7();
        let key = PreferenceCacheKey::new(user_id, "language");

        assert_eq!(key.user_id(), user_id);
        assert_eq!(key.name(), "language");
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let key = PreferenceCacheKey::new(UserId::now_v7(), "viewRange");
        let decoded = PreferenceCacheKey::decode(&key.encode()).expect("decode should succeed");
        assert_eq!(key, decoded);
    }

    #[test]
    fn test_empty_name_encodes_to_prefix() {
        let user_id = UserId::now_v7();
        let key = PreferenceCacheKey::new(user_id, "");
        assert_eq!(key.encode(), PreferenceCacheKey::user_prefix(user_id).to_vec());
    }

    #[test]
    fn test_decode_too_short() {
        assert!(PreferenceCacheKey::decode(&[0u8; 16]).is_none());
    }

    #[test]
    fn test_decode_wrong_separator() {
        let mut bytes = PreferenceCacheKey::new(UserId::now_v7(), "x").encode();
        bytes[16] = 0x00;
        assert!(PreferenceCacheKey::decode(&bytes).is_none());
    }

    #[test]
    fn test_decode_invalid_utf8_name() {
        let mut bytes = PreferenceCacheKey::user_prefix(UserId::now_v7()).to_vec();
        bytes.extend_from_slice(&[0xC3, 0x28]);
        assert!(PreferenceCacheKey::decode(&bytes).is_none());
    }

    #[test]
    fn test_concatenation_collision_is_impossible() {
        // Bare concatenation would make these two identical.
        let user_1 = UserId::new(Uuid::from_u128(1));
        let user_10 = UserId::new(Uuid::from_u128(10));

        let key_a = PreferenceCacheKey::new(user_1, "0x");
        let key_b = PreferenceCacheKey::new(user_10, "x");

        assert_ne!(key_a.encode(), key_b.encode());
    }

    #[test]
    fn test_display() {
        let user_id = UserId::nil();
        let key = PreferenceCacheKey::new(user_id, "lastActivity");
        assert_eq!(
            key.to_string(),
            "preference:00000000-0000-0000-0000-000000000000:lastActivity"
        );
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn user_id_strategy() -> impl Strategy<Value = UserId> {
        any::<[u8; 16]>().prop_map(|bytes| UserId::new(Uuid::from_bytes(bytes)))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Property: Encode/decode roundtrip preserves the original value.
        #[test]
        fn prop_encode_decode_roundtrip(user_id in user_id_strategy(), name in ".{0,64}") {
            let key = PreferenceCacheKey::new(user_id, name);
            let decoded = PreferenceCacheKey::decode(&key.encode());
            prop_assert_eq!(Some(key), decoded);
        }

        /// Property: Encoding is injective (different keys, different bytes).
        #[test]
        fn prop_encoding_is_injective(
            user_a in user_id_strategy(),
            user_b in user_id_strategy(),
            name_a in "[a-zA-Z0-9]{0,12}",
            name_b in "[a-zA-Z0-9]{0,12}",
        ) {
            let key_a = PreferenceCacheKey::new(user_a, name_a);
            let key_b = PreferenceCacheKey::new(user_b, name_b);

            if key_a == key_b {
                prop_assert_eq!(key_a.encode(), key_b.encode());
            } else {
                prop_assert_ne!(key_a.encode(), key_b.encode());
            }
        }

        /// Property: The user prefix starts every key of that user.
        #[test]
        fn prop_user_prefix_is_prefix(user_id in user_id_strategy(), name in "\\PC{0,32}") {
            let key = PreferenceCacheKey::new(user_id, name);
            let encoded = key.encode();
            let prefix = PreferenceCacheKey::user_prefix(user_id);
            prop_assert_eq!(&encoded[0..PREFIX_LEN], &prefix[..]);
        }
    }
}
