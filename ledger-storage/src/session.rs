//! Request-scoped preference access for the signed-in user.
//!
//! Without a signed-in user, reads and writes hand the caller's value back
//! untouched instead of failing.

use ledger_core::{content_digest, LedgerError, LedgerResult, Preference};
use serde_json::Value;

use crate::cache::CacheBackend;
use crate::current_user::CurrentUserProvider;
use crate::repository::PreferenceRepository;
use crate::store::PreferenceStore;

/// Outcome of a current-user read or write.
#[derive(Debug, Clone, PartialEq)]
pub enum PreferenceLookup {
    /// A record owned by the signed-in user.
    Stored(Preference),
    /// Nobody is signed in; the caller's value is returned as-is.
    Passthrough(Value),
    /// No record and no default.
    Missing,
}

impl PreferenceLookup {
    /// The value carried by this outcome, if any.
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Stored(preference) => Some(&preference.data),
            Self::Passthrough(value) => Some(value),
            Self::Missing => None,
        }
    }

    pub fn into_data(self) -> Option<Value> {
        match self {
            Self::Stored(preference) => Some(preference.data),
            Self::Passthrough(value) => Some(value),
            Self::Missing => None,
        }
    }

    /// The stored record, when there is one.
    pub fn into_preference(self) -> Option<Preference> {
        match self {
            Self::Stored(preference) => Some(preference),
            _ => None,
        }
    }

    pub fn is_stored(&self) -> bool {
        matches!(self, Self::Stored(_))
    }
}

impl From<Option<Preference>> for PreferenceLookup {
    fn from(preference: Option<Preference>) -> Self {
        preference.map_or(Self::Missing, Self::Stored)
    }
}

/// Preference operations bound to whoever `provider` reports as signed in.
///
/// The user is resolved on every call, so one handle may outlive a sign-in
/// or sign-out.
pub struct CurrentUserPreferences<'a, R, C, P>
where
    R: PreferenceRepository,
    C: CacheBackend,
    P: CurrentUserProvider,
{
    store: &'a PreferenceStore<R, C>,
    provider: &'a P,
}

impl<'a, R, C, P> CurrentUserPreferences<'a, R, C, P>
where
    R: PreferenceRepository,
    C: CacheBackend,
    P: CurrentUserProvider,
{
    pub fn new(store: &'a PreferenceStore<R, C>, provider: &'a P) -> Self {
        Self { store, provider }
    }

    pub async fn get(&self, name: &str, default: Option<Value>) -> LedgerResult<PreferenceLookup> {
        let Some(user) = self.provider.current_user() else {
            return Ok(default
                .filter(|value| !value.is_null())
                .map_or(PreferenceLookup::Missing, PreferenceLookup::Passthrough));
        };
        self.store
            .get_for_user(&user, name, default)
            .await
            .map(PreferenceLookup::from)
    }

    pub async fn set(&self, name: &str, value: Value) -> LedgerResult<PreferenceLookup> {
        let Some(user) = self.provider.current_user() else {
            return Ok(PreferenceLookup::Passthrough(value));
        };
        self.store
            .set_for_user(&user, name, value)
            .await
            .map(PreferenceLookup::Stored)
    }

    /// Delete a preference of the signed-in user.
    ///
    /// Fails with [`LedgerError::NoCurrentUser`] when nobody is signed in.
    pub async fn delete(&self, name: &str) -> LedgerResult<bool> {
        let user = self
            .provider
            .current_user()
            .ok_or(LedgerError::NoCurrentUser)?;
        self.store.delete_for_user(&user, name).await
    }

    /// Record activity now for the signed-in user.
    ///
    /// Always `true`; with nobody signed in nothing is recorded.
    pub async fn mark(&self) -> LedgerResult<bool> {
        if let Some(user) = self.provider.current_user() {
            self.store.mark_for_user(&user).await?;
        }
        Ok(true)
    }

    /// Digest of the signed-in user's last activity.
    ///
    /// With nobody signed in this is the digest of an empty value, the same
    /// on every call, and nothing is stored.
    pub async fn last_activity(&self) -> LedgerResult<String> {
        match self.provider.current_user() {
            Some(user) => self.store.last_activity_for_user(&user).await,
            None => Ok(content_digest(&Value::String(String::new()))),
        }
    }
}

impl<R, C> PreferenceStore<R, C>
where
    R: PreferenceRepository,
    C: CacheBackend,
{
    /// Bind this store to the user `provider` reports as signed in.
    pub fn for_current_user<'a, P: CurrentUserProvider>(
        &'a self,
        provider: &'a P,
    ) -> CurrentUserPreferences<'a, R, C, P> {
        CurrentUserPreferences::new(self, provider)
    }
}
