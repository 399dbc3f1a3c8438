//! Source of the authenticated user for request-scoped calls.

use ledger_core::User;

/// Supplies the user the current request acts for, if any.
///
/// Web handlers implement this over their session or auth extractor.
pub trait CurrentUserProvider: Send + Sync {
    fn current_user(&self) -> Option<User>;
}

/// A provider that always answers with the same user (or nobody).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticCurrentUser(Option<User>);

impl StaticCurrentUser {
    pub fn signed_in(user: User) -> Self {
        Self(Some(user))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl From<Option<User>> for StaticCurrentUser {
    fn from(user: Option<User>) -> Self {
        Self(user)
    }
}

impl CurrentUserProvider for StaticCurrentUser {
    fn current_user(&self) -> Option<User> {
        self.0
    }
}
