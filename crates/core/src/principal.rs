//! The resolved identity of a single request.

use uuid::Uuid;

/// An authenticated account attached to a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedAccount {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    /// Whether the account has completed activation.
    pub activated: bool,
}

/// The caller identity for a single request.
///
/// `Anonymous` is a distinguished value created per unauthenticated request;
/// it is never persisted and carries no identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    User(AuthenticatedAccount),
}

impl Principal {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }

    /// Whether the caller is an activated account. False for anonymous.
    pub fn is_activated(&self) -> bool {
        match self {
            Self::Anonymous => false,
            Self::User(account) => account.activated,
        }
    }

    /// The account identifier, if authenticated.
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Self::Anonymous => None,
            Self::User(account) => Some(account.user_id),
        }
    }

    /// The authenticated account, if any.
    pub fn account(&self) -> Option<&AuthenticatedAccount> {
        match self {
            Self::Anonymous => None,
            Self::User(account) => Some(account),
        }
    }
}
