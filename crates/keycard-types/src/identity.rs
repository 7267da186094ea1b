//! The caller on whose behalf permissions are evaluated.

use std::fmt;
use uuid::Uuid;

/// An authenticated user: the cache key plus the credential used to fetch grants.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub access_token: String,
}

impl Principal {
    pub fn new(user_id: Uuid, access_token: impl Into<String>) -> Self {
        Self {
            user_id,
            access_token: access_token.into(),
        }
    }
}

// Keep tokens out of logs.
impl fmt::Debug for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Principal")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Unauthenticated,
    Authenticated(Principal),
}

impl Identity {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Identity::Authenticated(p) => Some(p),
            Identity::Unauthenticated => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }
}

impl From<Principal> for Identity {
    fn from(principal: Principal) -> Self {
        Identity::Authenticated(principal)
    }
}
