use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ids::UserId;

//
// ─── USER ──────────────────────────────────────────────────────────────────────
//

/// Identity returned by the backend's identity-check endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

//
// ─── AUTH TOKEN ────────────────────────────────────────────────────────────────
//

/// Opaque bearer token for authenticated requests.
///
/// Only ever replaced wholesale, never mutated in place. `Debug` redacts
/// the value so tokens do not end up in logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken(String);

impl AuthToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token value, for building an `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(***)")
    }
}

//
// ─── SESSION STATE ─────────────────────────────────────────────────────────────
//

/// Where the client currently stands with respect to authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Unauthenticated,
    /// Credentials were rehydrated optimistically and are being validated.
    Loading,
    Authenticated,
}

/// Snapshot of the current authenticated identity.
///
/// Constructed only through the methods below so the invariant holds:
/// `Authenticated` always carries both a user and a token, and clearing
/// drops both at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    status: AuthStatus,
    user: Option<User>,
    token: Option<AuthToken>,
}

impl SessionState {
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self {
            status: AuthStatus::Unauthenticated,
            user: None,
            token: None,
        }
    }

    /// Optimistic state shown while a rehydrated token is validated. The
    /// cached user stays visible so a reload does not flash signed-out.
    #[must_use]
    pub fn loading(user: Option<User>, token: Option<AuthToken>) -> Self {
        Self {
            status: AuthStatus::Loading,
            user,
            token,
        }
    }

    #[must_use]
    pub fn authenticated(user: User, token: AuthToken) -> Self {
        Self {
            status: AuthStatus::Authenticated,
            user: Some(user),
            token: Some(token),
        }
    }

    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.status
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub fn token(&self) -> Option<&AuthToken> {
        self.token.as_ref()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&UserId> {
        self.user.as_ref().map(|u| &u.id)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::unauthenticated()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
