//! Authenticated session values published by the session manager.
//!
//! Services never look up "the current user" from a global. Callers obtain a
//! [`SessionContext`] from [`crate::domain::SessionManager`] and pass it into
//! each operation that acts on behalf of a user.

use super::{Error, Identity, IdentityId, Profile, Role};

/// Identity plus resolved profile of a signed-in user.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    /// Authenticated principal.
    pub identity: Identity,
    /// Profile resolved from the remote store.
    pub profile: Profile,
    /// Set when the profile could not be read and a default was substituted.
    pub degraded: bool,
}

impl SessionContext {
    /// Identity id of the signed-in user.
    pub fn identity_id(&self) -> &IdentityId {
        &self.identity.id
    }

    /// Role of the signed-in user.
    pub fn role(&self) -> Role {
        self.identity.role
    }

    /// Fail with `forbidden` unless the session holds `role`.
    pub fn require_role(&self, role: Role) -> Result<(), Error> {
        if self.role() == role {
            Ok(())
        } else {
            Err(Error::forbidden(format!(
                "operation requires the {role} role, session holds {}",
                self.role()
            )))
        }
    }
}

/// Observable authentication state.
///
/// `Unknown` until the manager has consulted the provider, `Authenticating`
/// while a sign-in or sign-up is in flight.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    /// Provider state has not been read yet.
    #[default]
    Unknown,
    /// Credentials are being exchanged with the provider.
    Authenticating,
    /// A user is signed in.
    Authenticated(SessionContext),
    /// Nobody is signed in.
    Anonymous,
}

impl SessionState {
    /// Session context when authenticated.
    pub fn context(&self) -> Option<&SessionContext> {
        match self {
            Self::Authenticated(context) => Some(context),
            Self::Unknown | Self::Authenticating | Self::Anonymous => None,
        }
    }

    /// Whether a user is signed in.
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

/// Lifecycle of the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, listener not yet running.
    Init,
    /// Listening to the provider.
    Ready,
    /// Torn down; operations fail.
    Disposed,
}
