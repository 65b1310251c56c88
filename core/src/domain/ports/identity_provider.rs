//! Port for the remote identity provider.
//!
//! The provider owns accounts and the live authentication session. The
//! session stream is exposed as a [`tokio::sync::watch`] receiver: it always
//! holds the current user and notifies on sign-in, sign-out, token refresh
//! and remote invalidation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::domain::{Credentials, Email, IdentityId};

use super::define_port_error;

define_port_error! {
    /// Errors raised by identity provider adapters.
    pub enum IdentityProviderError {
        /// An account already exists for the email.
        EmailInUse { email: String } => "email already in use: {email}",
        /// Email and password did not match an account.
        InvalidCredential => "invalid email or password",
        /// Provider could not be reached.
        Connection { message: String } => "identity provider unreachable: {message}",
        /// Provider refused the request for another reason.
        Rejected { message: String } => "identity provider rejected request: {message}",
    }
}

/// Account as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Provider-issued identifier.
    pub id: IdentityId,
    /// Account email.
    pub email: Email,
    /// Account creation time.
    pub created_at: DateTime<Utc>,
}

/// Port for account management and the authentication session.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account and sign it in.
    async fn create_account(&self, credentials: &Credentials)
    -> Result<AuthUser, IdentityProviderError>;

    /// Sign in to an existing account.
    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthUser, IdentityProviderError>;

    /// End the provider session.
    async fn sign_out(&self) -> Result<(), IdentityProviderError>;

    /// Permanently delete an account.
    async fn delete_account(&self, id: &IdentityId) -> Result<(), IdentityProviderError>;

    /// Email a password reset link.
    async fn send_password_reset(&self, email: &Email) -> Result<(), IdentityProviderError>;

    /// Live view of the signed-in account.
    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>>;
}
