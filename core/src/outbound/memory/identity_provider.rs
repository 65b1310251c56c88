//! In-memory [`IdentityProvider`] with a live session stream.
//!
//! Passwords are kept only as salted SHA-256 digests. Emails match
//! case-insensitively, as hosted providers do.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use mockable::{Clock, DefaultClock};
use sha2::{Digest, Sha256};
use tokio::sync::{Mutex, watch};
use tracing::debug;

use crate::domain::ports::{AuthUser, IdentityProvider, IdentityProviderError};
use crate::domain::{Credentials, Email, IdentityId};

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
    user: AuthUser,
    password_digest: String,
}

/// Account registry and authentication session held in process memory.
pub struct MemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Account>>,
    password_resets: Mutex<Vec<Email>>,
    session: watch::Sender<Option<AuthUser>>,
    clock: Arc<dyn Clock>,
    offline: AtomicBool,
}

impl Default for MemoryIdentityProvider {
    fn default() -> Self {
        Self::new(Arc::new(DefaultClock))
    }
}

impl MemoryIdentityProvider {
    /// Create a provider stamping accounts with `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (session, _) = watch::channel(None);
        Self {
            accounts: Mutex::new(HashMap::new()),
            password_resets: Mutex::new(Vec::new()),
            session,
            clock,
            offline: AtomicBool::new(false),
        }
    }

    /// Simulate losing or regaining the connection.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Invalidate the session remotely, as a revoked token would.
    pub fn expire_session(&self) {
        self.session.send_replace(None);
    }

    /// Re-announce the current user, as a token refresh would.
    pub fn refresh_session(&self) {
        self.session.send_modify(|_| {});
    }

    /// Emails that password resets were sent to, oldest first.
    pub async fn password_resets(&self) -> Vec<Email> {
        self.password_resets.lock().await.clone()
    }

    /// Whether an account exists for `email`.
    pub async fn has_account(&self, email: &Email) -> bool {
        self.accounts.lock().await.contains_key(&account_key(email))
    }

    fn ensure_online(&self) -> Result<(), IdentityProviderError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(IdentityProviderError::connection(
                "identity provider is offline",
            ));
        }
        Ok(())
    }
}

fn account_key(email: &Email) -> String {
    email.as_ref().to_ascii_lowercase()
}

fn password_digest(email: &Email, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(account_key(email).as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn validate_new_account(credentials: &Credentials) -> Result<(), IdentityProviderError> {
    if !credentials.email().as_ref().contains('@') {
        return Err(IdentityProviderError::rejected(
            "the email address is badly formatted",
        ));
    }
    if credentials.password().chars().count() < MIN_PASSWORD_LEN {
        return Err(IdentityProviderError::rejected(format!(
            "password should be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn create_account(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthUser, IdentityProviderError> {
        self.ensure_online()?;
        validate_new_account(credentials)?;

        let key = account_key(credentials.email());
        let mut accounts = self.accounts.lock().await;
        if accounts.contains_key(&key) {
            return Err(IdentityProviderError::email_in_use(
                credentials.email().as_ref(),
            ));
        }

        let user = AuthUser {
            id: IdentityId::random(),
            email: credentials.email().clone(),
            created_at: self.clock.utc(),
        };
        accounts.insert(
            key,
            Account {
                user: user.clone(),
                password_digest: password_digest(credentials.email(), credentials.password()),
            },
        );
        drop(accounts);

        debug!(identity_id = %user.id, "account created");
        self.session.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_in(&self, credentials: &Credentials) -> Result<AuthUser, IdentityProviderError> {
        self.ensure_online()?;
        let user = {
            let accounts = self.accounts.lock().await;
            let account = accounts
                .get(&account_key(credentials.email()))
                .ok_or_else(IdentityProviderError::invalid_credential)?;
            if account.password_digest
                != password_digest(credentials.email(), credentials.password())
            {
                return Err(IdentityProviderError::invalid_credential());
            }
            account.user.clone()
        };

        self.session.send_replace(Some(user.clone()));
        Ok(user)
    }

    async fn sign_out(&self) -> Result<(), IdentityProviderError> {
        self.ensure_online()?;
        self.session.send_replace(None);
        Ok(())
    }

    async fn delete_account(&self, id: &IdentityId) -> Result<(), IdentityProviderError> {
        self.ensure_online()?;
        self.accounts
            .lock()
            .await
            .retain(|_, account| &account.user.id != id);
        self.session.send_if_modified(|current| {
            if current.as_ref().is_some_and(|user| &user.id == id) {
                *current = None;
                true
            } else {
                false
            }
        });
        debug!(identity_id = %id, "account deleted");
        Ok(())
    }

    async fn send_password_reset(&self, email: &Email) -> Result<(), IdentityProviderError> {
        self.ensure_online()?;
        // Unknown addresses succeed silently so callers cannot test for
        // registered emails.
        if self.has_account(email).await {
            self.password_resets.lock().await.push(email.clone());
        }
        Ok(())
    }

    fn auth_state(&self) -> watch::Receiver<Option<AuthUser>> {
        self.session.subscribe()
    }
}
