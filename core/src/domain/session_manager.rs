//! Live authenticated session derived from the identity provider.
//!
//! The manager owns a [`watch`] channel of [`SessionState`]. Explicit
//! operations (`sign_up`, `sign_in`, `sign_out`) publish their outcome
//! directly; a background listener started by [`SessionManager::start`]
//! follows the provider's own session stream so token refreshes and remote
//! invalidation reach subscribers too.
//!
//! ```text
//! Unknown → Authenticating → Authenticated(context) | Anonymous
//! Authenticated → Anonymous   (sign-out or remote invalidation)
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde_json::Value;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::port_error_mapping::{map_provider_error, map_store_error};
use super::ports::{AuthUser, IdentityProvider, RemoteStore};
use super::{
    Credentials, DocumentPath, Email, Error, Identity, Lifecycle, Profile, Role, RoleData,
    RoleResolver, SessionContext, SessionState, StudentProfile, UserHeader, VendorProfile,
    profile,
};

struct Inner<P, S> {
    provider: Arc<P>,
    store: Arc<S>,
    state: watch::Sender<SessionState>,
    /// Bumped whenever an explicit operation starts or publishes, so stream
    /// updates resolved across such a boundary are discarded.
    generation: AtomicU64,
    /// Set by a local sign-out and cleared by the next explicit sign-in or
    /// sign-up. While set, provider updates may not re-authenticate.
    signed_out: AtomicBool,
}

struct Control {
    lifecycle: Lifecycle,
    listener: Option<JoinHandle<()>>,
}

/// Publishes the current session and performs account operations.
pub struct SessionManager<P, S> {
    inner: Arc<Inner<P, S>>,
    resolver: RoleResolver<S>,
    control: Mutex<Control>,
}

impl<P, S> SessionManager<P, S> {
    /// Create a manager in the `init` lifecycle state.
    pub fn new(provider: Arc<P>, store: Arc<S>) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self {
            resolver: RoleResolver::new(Arc::clone(&store)),
            inner: Arc::new(Inner {
                provider,
                store,
                state,
                generation: AtomicU64::new(0),
                signed_out: AtomicBool::new(false),
            }),
            control: Mutex::new(Control {
                lifecycle: Lifecycle::Init,
                listener: None,
            }),
        }
    }

    /// Receiver that always holds the latest session state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Snapshot of the current session state.
    pub fn current(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    /// Current lifecycle state.
    pub async fn lifecycle(&self) -> Lifecycle {
        self.control.lock().await.lifecycle
    }

    /// Invoke `callback` with the current state and then on every transition.
    ///
    /// Rapid successive transitions may be coalesced; the callback always
    /// sees the latest state. Drop or abort the handle to stop observing.
    pub fn observe<F>(&self, mut callback: F) -> JoinHandle<()>
    where
        F: FnMut(&SessionState) + Send + 'static,
    {
        let mut receiver = self.subscribe();
        tokio::spawn(async move {
            callback(&receiver.borrow_and_update());
            while receiver.changed().await.is_ok() {
                callback(&receiver.borrow_and_update());
            }
        })
    }

    async fn ensure_active(&self) -> Result<(), Error> {
        match self.control.lock().await.lifecycle {
            Lifecycle::Disposed => Err(Error::internal("session manager has been disposed")),
            Lifecycle::Init | Lifecycle::Ready => Ok(()),
        }
    }
}

impl<P, S> SessionManager<P, S>
where
    P: IdentityProvider + 'static,
    S: RemoteStore + 'static,
{
    /// Seed the state from the provider and start following its stream.
    pub async fn start(&self) -> Result<(), Error> {
        let mut control = self.control.lock().await;
        if control.lifecycle != Lifecycle::Init {
            return Err(Error::internal(format!(
                "session manager cannot start from {:?}",
                control.lifecycle
            )));
        }

        let mut auth_state = self.inner.provider.auth_state();
        let current = auth_state.borrow_and_update().clone();
        let seeded = match current {
            Some(user) => SessionState::Authenticated(self.inner.resolve_context(&user).await),
            None => SessionState::Anonymous,
        };
        self.inner.state.send_replace(seeded);

        let inner = Arc::clone(&self.inner);
        control.listener = Some(tokio::spawn(async move {
            while auth_state.changed().await.is_ok() {
                let user = auth_state.borrow_and_update().clone();
                inner.follow_provider(user).await;
            }
            debug!("identity provider stream closed");
        }));
        control.lifecycle = Lifecycle::Ready;
        Ok(())
    }

    /// Stop following the provider and publish `Anonymous`.
    ///
    /// Subsequent account operations fail with an internal error.
    pub async fn dispose(&self) {
        let mut control = self.control.lock().await;
        if let Some(listener) = control.listener.take() {
            listener.abort();
        }
        control.lifecycle = Lifecycle::Disposed;
        self.inner.publish(SessionState::Anonymous);
    }

    /// Create an account, materialise its profile documents and sign in.
    ///
    /// When the profile documents cannot be written the provider account is
    /// deleted again and `partial_write` is returned; its details gain an
    /// `accountDeleted` flag.
    pub async fn sign_up(
        &self,
        credentials: &Credentials,
        role_data: &RoleData,
    ) -> Result<Identity, Error> {
        self.ensure_active().await?;
        let previous = self.inner.begin_authenticating();

        let user = match self.inner.provider.create_account(credentials).await {
            Ok(user) => user,
            Err(err) => {
                self.inner.publish(previous);
                return Err(map_provider_error(err));
            }
        };

        let identity = Identity {
            id: user.id.clone(),
            email: user.email.clone(),
            role: role_data.role(),
            created_at: user.created_at,
        };
        let result = match RoleResolver::<S>::plan(&identity, role_data) {
            Ok(plan) => self.resolver.materialize(&plan).await.map(|()| plan),
            Err(err) => Err(err),
        };

        match result {
            Ok(plan) => {
                info!(identity_id = %identity.id, role = %identity.role, "account created");
                self.inner
                    .publish(SessionState::Authenticated(SessionContext {
                        identity: identity.clone(),
                        profile: plan.profile,
                        degraded: false,
                    }));
                Ok(identity)
            }
            Err(err) => {
                let account_deleted = self.inner.roll_back_account(&identity).await;
                self.inner.publish(SessionState::Anonymous);
                Err(with_account_deleted(err, account_deleted))
            }
        }
    }

    /// Sign in and resolve the identity's profile.
    ///
    /// A missing or unreadable profile degrades to a default student
    /// profile rather than failing the sign-in.
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<SessionContext, Error> {
        self.ensure_active().await?;
        let previous = self.inner.begin_authenticating();

        match self.inner.provider.sign_in(credentials).await {
            Ok(user) => {
                let context = self.inner.resolve_context(&user).await;
                info!(
                    identity_id = %context.identity.id,
                    role = %context.identity.role,
                    degraded = context.degraded,
                    "signed in"
                );
                self.inner
                    .publish(SessionState::Authenticated(context.clone()));
                Ok(context)
            }
            Err(err) => {
                self.inner.publish(previous);
                Err(map_provider_error(err))
            }
        }
    }

    /// Sign out. Local state is cleared even when the provider call fails.
    ///
    /// The provider's stream cannot restore the session afterwards; only an
    /// explicit `sign_in` or `sign_up` can.
    pub async fn sign_out(&self) {
        self.inner.signed_out.store(true, Ordering::SeqCst);
        if let Err(err) = self.inner.provider.sign_out().await {
            warn!(error = %err, "provider sign-out failed; clearing local session anyway");
        }
        self.inner.publish(SessionState::Anonymous);
    }

    /// Ask the provider to email a password reset link.
    pub async fn request_password_reset(&self, email: &Email) -> Result<(), Error> {
        self.ensure_active().await?;
        self.inner
            .provider
            .send_password_reset(email)
            .await
            .map_err(map_provider_error)
    }
}

impl<P, S> Inner<P, S>
where
    P: IdentityProvider,
    S: RemoteStore,
{
    /// Publish `Authenticating` and return the state it replaced.
    fn begin_authenticating(&self) -> SessionState {
        self.signed_out.store(false, Ordering::SeqCst);
        self.publish(SessionState::Authenticating)
    }

    /// Publish the outcome of an explicit operation.
    fn publish(&self, state: SessionState) -> SessionState {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.state.send_replace(state)
    }

    /// React to a provider stream update.
    ///
    /// Updates that arrive while an explicit operation is in flight are
    /// ignored; that operation publishes its own outcome. After a local
    /// sign-out a provider user is ignored too.
    async fn follow_provider(&self, user: Option<AuthUser>) {
        let generation = self.generation.load(Ordering::SeqCst);
        let next = match user {
            Some(_) if self.signed_out.load(Ordering::SeqCst) => {
                debug!("ignoring provider session after local sign-out");
                return;
            }
            Some(user) => SessionState::Authenticated(self.resolve_context(&user).await),
            None => SessionState::Anonymous,
        };
        self.state.send_if_modified(|state| {
            let reauthenticates = matches!(next, SessionState::Authenticated(_))
                && self.signed_out.load(Ordering::SeqCst);
            if reauthenticates
                || matches!(state, SessionState::Authenticating)
                || self.generation.load(Ordering::SeqCst) != generation
            {
                return false;
            }
            if let (SessionState::Authenticated(_), SessionState::Anonymous) = (&*state, &next) {
                info!("session invalidated by identity provider");
            }
            *state = next;
            true
        });
    }

    async fn roll_back_account(&self, identity: &Identity) -> bool {
        match self.provider.delete_account(&identity.id).await {
            Ok(()) => true,
            Err(err) => {
                error!(
                    identity_id = %identity.id,
                    error = %err,
                    "could not delete provider account after failed profile setup"
                );
                false
            }
        }
    }

    /// Build the session context for a provider user, degrading on failure.
    async fn resolve_context(&self, user: &AuthUser) -> SessionContext {
        match self.load_context(user).await {
            Ok(Some(context)) => context,
            Ok(None) => {
                warn!(identity_id = %user.id, "profile document missing; using default profile");
                fallback_context(user)
            }
            Err(err) => {
                warn!(
                    identity_id = %user.id,
                    error = %err,
                    "profile fetch failed; using default profile"
                );
                fallback_context(user)
            }
        }
    }

    async fn load_context(&self, user: &AuthUser) -> Result<Option<SessionContext>, Error> {
        let user_path = DocumentPath::user(&user.id);
        let Some(document) = self
            .store
            .get_document(&user_path)
            .await
            .map_err(map_store_error)?
        else {
            return Ok(None);
        };
        let malformed = |err: serde_json::Error| {
            Error::internal(format!("document {user_path} is malformed: {err}"))
        };
        let header: UserHeader = profile::decode(&document).map_err(malformed)?;
        let identity = header.identity();

        let context = match header.role {
            Role::Student => SessionContext {
                profile: Profile::Student(profile::decode(&document).map_err(malformed)?),
                identity,
                degraded: false,
            },
            Role::Vendor => {
                let vendor_path = DocumentPath::vendor(&user.id);
                let record = self
                    .store
                    .get_document(&vendor_path)
                    .await
                    .map_err(map_store_error)
                    .and_then(|doc| {
                        doc.map(|doc| profile::decode::<VendorProfile>(&doc).map_err(malformed))
                            .transpose()
                    });
                match record {
                    Ok(Some(vendor)) => SessionContext {
                        profile: Profile::Vendor(vendor),
                        identity,
                        degraded: false,
                    },
                    outcome => {
                        if let Err(err) = &outcome {
                            warn!(identity_id = %user.id, error = %err, "vendor record unreadable");
                        } else {
                            warn!(identity_id = %user.id, "vendor record missing");
                        }
                        let name = header.name.clone().unwrap_or_default();
                        SessionContext {
                            profile: Profile::Vendor(VendorProfile::minimal(user.id.clone(), name)),
                            identity,
                            degraded: true,
                        }
                    }
                }
            }
        };
        Ok(Some(context))
    }
}

fn fallback_context(user: &AuthUser) -> SessionContext {
    SessionContext {
        identity: Identity {
            id: user.id.clone(),
            email: user.email.clone(),
            role: Role::Student,
            created_at: user.created_at,
        },
        profile: Profile::Student(StudentProfile::fallback(user.id.clone())),
        degraded: true,
    }
}

fn with_account_deleted(error: Error, account_deleted: bool) -> Error {
    let details = match error.details().cloned() {
        Some(Value::Object(mut map)) => {
            map.insert("accountDeleted".to_owned(), Value::Bool(account_deleted));
            Value::Object(map)
        }
        _ => serde_json::json!({ "accountDeleted": account_deleted }),
    };
    error.with_details(details)
}
