//! Session identity and profile state.
//!
//! # Flow
//!
//! 1. [`AuthStore::initialize`] reads any existing session, loads its
//!    profile and clears the loading flag (even when the read fails)
//! 2. A background listener applies every later session change
//! 3. Views observe [`AuthSnapshot`]s through [`AuthStore::watch`] or read
//!    the current one with [`AuthStore::snapshot`]

use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use apartmart_core::{Role, UserId, ValidationErrors};

use crate::backend::{AuthEvent, AuthSession, AuthUser, Backend, BackendError, Query, SignUp};
use crate::config::BootstrapPolicy;
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::{NewProfile, Profile, ProfileUpdate, tables};
use crate::services::bootstrap::BootstrapAdmin;

/// Errors that can occur during authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Profile operation attempted while signed out.
    #[error("No profile found")]
    NoProfile,

    /// Form input failed validation.
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// The bootstrap administrator procedure is turned off.
    #[error("bootstrap administrator is disabled")]
    BootstrapDisabled,

    /// Backend request failed.
    #[error("auth backend error: {0}")]
    Backend(#[from] BackendError),

    /// The identity exists but its profile row could not be stored.
    #[error("identity {user_id} was created but its profile was not stored: {source}")]
    ProfileInsert {
        user_id: UserId,
        #[source]
        source: BackendError,
    },
}

impl AuthError {
    /// Whether the backend rejected the credential pair.
    #[must_use]
    pub const fn is_invalid_credentials(&self) -> bool {
        matches!(self, Self::Backend(BackendError::InvalidCredentials))
    }
}

/// Point-in-time auth state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSnapshot {
    pub user: Option<AuthUser>,
    pub profile: Option<Profile>,
    /// True until the first session read completes.
    pub loading: bool,
}

impl Default for AuthSnapshot {
    fn default() -> Self {
        Self {
            user: None,
            profile: None,
            loading: true,
        }
    }
}

impl AuthSnapshot {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Role of the loaded profile, if any.
    #[must_use]
    pub fn role(&self) -> Option<Role> {
        self.profile.as_ref().map(|p| p.role)
    }
}

/// Auth state handle. Clones share state.
#[derive(Clone)]
pub struct AuthStore {
    inner: Arc<AuthStoreInner>,
}

struct AuthStoreInner {
    backend: Arc<dyn Backend>,
    bootstrap: BootstrapPolicy,
    state: Arc<watch::Sender<AuthSnapshot>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for AuthStoreInner {
    fn drop(&mut self) {
        let handle = self
            .listener
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }
}

impl AuthStore {
    /// Create a store in the loading state.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, bootstrap: BootstrapPolicy) -> Self {
        let (state, _) = watch::channel(AuthSnapshot::default());
        Self {
            inner: Arc::new(AuthStoreInner {
                backend,
                bootstrap,
                state: Arc::new(state),
                listener: Mutex::new(None),
            }),
        }
    }

    /// The current state.
    #[must_use]
    pub fn snapshot(&self) -> AuthSnapshot {
        self.inner.state.borrow().clone()
    }

    /// Observe state changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<AuthSnapshot> {
        self.inner.state.subscribe()
    }

    /// The signed-in profile, if loaded.
    #[must_use]
    pub fn profile(&self) -> Option<Profile> {
        self.inner.state.borrow().profile.clone()
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.inner.backend
    }

    #[must_use]
    pub fn bootstrap_policy(&self) -> &BootstrapPolicy {
        &self.inner.bootstrap
    }

    /// Read the existing session, then keep state current.
    ///
    /// Never fails: a session read error is logged and leaves the store
    /// signed out with `loading` cleared. Calling it again replaces the
    /// previous listener.
    #[instrument(skip(self))]
    pub async fn initialize(&self) {
        // Subscribe first so no change between the read and the listener start is lost.
        let events = self.inner.backend.subscribe();

        match self.inner.backend.get_session().await {
            Ok(Some(session)) => {
                let profile = load_profile(self.inner.backend.as_ref(), session.user.id).await;
                self.inner.state.send_replace(AuthSnapshot {
                    user: Some(session.user),
                    profile,
                    loading: false,
                });
            }
            Ok(None) => {
                self.inner.state.send_replace(AuthSnapshot {
                    loading: false,
                    ..AuthSnapshot::default()
                });
            }
            Err(e) => {
                error!(error = %e, "Auth initialization error");
                self.inner.state.send_modify(|s| s.loading = false);
            }
        }

        let handle = tokio::spawn(listen(
            Arc::clone(&self.inner.backend),
            Arc::clone(&self.inner.state),
            events,
        ));
        let previous = self
            .inner
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Sign in with an email and password.
    ///
    /// When the bootstrap policy is enabled and the pair is the reserved
    /// credential, the bootstrap administrator procedure runs instead.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Backend(BackendError::InvalidCredentials)` for a
    /// rejected pair, or the underlying backend error.
    #[instrument(skip(self, secret))]
    pub async fn sign_in(&self, identifier: &str, secret: &str) -> Result<AuthSession, AuthError> {
        let policy = &self.inner.bootstrap;
        let session = if policy.enabled && policy.matches(identifier, secret) {
            BootstrapAdmin::new(self.inner.backend.as_ref(), policy)
                .run()
                .await?
        } else {
            self.inner
                .backend
                .sign_in_with_password(identifier, secret)
                .await?
        };

        self.apply_session(&session).await;
        Ok(session)
    }

    /// Create a customer identity and its profile.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Backend` if the identity cannot be created and
    /// `AuthError::ProfileInsert` if the identity was created but its
    /// profile row was not. The identity is not removed in the latter case.
    #[instrument(skip(self, password, details))]
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        details: ProfileUpdate,
    ) -> Result<SignUp, AuthError> {
        let created = self.inner.backend.sign_up(email, password).await?;

        let row = NewProfile {
            id: created.user.id,
            email: email.to_owned(),
            role: Role::Customer,
            details,
        };
        if let Err(source) = self
            .inner
            .backend
            .insert_one::<_, Profile>(tables::PROFILES, &row)
            .await
        {
            error!(user_id = %created.user.id, error = %source, "Profile creation error");
            return Err(AuthError::ProfileInsert {
                user_id: created.user.id,
                source,
            });
        }

        if let Some(session) = &created.session {
            self.apply_session(session).await;
        }
        info!(user_id = %created.user.id, "Customer signed up");
        Ok(created)
    }

    /// Invalidate the session and clear local state.
    ///
    /// Local state is cleared even if the backend call fails.
    ///
    /// # Errors
    ///
    /// Returns the backend error, if any.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        let result = self.inner.backend.sign_out().await;
        self.inner.state.send_modify(|s| {
            s.user = None;
            s.profile = None;
        });
        clear_sentry_user();
        result.map_err(AuthError::from)
    }

    /// Update the current user's profile and replace the local copy with
    /// the stored row.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::NoProfile` when signed out.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Profile, AuthError> {
        let Some(current) = self.profile() else {
            return Err(AuthError::NoProfile);
        };

        let updated: Vec<Profile> = self
            .inner
            .backend
            .update_rows(
                tables::PROFILES,
                &Query::new().eq("id", current.id),
                update,
            )
            .await?;
        let profile = updated
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(tables::PROFILES.to_owned()))?;

        self.inner
            .state
            .send_modify(|s| s.profile = Some(profile.clone()));
        Ok(profile)
    }

    async fn apply_session(&self, session: &AuthSession) {
        let profile = load_profile(self.inner.backend.as_ref(), session.user.id).await;
        set_sentry_user(&session.user.id, session.user.email.as_deref());
        self.inner.state.send_replace(AuthSnapshot {
            user: Some(session.user.clone()),
            profile,
            loading: false,
        });
    }
}

/// The profile for an identity. Lookup failures read as "no profile".
async fn load_profile(backend: &dyn Backend, user_id: UserId) -> Option<Profile> {
    match backend
        .fetch_optional::<Profile>(tables::PROFILES, &Query::new().eq("id", user_id))
        .await
    {
        Ok(profile) => profile,
        Err(e) => {
            error!(%user_id, error = %e, "Error loading profile");
            None
        }
    }
}

async fn listen(
    backend: Arc<dyn Backend>,
    state: Arc<watch::Sender<AuthSnapshot>>,
    mut events: broadcast::Receiver<AuthEvent>,
) {
    loop {
        match events.recv().await {
            Ok(AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session)) => {
                let profile = load_profile(backend.as_ref(), session.user.id).await;
                state.send_modify(|s| {
                    s.user = Some(session.user);
                    s.profile = profile;
                });
            }
            Ok(AuthEvent::SignedOut) => {
                state.send_modify(|s| {
                    s.user = None;
                    s.profile = None;
                });
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Missed session changes, re-reading session");
                let session = backend.get_session().await.ok().flatten();
                let profile = match &session {
                    Some(s) => load_profile(backend.as_ref(), s.user.id).await,
                    None => None,
                };
                state.send_modify(|s| {
                    s.user = session.map(|session| session.user);
                    s.profile = profile;
                });
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
