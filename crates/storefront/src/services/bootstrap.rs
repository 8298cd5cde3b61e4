//! Bootstrap administrator provisioning.
//!
//! A fresh deployment has no administrator, so nobody can promote anyone.
//! [`BootstrapAdmin`] provisions one from the configured
//! [`BootstrapPolicy`]:
//!
//! 1. Sign in as the bootstrap email with the bootstrap secret
//! 2. If the pair is rejected, create the identity, store an administrator
//!    profile for it and sign in again
//! 3. If the identity signs in but has no profile, store the profile
//!
//! Every provisioning step is logged at `warn` so it shows up in audits.
//! The procedure refuses to run while the policy is disabled.

use secrecy::ExposeSecret;
use tracing::{info, instrument, warn};

use apartmart_core::{Role, UserId};

use crate::backend::{AuthSession, Backend, BackendError, Query};
use crate::config::BootstrapPolicy;
use crate::models::{NewProfile, Profile, ProfileUpdate, tables};
use crate::stores::AuthError;

/// Username stored on the bootstrap administrator profile.
pub const BOOTSTRAP_USERNAME: &str = "admin";

/// Full name stored on the bootstrap administrator profile.
pub const BOOTSTRAP_FULL_NAME: &str = "System Administrator";

/// One run of the bootstrap administrator procedure.
pub struct BootstrapAdmin<'a> {
    backend: &'a dyn Backend,
    policy: &'a BootstrapPolicy,
}

impl<'a> BootstrapAdmin<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend, policy: &'a BootstrapPolicy) -> Self {
        Self { backend, policy }
    }

    /// Sign in as the bootstrap administrator, provisioning it first if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::BootstrapDisabled` when the policy is off,
    /// `AuthError::ProfileInsert` when the identity exists but its profile
    /// could not be stored, or the backend error of any other step.
    #[instrument(skip(self), fields(email = %self.policy.email))]
    pub async fn run(&self) -> Result<AuthSession, AuthError> {
        if !self.policy.enabled {
            return Err(AuthError::BootstrapDisabled);
        }

        match self.sign_in().await {
            Ok(session) => {
                self.ensure_profile(session.user.id).await?;
                Ok(session)
            }
            Err(BackendError::InvalidCredentials) => {
                warn!("Bootstrap administrator missing, provisioning");
                let created = self
                    .backend
                    .sign_up(&self.policy.email, self.policy.secret.expose_secret())
                    .await?;
                self.insert_profile(created.user.id).await?;

                let session = self.sign_in().await?;
                info!(user_id = %session.user.id, "Bootstrap administrator provisioned");
                Ok(session)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn sign_in(&self) -> Result<AuthSession, BackendError> {
        self.backend
            .sign_in_with_password(&self.policy.email, self.policy.secret.expose_secret())
            .await
    }

    async fn ensure_profile(&self, user_id: UserId) -> Result<(), AuthError> {
        let existing = self
            .backend
            .fetch_optional::<Profile>(tables::PROFILES, &Query::new().eq("id", user_id))
            .await?;
        if existing.is_none() {
            warn!(%user_id, "Bootstrap administrator has no profile, storing one");
            self.insert_profile(user_id).await?;
        }
        Ok(())
    }

    async fn insert_profile(&self, user_id: UserId) -> Result<(), AuthError> {
        let row = NewProfile {
            id: user_id,
            email: self.policy.email.clone(),
            role: Role::Admin,
            details: ProfileUpdate {
                username: Some(BOOTSTRAP_USERNAME.to_owned()),
                full_name: Some(BOOTSTRAP_FULL_NAME.to_owned()),
                ..ProfileUpdate::default()
            },
        };
        self.backend
            .insert_one::<_, Profile>(tables::PROFILES, &row)
            .await
            .map(|_| ())
            .map_err(|source| {
                tracing::error!(%user_id, error = %source, "Bootstrap profile creation error");
                AuthError::ProfileInsert { user_id, source }
            })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;
    use crate::backend::{MemoryBackend, Operation};

    fn enabled() -> BootstrapPolicy {
        BootstrapPolicy {
            enabled: true,
            ..BootstrapPolicy::default()
        }
    }

    async fn profiles(backend: &MemoryBackend) -> Vec<Profile> {
        backend
            .rows(tables::PROFILES)
            .await
            .into_iter()
            .map(|row| serde_json::from_value(row).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_disabled_policy_refuses() {
        let backend = MemoryBackend::new();
        let policy = BootstrapPolicy::default();
        let err = BootstrapAdmin::new(&backend, &policy).run().await.unwrap_err();
        assert!(matches!(err, AuthError::BootstrapDisabled));
        assert!(backend.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_provisions_missing_administrator() {
        let backend = MemoryBackend::new();
        let policy = enabled();

        let session = BootstrapAdmin::new(&backend, &policy).run().await.unwrap();

        assert!(backend.has_identity("admin@apartmart.com").await);
        let stored = profiles(&backend).await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, session.user.id);
        assert_eq!(stored[0].role, Role::Admin);
        assert_eq!(stored[0].username.as_deref(), Some(BOOTSTRAP_USERNAME));
        assert_eq!(stored[0].full_name.as_deref(), Some(BOOTSTRAP_FULL_NAME));
    }

    #[tokio::test]
    async fn test_second_run_reuses_identity() {
        let backend = MemoryBackend::new();
        let policy = enabled();
        let first = BootstrapAdmin::new(&backend, &policy).run().await.unwrap();
        let second = BootstrapAdmin::new(&backend, &policy).run().await.unwrap();

        assert_eq!(first.user.id, second.user.id);
        assert_eq!(profiles(&backend).await.len(), 1);
    }

    #[tokio::test]
    async fn test_restores_missing_profile() {
        let backend = MemoryBackend::new();
        let id = backend
            .create_identity("admin@apartmart.com", "admin123")
            .await
            .unwrap();
        let policy = enabled();

        BootstrapAdmin::new(&backend, &policy).run().await.unwrap();

        let stored = profiles(&backend).await;
        assert_eq!(stored[0].id, id);
        assert_eq!(stored[0].role, Role::Admin);
    }

    #[tokio::test]
    async fn test_profile_failure_is_reported() {
        let backend = MemoryBackend::new();
        backend.fail_next(tables::PROFILES, Operation::Insert).await;
        let policy = enabled();

        let err = BootstrapAdmin::new(&backend, &policy).run().await.unwrap_err();

        assert!(matches!(err, AuthError::ProfileInsert { .. }));
        assert!(backend.has_identity("admin@apartmart.com").await);
    }

    #[tokio::test]
    async fn test_custom_email_and_secret() {
        let backend = MemoryBackend::new();
        let policy = BootstrapPolicy {
            enabled: true,
            email: "root@example.com".to_owned(),
            secret: SecretString::from("Different9"),
            ..BootstrapPolicy::default()
        };

        BootstrapAdmin::new(&backend, &policy).run().await.unwrap();
        assert!(backend.has_identity("root@example.com").await);
        assert!(!backend.has_identity("admin@apartmart.com").await);
    }
}
