//! Print what the access guard decides for a location.
//!
//! # Usage
//!
//! ```bash
//! am-cli guard /checkout
//! am-cli --email team@example.com --password Engine1 guard /admin/users
//! ```
//!
//! With credentials the check runs as that user; without, as a visitor.
//! Passing only one of `--email` and `--password` is an error.

use secrecy::ExposeSecret;
use tracing::info;

use apartmart_storefront::AppState;
use apartmart_storefront::guard::GuardDecision;
use apartmart_storefront::routes::Route;

use super::{CliError, Credentials};

/// Sign in if credentials were given, then log the route and decision.
///
/// # Errors
///
/// Returns `MissingCredentials` when only one credential was given, or the
/// sign-in error. A denial is reported, not returned.
pub async fn run(state: &AppState, credentials: &Credentials, location: &str) -> Result<(), CliError> {
    match credentials.pair() {
        Some((email, password)) => {
            state.auth().sign_in(email, password.expose_secret()).await?;
        }
        None if credentials.is_present() => return Err(CliError::MissingCredentials),
        None => {}
    }

    let snapshot = state.auth().snapshot();
    let (route, decision) = Route::guard(&snapshot, location);
    let role = snapshot.role().map(|r| r.to_string());

    match &decision {
        GuardDecision::Allow => info!(?route, role = role.as_deref(), "Allowed"),
        GuardDecision::Loading => info!(?route, "Auth state still loading"),
        GuardDecision::RedirectToSignIn { from } => {
            info!(?route, redirect = decision.redirect_path(), from = %from, "Sign-in required");
        }
        GuardDecision::RedirectHome => {
            info!(?route, role = role.as_deref(), redirect = decision.redirect_path(), "Role not permitted");
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use apartmart_storefront::backend::{MEMORY_BASE_URL, MemoryBackend};
    use apartmart_storefront::config::StorefrontConfig;

    use super::*;

    async fn visitor_state() -> AppState {
        let config = StorefrontConfig::from_lookup(|key| match key {
            "SUPABASE_URL" => Some(MEMORY_BASE_URL.to_owned()),
            "SUPABASE_ANON_KEY" => Some("anon".to_owned()),
            _ => None,
        })
        .unwrap();
        let state = AppState::with_backend(config, Arc::new(MemoryBackend::new()));
        state.auth().initialize().await;
        state
    }

    #[tokio::test]
    async fn test_half_credentials_are_rejected() {
        let state = visitor_state().await;
        let email_only = Credentials::new(Some("ada@example.com".to_owned()), None);
        let err = run(&state, &email_only, "/cart").await.unwrap_err();
        assert!(matches!(err, CliError::MissingCredentials));
    }

    #[tokio::test]
    async fn test_visitor_check_needs_no_credentials() {
        let state = visitor_state().await;
        run(&state, &Credentials::new(None, None), "/cart").await.unwrap();
    }
}
