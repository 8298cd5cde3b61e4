//! Subcommand implementations and the plumbing they share.
//!
//! Signed-in commands go through [`sign_in_for`], which signs in with the
//! global credentials and then runs the access guard for the route the
//! command stands for, exactly as a view would.

pub mod account;
pub mod admin;
pub mod cart;
pub mod catalog;
pub mod guard;
pub mod team;

use std::str::FromStr;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use apartmart_core::ValidationErrors;
use apartmart_core::validation::SignInForm;
use apartmart_storefront::AppError;
use apartmart_storefront::AppState;
use apartmart_storefront::backend::BackendError;
use apartmart_storefront::config::{ConfigError, StorefrontConfig};
use apartmart_storefront::guard::GuardDecision;
use apartmart_storefront::models::Profile;
use apartmart_storefront::routes::Route;
use apartmart_storefront::services::CheckoutError;
use apartmart_storefront::stores::{AuthError, StoreError};

/// Errors that end a CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error("sign-in required: pass --email and --password (or set AM_EMAIL and AM_PASSWORD)")]
    MissingCredentials,

    #[error("invalid {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    #[error("could not read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl CliError {
    /// Log the error, capturing internal failures to Sentry.
    pub fn report(&self) {
        match self {
            Self::App(e) => e.report(),
            other => tracing::warn!(error = %other, "Command rejected"),
        }
    }

    /// Text safe to show the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::App(e) => e.user_message(),
            other => other.to_string(),
        }
    }
}

macro_rules! via_app_error {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for CliError {
                fn from(err: $source) -> Self {
                    Self::App(AppError::from(err))
                }
            }
        )*
    };
}

via_app_error!(
    ConfigError,
    BackendError,
    AuthError,
    StoreError,
    CheckoutError,
    ValidationErrors,
);

/// The global `--email` / `--password` pair.
pub struct Credentials {
    email: Option<String>,
    password: Option<SecretString>,
}

impl Credentials {
    #[must_use]
    pub fn new(email: Option<String>, password: Option<String>) -> Self {
        Self {
            email,
            password: password.map(SecretString::from),
        }
    }

    /// Whether any credential was supplied.
    #[must_use]
    pub const fn is_present(&self) -> bool {
        self.email.is_some() || self.password.is_some()
    }

    /// Email and password, when both were supplied.
    #[must_use]
    pub fn pair(&self) -> Option<(&str, &SecretString)> {
        self.email.as_deref().zip(self.password.as_ref())
    }
}

/// Connect to the backend and read any existing session.
///
/// # Errors
///
/// Returns an error if the HTTP client cannot be built.
pub async fn connect(config: StorefrontConfig) -> Result<AppState, CliError> {
    let state = AppState::new(config)?;
    state.auth().initialize().await;
    Ok(state)
}

/// Sign in with `credentials` and require the guard to allow `route`.
///
/// # Errors
///
/// Returns `MissingCredentials` without credentials, the sign-in error, or
/// `AppError::Forbidden` when the guard turns the route away.
pub async fn sign_in_for(
    state: &AppState,
    credentials: &Credentials,
    route: Route,
) -> Result<Profile, CliError> {
    let Some((email, password)) = credentials.pair() else {
        return Err(CliError::MissingCredentials);
    };
    SignInForm {
        identifier: email.to_owned(),
        password: password.expose_secret().to_owned(),
    }
    .validate()?;

    state
        .auth()
        .sign_in(email, password.expose_secret())
        .await?;

    let (_, decision) = Route::guard(&state.auth().snapshot(), route.path());
    match decision {
        GuardDecision::Allow => state
            .auth()
            .profile()
            .ok_or_else(|| CliError::from(AuthError::NoProfile)),
        GuardDecision::RedirectToSignIn { .. } => Err(CliError::MissingCredentials),
        GuardDecision::RedirectHome | GuardDecision::Loading => {
            Err(AppError::Forbidden(route.path().to_owned()).into())
        }
    }
}

/// Parse a command-line value, naming the argument on failure.
///
/// # Errors
///
/// Returns `InvalidArgument` if `raw` does not parse.
pub fn parse_arg<T>(name: &'static str, raw: &str) -> Result<T, CliError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| CliError::InvalidArgument {
        name,
        reason: e.to_string(),
    })
}
