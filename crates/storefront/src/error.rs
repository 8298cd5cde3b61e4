//! Unified error handling with Sentry integration.
//!
//! [`AppError`] aggregates every layer's error for the outermost caller.
//! [`AppError::report`] captures internal failures to Sentry and
//! [`AppError::user_message`] yields text that is safe to show.

use thiserror::Error;

use apartmart_core::ValidationErrors;

use crate::backend::BackendError;
use crate::config::ConfigError;
use crate::services::CheckoutError;
use crate::stores::{AuthError, StoreError};

/// Shown for any failure whose details must stay internal.
pub const GENERIC_MESSAGE: &str = "Something went wrong, please try again";

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Checkout error: {0}")]
    Checkout(#[from] CheckoutError),

    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    /// The access guard turned the request away.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl AppError {
    /// Whether this is a failure of ours (or the backend's) rather than a
    /// problem with the user's input or permissions.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        match self {
            Self::Config(_) | Self::Backend(_) => true,
            Self::Auth(err) => matches!(
                err,
                AuthError::ProfileInsert { .. }
                    | AuthError::Backend(
                        BackendError::Http(_)
                            | BackendError::Api { .. }
                            | BackendError::Parse(_)
                            | BackendError::InvalidRequest(_)
                    )
            ),
            Self::Store(err) => matches!(err, StoreError::Backend(_)),
            Self::Checkout(err) => matches!(
                err,
                CheckoutError::OrderInsert(_)
                    | CheckoutError::OrderItemsInsert { .. }
                    | CheckoutError::Backend(_)
            ),
            Self::Validation(_) | Self::Forbidden(_) | Self::NotFound(_) => false,
        }
    }

    /// Text safe to show the user. Never includes backend details.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(errors)
            | Self::Auth(AuthError::Validation(errors))
            | Self::Checkout(CheckoutError::Validation(errors)) => errors.to_string(),
            Self::Auth(err) => match err {
                AuthError::Backend(BackendError::InvalidCredentials)
                | AuthError::BootstrapDisabled => "Invalid login credentials".to_owned(),
                AuthError::Backend(BackendError::UserAlreadyExists) => {
                    "An account with this email already exists".to_owned()
                }
                AuthError::NoProfile | AuthError::Backend(BackendError::NotAuthenticated) => {
                    "Please sign in to continue".to_owned()
                }
                AuthError::ProfileInsert { .. } => {
                    "Your account was created but your profile could not be saved. Please contact support."
                        .to_owned()
                }
                _ => GENERIC_MESSAGE.to_owned(),
            },
            Self::Store(StoreError::NotSignedIn)
            | Self::Checkout(CheckoutError::NotSignedIn) => "Please sign in to continue".to_owned(),
            Self::Checkout(CheckoutError::EmptyCart) => "Your cart is empty".to_owned(),
            Self::Checkout(CheckoutError::OrderItemsInsert { .. }) => {
                "Your order was created but could not be completed. Please contact support."
                    .to_owned()
            }
            Self::Config(_) => "The storefront is not configured correctly".to_owned(),
            Self::Forbidden(_) => "You do not have access to this page".to_owned(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::Backend(_) | Self::Store(_) | Self::Checkout(_) => GENERIC_MESSAGE.to_owned(),
        }
    }

    /// Log the error and, when it is internal, capture it to Sentry.
    pub fn report(&self) {
        if self.is_internal() {
            let event_id = sentry::capture_error(self);
            tracing::error!(error = %self, sentry_event_id = %event_id, "Request error");
        } else {
            tracing::warn!(error = %self, "Request rejected");
        }
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a user ID.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a user action.
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added to cart", &[("product_id", "123")]);
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: &[(&str, &str)]) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_owned()),
        message: Some(message.to_owned()),
        level: sentry::Level::Info,
        ..Default::default()
    };
    for (key, value) in data {
        breadcrumb.data.insert(
            (*key).to_owned(),
            serde_json::Value::String((*value).to_owned()),
        );
    }
    sentry::add_breadcrumb(breadcrumb);
}
