//! Account commands: sign-up, order history, wishlist and the bootstrap
//! administrator.
//!
//! # Usage
//!
//! ```bash
//! am-cli signup --new-email ada@example.com --new-password Engine1 \
//!     --full-name "Ada Lovelace" --username ada_l --accept-terms
//! am-cli --email ada@example.com --password Engine1 orders
//! BOOTSTRAP_ADMIN_ENABLED=true am-cli bootstrap-admin
//! ```
//!
//! # Environment Variables
//!
//! - `BOOTSTRAP_ADMIN_ENABLED` - must be `true` for `bootstrap-admin`
//! - `BOOTSTRAP_ADMIN_EMAIL` / `BOOTSTRAP_ADMIN_SECRET` - the account it provisions

use clap::Args;
use tracing::{info, warn};

use apartmart_core::validation::SignUpForm;
use apartmart_storefront::AppState;
use apartmart_storefront::models::ProfileUpdate;
use apartmart_storefront::routes::Route;
use apartmart_storefront::services::BootstrapAdmin;
use apartmart_storefront::services::customer;
use apartmart_storefront::stores::AuthError;

use super::{CliError, Credentials, sign_in_for};

#[derive(Args)]
pub struct SignupArgs {
    #[arg(long = "new-email")]
    email: String,

    #[arg(long = "new-password")]
    password: String,

    /// Defaults to the password
    #[arg(long)]
    confirm_password: Option<String>,

    #[arg(long)]
    full_name: String,

    #[arg(long)]
    username: String,

    /// Accept the terms and conditions
    #[arg(long)]
    accept_terms: bool,
}

/// Provision (or sign in as) the bootstrap administrator.
///
/// # Errors
///
/// Returns `AuthError::BootstrapDisabled` unless the policy is enabled.
pub async fn bootstrap_admin(state: &AppState) -> Result<(), CliError> {
    let policy = &state.config().bootstrap;
    if !policy.enabled {
        return Err(AuthError::BootstrapDisabled.into());
    }

    warn!(email = %policy.email, "Running bootstrap administrator procedure");
    let session = BootstrapAdmin::new(state.backend().as_ref(), policy)
        .run()
        .await?;
    info!(user_id = %session.user.id, email = %policy.email, "Bootstrap administrator ready");
    Ok(())
}

/// Create a customer account.
///
/// # Errors
///
/// Returns the validation errors or the sign-up error.
pub async fn signup(state: &AppState, args: SignupArgs) -> Result<(), CliError> {
    let form = SignUpForm {
        full_name: args.full_name,
        username: args.username,
        email: args.email,
        confirm_password: args.confirm_password.unwrap_or_else(|| args.password.clone()),
        password: args.password,
        accept_terms: args.accept_terms,
    };
    let email = form.validate()?;

    let created = state
        .auth()
        .sign_up(
            email.as_str(),
            &form.password,
            ProfileUpdate {
                full_name: Some(form.full_name.trim().to_owned()),
                username: Some(form.username.clone()),
                ..ProfileUpdate::default()
            },
        )
        .await?;

    if created.session.is_none() {
        info!(email = %email, "Account created; confirm your email before signing in");
    } else {
        info!(user_id = %created.user.id, "Account created and signed in");
    }
    Ok(())
}

/// List the signed-in customer's orders.
///
/// # Errors
///
/// Returns the sign-in, guard or fetch error.
pub async fn orders(state: &AppState, credentials: &Credentials) -> Result<(), CliError> {
    sign_in_for(state, credentials, Route::Orders).await?;
    let orders = customer::orders(state.auth()).await?;
    for order in &orders {
        info!(
            id = %order.id,
            status = %order.status,
            total = %order.total_amount,
            items = order.item_count(),
            placed = %order.created_at.format("%Y-%m-%d"),
            "Order"
        );
    }
    info!(count = orders.len(), "Orders listed");
    Ok(())
}

/// List the signed-in customer's wishlist.
///
/// # Errors
///
/// Returns the sign-in, guard or fetch error.
pub async fn wishlist(state: &AppState, credentials: &Credentials) -> Result<(), CliError> {
    sign_in_for(state, credentials, Route::Wishlist).await?;
    let items = customer::wishlist(state.auth()).await?;
    for item in &items {
        match &item.product {
            Some(product) => info!(product_id = %item.product_id, price = %product.price, "{}", product.name),
            None => info!(product_id = %item.product_id, "(product unavailable)"),
        }
    }
    info!(count = items.len(), "Wishlist listed");
    Ok(())
}
