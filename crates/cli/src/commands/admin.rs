//! Administrator commands.
//!
//! # Usage
//!
//! ```bash
//! am-cli admin dashboard
//! am-cli admin users --search ada --role team
//! am-cli admin set-role <user-id> team
//! am-cli admin delete-user <user-id>
//! ```
//!
//! Every action signs in first and requires the `admin` role.

use clap::Subcommand;
use tracing::{info, warn};

use apartmart_core::{Role, UserId};
use apartmart_storefront::AppState;
use apartmart_storefront::models::Profile;
use apartmart_storefront::routes::Route;
use apartmart_storefront::services::admin;

use super::{CliError, Credentials, parse_arg, sign_in_for};

#[derive(Subcommand)]
pub enum AdminAction {
    /// Store-wide totals and the newest users and orders
    Dashboard,
    /// List users, optionally filtered
    Users {
        /// Match against name, email and username
        #[arg(short, long, default_value = "")]
        search: String,
        /// `customer`, `team` or `admin`
        #[arg(short, long)]
        role: Option<Role>,
    },
    /// Change a user's role
    SetRole { user_id: String, role: Role },
    /// Delete a user's profile
    DeleteUser { user_id: String },
}

/// Run an administrator action.
///
/// # Errors
///
/// Returns the sign-in, guard, argument or backend error.
pub async fn run(state: &AppState, credentials: &Credentials, action: AdminAction) -> Result<(), CliError> {
    let admin_profile = sign_in_for(state, credentials, Route::Admin).await?;

    match action {
        AdminAction::Dashboard => {
            let dashboard = admin::dashboard(state.backend().as_ref()).await?;
            info!(
                users = dashboard.total_users,
                products = dashboard.total_products,
                orders = dashboard.total_orders,
                revenue = %dashboard.total_revenue,
                "Dashboard"
            );
            for user in &dashboard.recent_users {
                print_user(user);
            }
            for order in &dashboard.recent_orders {
                let customer = order
                    .profile
                    .as_ref()
                    .and_then(|p| p.full_name.as_deref().or(p.email.as_deref()))
                    .unwrap_or("-");
                info!(id = %order.id, status = %order.status, total = %order.total_amount, customer, "Recent order");
            }
        }
        AdminAction::Users { search, role } => {
            let mut directory = state.user_directory();
            directory.list_users().await?;
            for (tier, count) in directory.role_counts() {
                info!(role = %tier, count, "Role total");
            }
            let shown = directory.filter_users(&search, role);
            for user in &shown {
                print_user(user);
            }
            info!(shown = shown.len(), total = directory.users().len(), "Users listed");
        }
        AdminAction::SetRole { user_id, role } => {
            let user_id: UserId = parse_arg("user id", &user_id)?;
            if user_id == admin_profile.id && role != Role::Admin {
                warn!("Removing your own administrator role");
            }
            let mut directory = state.user_directory();
            directory.update_user_role(user_id, role).await?;
            info!(user_id = %user_id, %role, "Role updated");
        }
        AdminAction::DeleteUser { user_id } => {
            let user_id: UserId = parse_arg("user id", &user_id)?;
            let mut directory = state.user_directory();
            directory.delete_user(user_id).await?;
            info!(user_id = %user_id, "User deleted");
        }
    }
    Ok(())
}

fn print_user(user: &Profile) {
    info!(
        id = %user.id,
        email = %user.email,
        role = %user.role,
        joined = %user.created_at.format("%Y-%m-%d"),
        "{}",
        user.display_name()
    );
}
