//! Administrator views: the dashboard and user management.
//!
//! Both are reachable only through the `/admin` routes, which the access
//! guard restricts to administrators. Row-level permissions are enforced by
//! the backend, not here.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{error, info, instrument};

use apartmart_core::{Amount, Role, UserId};

use crate::backend::{Backend, BackendError, Embed, Query};
use crate::models::{Order, Profile, RoleUpdate, tables};

/// How many recent rows the dashboards show.
pub const RECENT_LIMIT: usize = 5;

/// Store-wide totals plus the newest users and orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminDashboard {
    pub total_users: u64,
    pub total_products: u64,
    pub total_orders: u64,
    /// Sum of every order total.
    pub total_revenue: Amount,
    pub recent_users: Vec<Profile>,
    /// Newest orders with the ordering profile's name and email.
    pub recent_orders: Vec<Order>,
}

#[derive(Deserialize)]
struct OrderAmount {
    total_amount: Amount,
}

/// Load the administrator dashboard. The six reads run concurrently.
///
/// # Errors
///
/// Returns the first backend error.
#[instrument(skip(backend))]
pub async fn dashboard(backend: &dyn Backend) -> Result<AdminDashboard, BackendError> {
    let everything = Query::new();
    let newest = Query::new().order("created_at", false).limit(RECENT_LIMIT);
    let newest_orders = newest
        .clone()
        .embed(Embed::one("profile", tables::PROFILES, "user_id"));

    let result = tokio::try_join!(
        backend.count(tables::PROFILES, &everything),
        backend.count(tables::PRODUCTS, &everything),
        backend.count(tables::ORDERS, &everything),
        backend.fetch::<OrderAmount>(tables::ORDERS, &everything),
        backend.fetch::<Profile>(tables::PROFILES, &newest),
        backend.fetch::<Order>(tables::ORDERS, &newest_orders),
    );

    match result {
        Ok((total_users, total_products, total_orders, amounts, recent_users, recent_orders)) => {
            Ok(AdminDashboard {
                total_users,
                total_products,
                total_orders,
                total_revenue: amounts.into_iter().map(|o| o.total_amount).sum(),
                recent_users,
                recent_orders,
            })
        }
        Err(e) => {
            error!(error = %e, "Error fetching dashboard data");
            Err(e)
        }
    }
}

/// Number of profiles holding each role. Every role is present, even at
/// zero.
#[must_use]
pub fn role_counts(users: &[Profile]) -> BTreeMap<Role, usize> {
    let mut counts: BTreeMap<Role, usize> = Role::ALL.into_iter().map(|r| (r, 0)).collect();
    for user in users {
        *counts.entry(user.role).or_default() += 1;
    }
    counts
}

/// Profiles whose full name, username or email contains `search`
/// (case-insensitive) and, when given, whose role is exactly `role`.
#[must_use]
pub fn filter_users<'a>(users: &'a [Profile], search: &str, role: Option<Role>) -> Vec<&'a Profile> {
    let term = search.to_lowercase();
    let contains = |field: Option<&str>| field.is_some_and(|f| f.to_lowercase().contains(&term));

    users
        .iter()
        .filter(|user| {
            term.is_empty()
                || contains(user.full_name.as_deref())
                || contains(user.username.as_deref())
                || contains(Some(&user.email))
        })
        .filter(|user| role.is_none_or(|role| user.role == role))
        .collect()
}

/// The user-management list.
///
/// Mutations patch the loaded list in place after the server accepts them
/// rather than re-fetching it.
pub struct UserDirectory {
    backend: Arc<dyn Backend>,
    users: Vec<Profile>,
}

impl UserDirectory {
    #[must_use]
    pub const fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            users: Vec::new(),
        }
    }

    #[must_use]
    pub fn users(&self) -> &[Profile] {
        &self.users
    }

    /// Load every profile, newest first.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the previous list is kept.
    #[instrument(skip(self))]
    pub async fn list_users(&mut self) -> Result<&[Profile], BackendError> {
        match self
            .backend
            .fetch::<Profile>(tables::PROFILES, &Query::new().order("created_at", false))
            .await
        {
            Ok(users) => {
                self.users = users;
                Ok(&self.users)
            }
            Err(e) => {
                error!(error = %e, "Error fetching users");
                Err(e)
            }
        }
    }

    /// See [`filter_users`].
    #[must_use]
    pub fn filter_users(&self, search: &str, role: Option<Role>) -> Vec<&Profile> {
        filter_users(&self.users, search, role)
    }

    /// See [`role_counts`].
    #[must_use]
    pub fn role_counts(&self) -> BTreeMap<Role, usize> {
        role_counts(&self.users)
    }

    /// Change a profile's role.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the local list is unchanged.
    #[instrument(skip(self))]
    pub async fn update_user_role(&mut self, user_id: UserId, role: Role) -> Result<(), BackendError> {
        if let Err(e) = self
            .backend
            .update_rows::<_, Profile>(
                tables::PROFILES,
                &Query::new().eq("id", user_id),
                &RoleUpdate { role },
            )
            .await
        {
            error!(%user_id, error = %e, "Error updating user role");
            return Err(e);
        }

        for user in self.users.iter_mut().filter(|u| u.id == user_id) {
            user.role = role;
        }
        info!(%user_id, %role, "User role changed");
        Ok(())
    }

    /// Delete a profile row. The identity behind it is not removed.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the local list is unchanged.
    #[instrument(skip(self))]
    pub async fn delete_user(&mut self, user_id: UserId) -> Result<(), BackendError> {
        if let Err(e) = self
            .backend
            .delete(tables::PROFILES, &Query::new().eq("id", user_id))
            .await
        {
            error!(%user_id, error = %e, "Error deleting user");
            return Err(e);
        }

        self.users.retain(|u| u.id != user_id);
        info!(%user_id, "User deleted");
        Ok(())
    }
}
