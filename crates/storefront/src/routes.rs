//! Client route table.
//!
//! # Routes
//!
//! ## Public
//! - `/`, `/products` - Catalog
//! - `/auth/signin`, `/auth/signup` - Auth forms
//!
//! ## Signed in
//! - `/profile`, `/cart`, `/checkout`, `/wishlist`, `/orders`
//!
//! ## Role-gated
//! - `/admin/*` - Administrators
//! - `/team/*` - Team members (and administrators)

use core::fmt;

use apartmart_core::Role;

use crate::guard::{self, GuardDecision, Requirement};
use crate::stores::AuthSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Products,
    SignIn,
    SignUp,
    Profile,
    Cart,
    Checkout,
    Wishlist,
    Orders,
    Admin,
    Team,
    NotFound,
}

impl Route {
    /// Map a location to its route. Query strings, fragments and a trailing
    /// slash are ignored; `/admin` and `/team` match their whole subtree.
    #[must_use]
    pub fn resolve(location: &str) -> Self {
        let path = location
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let path = match path.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        };

        match path {
            "/" => Self::Home,
            "/products" => Self::Products,
            "/auth/signin" => Self::SignIn,
            "/auth/signup" => Self::SignUp,
            "/profile" => Self::Profile,
            "/cart" => Self::Cart,
            "/checkout" => Self::Checkout,
            "/wishlist" => Self::Wishlist,
            "/orders" => Self::Orders,
            p if in_subtree(p, "/admin") => Self::Admin,
            p if in_subtree(p, "/team") => Self::Team,
            _ => Self::NotFound,
        }
    }

    /// Canonical path.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Home => "/",
            Self::Products => "/products",
            Self::SignIn => "/auth/signin",
            Self::SignUp => "/auth/signup",
            Self::Profile => "/profile",
            Self::Cart => "/cart",
            Self::Checkout => "/checkout",
            Self::Wishlist => "/wishlist",
            Self::Orders => "/orders",
            Self::Admin => "/admin",
            Self::Team => "/team",
            Self::NotFound => "/404",
        }
    }

    /// What the access guard demands for this route.
    #[must_use]
    pub const fn requirement(self) -> Requirement {
        match self {
            Self::Home | Self::Products | Self::SignIn | Self::SignUp | Self::NotFound => {
                Requirement::PUBLIC
            }
            Self::Profile | Self::Cart | Self::Checkout | Self::Wishlist | Self::Orders => {
                Requirement::AUTHENTICATED
            }
            Self::Admin => Requirement::role(Role::Admin),
            Self::Team => Requirement::role(Role::Team),
        }
    }

    /// Resolve `location` and run the access guard for it.
    #[must_use]
    pub fn guard(auth: &AuthSnapshot, location: &str) -> (Self, GuardDecision) {
        let route = Self::resolve(location);
        (route, guard::check(auth, route.requirement(), location))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

fn in_subtree(path: &str, root: &str) -> bool {
    path.strip_prefix(root)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}
