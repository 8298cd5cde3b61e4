//! Route-level access guard.
//!
//! A stateless check of the current [`AuthSnapshot`] against a view's
//! [`Requirement`], re-evaluated on every render. Role gates use the
//! [`Role`] lattice, so an administrator passes a team gate.

use apartmart_core::Role;

use crate::stores::AuthSnapshot;

/// Where unauthenticated visitors are sent.
pub const SIGN_IN_PATH: &str = "/auth/signin";

/// Where visitors lacking the required role are sent.
pub const HOME_PATH: &str = "/";

/// What a view demands of the visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Requirement {
    pub require_auth: bool,
    pub required_role: Option<Role>,
}

impl Requirement {
    /// Anyone may view.
    pub const PUBLIC: Self = Self {
        require_auth: false,
        required_role: None,
    };

    /// Any signed-in identity may view.
    pub const AUTHENTICATED: Self = Self {
        require_auth: true,
        required_role: None,
    };

    /// Signed in with a profile whose role satisfies `role`.
    #[must_use]
    pub const fn role(role: Role) -> Self {
        Self {
            require_auth: true,
            required_role: Some(role),
        }
    }
}

/// Outcome of a guard check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Auth state is still initializing; show a placeholder.
    Loading,
    /// Send to sign-in, returning to `from` afterwards.
    RedirectToSignIn { from: String },
    /// Signed in but not permitted; send home.
    RedirectHome,
    /// Render the guarded content.
    Allow,
}

impl GuardDecision {
    /// Redirect target, if the decision is a redirect.
    #[must_use]
    pub const fn redirect_path(&self) -> Option<&'static str> {
        match self {
            Self::RedirectToSignIn { .. } => Some(SIGN_IN_PATH),
            Self::RedirectHome => Some(HOME_PATH),
            Self::Loading | Self::Allow => None,
        }
    }
}

/// Decide whether the visitor described by `auth` may view `location`.
#[must_use]
pub fn check(auth: &AuthSnapshot, requirement: Requirement, location: &str) -> GuardDecision {
    if auth.loading {
        return GuardDecision::Loading;
    }

    if requirement.require_auth && auth.user.is_none() {
        return GuardDecision::RedirectToSignIn {
            from: location.to_owned(),
        };
    }

    match requirement.required_role {
        Some(required) if !auth.role().is_some_and(|role| role.satisfies(required)) => {
            GuardDecision::RedirectHome
        }
        _ => GuardDecision::Allow,
    }
}
