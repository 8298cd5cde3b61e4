//! Profile roles and the access-tier ordering between them.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a role string is not one of the known tiers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid role: {0}. Valid roles: customer, team, admin")]
pub struct RoleParseError(pub String);

/// Access tier stored on every profile row.
///
/// Variants are declared from least to most privileged and the derived
/// [`Ord`] follows that order, so a new tier only needs to be inserted in
/// the right position for every gate to pick it up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Shoppers. Assigned to every self-service sign-up.
    #[default]
    Customer,
    /// Staff who manage the catalog and work the order queue.
    Team,
    /// Full access, including user management.
    Admin,
}

impl Role {
    /// All roles, least privileged first.
    pub const ALL: [Self; 3] = [Self::Customer, Self::Team, Self::Admin];

    /// Whether a holder of `self` may pass a gate that requires `required`.
    ///
    /// An administrator satisfies a team gate; a team member does not
    /// satisfy an administrator gate.
    #[must_use]
    pub fn satisfies(self, required: Self) -> bool {
        self >= required
    }

    /// The wire/string form of this role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Team => "team",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "team" => Ok(Self::Team),
            "admin" => Ok(Self::Admin),
            _ => Err(RoleParseError(s.to_owned())),
        }
    }
}
