//! Application-level user records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use apartmart_core::{Role, UserId};

/// A user profile. Shares its id with the authentication identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub email: String,
    pub username: Option<String>,
    pub full_name: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Full name, else username, else email.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .or(self.username.as_deref())
            .unwrap_or(&self.email)
    }
}

/// Name and email of a related profile, as embedded in orders and reviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub full_name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
}

/// Profile row inserted right after an identity is created.
///
/// The role is chosen by the caller; the other fields come from the
/// sign-up form.
#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub id: UserId,
    pub email: String,
    pub role: Role,
    #[serde(flatten)]
    pub details: ProfileUpdate,
}

/// Self-service profile changes. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Administrator role change.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RoleUpdate {
    pub role: Role,
}
