//! Reviews and wishlists. Read-only from this client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use apartmart_core::{ProductId, ReviewId, UserId, WishlistItemId};

use super::{Product, ProfileSummary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: ReviewId,
    pub product_id: ProductId,
    pub user_id: UserId,
    /// 1 to 5.
    pub rating: u8,
    pub title: Option<String>,
    pub comment: Option<String>,
    #[serde(default)]
    pub is_verified_purchase: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    pub id: WishlistItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
}
