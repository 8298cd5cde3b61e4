//! Cart rows.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use apartmart_core::{Amount, CartItemId, Price, ProductId, UserId, VariantId};

use super::{Product, ProductVariant};

/// One (user, product, variant) line in a cart, with product and variant
/// snapshots embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub product: Option<Product>,
    #[serde(default)]
    pub variant: Option<ProductVariant>,
}

impl CartItem {
    /// Product price plus variant adjustment; a missing product or variant
    /// contributes zero. A large negative adjustment yields a negative price.
    #[must_use]
    pub fn unit_price(&self) -> Amount {
        let base = self.product.as_ref().map_or(Price::ZERO, |p| p.price);
        let adjustment = self
            .variant
            .as_ref()
            .map_or(Decimal::ZERO, |v| v.price_adjustment);
        base.adjusted(adjustment)
    }

    #[must_use]
    pub fn line_total(&self) -> Amount {
        self.unit_price() * self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewCartItem {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub variant_id: Option<VariantId>,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuantityUpdate {
    pub quantity: u32,
}
