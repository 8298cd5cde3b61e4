//! The signed-in user's cart.
//!
//! Refresh strategy per operation:
//!
//! | operation          | local state after success            |
//! |--------------------|--------------------------------------|
//! | `fetch_cart`       | replaced by the server rows          |
//! | `add_to_cart`      | re-fetched                           |
//! | `update_quantity`  | re-fetched (or removal, for `<= 0`)  |
//! | `remove_from_cart` | line filtered out locally            |
//! | `clear_cart`       | emptied locally                      |
//!
//! A failed request leaves local state untouched.

use std::sync::Arc;

use tracing::{error, instrument};

use apartmart_core::{Amount, CartItemId, ProductId, UserId, VariantId};

use super::{AuthStore, StoreError};
use crate::backend::{Backend, Embed, Query};
use crate::error::add_breadcrumb;
use crate::models::{CartItem, NewCartItem, QuantityUpdate, tables};

/// Quantity added when the caller does not specify one.
pub const DEFAULT_QUANTITY: u32 = 1;

/// Cart lines for the current profile.
pub struct CartStore {
    backend: Arc<dyn Backend>,
    auth: AuthStore,
    items: Vec<CartItem>,
    loading: bool,
}

impl CartStore {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, auth: AuthStore) -> Self {
        Self {
            backend,
            auth,
            items: Vec::new(),
            loading: false,
        }
    }

    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    /// Load every cart line with product and variant snapshots.
    ///
    /// Does nothing while signed out.
    ///
    /// # Errors
    ///
    /// Returns the backend error; local state is kept.
    #[instrument(skip(self))]
    pub async fn fetch_cart(&mut self) -> Result<(), StoreError> {
        let Some(profile) = self.auth.profile() else {
            return Ok(());
        };

        self.loading = true;
        let result = self
            .backend
            .fetch::<CartItem>(
                tables::CART_ITEMS,
                &Query::new()
                    .embed(Embed::one("product", tables::PRODUCTS, "product_id"))
                    .embed(Embed::one("variant", tables::PRODUCT_VARIANTS, "variant_id"))
                    .eq("user_id", profile.id)
                    .order("created_at", true),
            )
            .await;
        self.loading = false;

        match result {
            Ok(items) => {
                self.items = items;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Error fetching cart");
                Err(e.into())
            }
        }
    }

    /// Add `quantity` of a product (and optional variant), merging into an
    /// existing line for the same pair, then re-fetch.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotSignedIn` without a profile, or the backend
    /// error.
    #[instrument(skip(self))]
    pub async fn add_to_cart(
        &mut self,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: u32,
    ) -> Result<(), StoreError> {
        let Some(profile) = self.auth.profile() else {
            return Err(StoreError::NotSignedIn);
        };
        if quantity == 0 {
            return Ok(());
        }

        if let Err(e) = self.merge_or_insert(profile.id, product_id, variant_id, quantity).await {
            error!(error = %e, "Error adding to cart");
            return Err(e);
        }
        add_breadcrumb(
            "cart",
            "Added to cart",
            &[
                ("product_id", product_id.to_string().as_str()),
                ("quantity", quantity.to_string().as_str()),
            ],
        );
        self.fetch_cart().await
    }

    async fn merge_or_insert(
        &self,
        user_id: UserId,
        product_id: ProductId,
        variant_id: Option<VariantId>,
        quantity: u32,
    ) -> Result<(), StoreError> {
        let existing = self
            .backend
            .fetch_optional::<CartItem>(
                tables::CART_ITEMS,
                &Query::new()
                    .eq("user_id", user_id)
                    .eq("product_id", product_id)
                    .eq_or_null("variant_id", variant_id),
            )
            .await?;

        match existing {
            Some(line) => {
                self.backend
                    .update_rows::<_, CartItem>(
                        tables::CART_ITEMS,
                        &Query::new().eq("id", line.id),
                        &QuantityUpdate {
                            quantity: line.quantity.saturating_add(quantity),
                        },
                    )
                    .await?;
            }
            None => {
                self.backend
                    .insert_one::<_, CartItem>(
                        tables::CART_ITEMS,
                        &NewCartItem {
                            user_id,
                            product_id,
                            variant_id,
                            quantity,
                        },
                    )
                    .await?;
            }
        }
        Ok(())
    }

    /// Set a line's quantity and re-fetch. A quantity of zero or less
    /// removes the line instead.
    ///
    /// # Errors
    ///
    /// Returns the backend error.
    #[instrument(skip(self))]
    pub async fn update_quantity(
        &mut self,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<(), StoreError> {
        let Ok(quantity @ 1..) = u32::try_from(quantity) else {
            return self.remove_from_cart(item_id).await;
        };

        if let Err(e) = self
            .backend
            .update_rows::<_, CartItem>(
                tables::CART_ITEMS,
                &Query::new().eq("id", item_id),
                &QuantityUpdate { quantity },
            )
            .await
        {
            error!(error = %e, "Error updating quantity");
            return Err(e.into());
        }
        self.fetch_cart().await
    }

    /// Delete a line, then drop it from local state without re-fetching.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the line stays in local state.
    #[instrument(skip(self))]
    pub async fn remove_from_cart(&mut self, item_id: CartItemId) -> Result<(), StoreError> {
        if let Err(e) = self
            .backend
            .delete(tables::CART_ITEMS, &Query::new().eq("id", item_id))
            .await
        {
            error!(error = %e, "Error removing from cart");
            return Err(e.into());
        }
        self.items.retain(|item| item.id != item_id);
        Ok(())
    }

    /// Delete every line for the current user and empty local state.
    ///
    /// Does nothing while signed out.
    ///
    /// # Errors
    ///
    /// Returns the backend error; local state is kept.
    #[instrument(skip(self))]
    pub async fn clear_cart(&mut self) -> Result<(), StoreError> {
        let Some(profile) = self.auth.profile() else {
            return Ok(());
        };

        if let Err(e) = self
            .backend
            .delete(tables::CART_ITEMS, &Query::new().eq("user_id", profile.id))
            .await
        {
            error!(error = %e, "Error clearing cart");
            return Err(e.into());
        }
        self.items.clear();
        Ok(())
    }

    /// Sum of (product price + variant adjustment) x quantity.
    #[must_use]
    pub fn cart_total(&self) -> Amount {
        self.items.iter().map(CartItem::line_total).sum()
    }

    /// Sum of quantities.
    #[must_use]
    pub fn cart_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}
