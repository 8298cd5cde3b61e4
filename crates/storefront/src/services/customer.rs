//! Read-only customer views: order history, wishlist and product reviews.

use tracing::{error, instrument};

use apartmart_core::ProductId;

use crate::backend::{Backend, BackendError, Embed, Query};
use crate::models::{Order, Review, WishlistItem, tables};
use crate::stores::{AuthStore, StoreError};

/// The signed-in customer's orders, newest first, with their items.
///
/// # Errors
///
/// Returns `StoreError::NotSignedIn` without a profile, or the backend
/// error.
#[instrument(skip(auth))]
pub async fn orders(auth: &AuthStore) -> Result<Vec<Order>, StoreError> {
    let profile = auth.profile().ok_or(StoreError::NotSignedIn)?;
    auth.backend()
        .fetch::<Order>(
            tables::ORDERS,
            &Query::new()
                .embed(Embed::many("items", tables::ORDER_ITEMS, "order_id"))
                .eq("user_id", profile.id)
                .order("created_at", false),
        )
        .await
        .map_err(|e| {
            error!(error = %e, "Error fetching orders");
            e.into()
        })
}

/// The signed-in customer's wishlist, newest first, with product details.
///
/// # Errors
///
/// Returns `StoreError::NotSignedIn` without a profile, or the backend
/// error.
#[instrument(skip(auth))]
pub async fn wishlist(auth: &AuthStore) -> Result<Vec<WishlistItem>, StoreError> {
    let profile = auth.profile().ok_or(StoreError::NotSignedIn)?;
    auth.backend()
        .fetch::<WishlistItem>(
            tables::WISHLIST_ITEMS,
            &Query::new()
                .embed(Embed::one("product", tables::PRODUCTS, "product_id"))
                .eq("user_id", profile.id)
                .order("created_at", false),
        )
        .await
        .map_err(|e| {
            error!(error = %e, "Error fetching wishlist");
            e.into()
        })
}

/// Reviews of a product, newest first, with the reviewer's name.
///
/// # Errors
///
/// Returns the backend error.
#[instrument(skip(backend))]
pub async fn product_reviews(
    backend: &dyn Backend,
    product_id: ProductId,
) -> Result<Vec<Review>, BackendError> {
    backend
        .fetch::<Review>(
            tables::REVIEWS,
            &Query::new()
                .embed(Embed::one("profile", tables::PROFILES, "user_id"))
                .eq("product_id", product_id)
                .order("created_at", false),
        )
        .await
        .inspect_err(|e| error!(error = %e, "Error fetching reviews"))
}
