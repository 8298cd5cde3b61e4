//! Checkout: pricing policy and order placement.
//!
//! Placing an order is three backend writes with no transaction around
//! them:
//!
//! 1. Insert the order row
//! 2. Insert one order item per cart line, priced at the current unit price
//! 3. Clear the cart
//!
//! A failure in step 2 leaves an order with no items behind and is reported
//! as [`CheckoutError::OrderItemsInsert`] carrying the order id. A failure
//! in step 3 is logged only; the order has been placed by then.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use apartmart_core::validation::CheckoutForm;
use apartmart_core::{Amount, OrderId, OrderStatus, PaymentStatus, ValidationErrors};

use crate::backend::BackendError;
use crate::error::add_breadcrumb;
use crate::models::{NewOrder, NewOrderItem, Order, OrderItem, Profile, tables};
use crate::stores::{AuthStore, CartStore, StoreError};

/// Flat tax applied to the subtotal, as a fraction.
pub const TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Payment method recorded on every order.
pub const PAYMENT_METHOD: &str = "Credit Card";

/// Errors that can occur while placing an order.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("not signed in")]
    NotSignedIn,

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    /// Nothing was written.
    #[error("order could not be created: {0}")]
    OrderInsert(#[source] BackendError),

    /// The order row exists but has no items.
    #[error("order {order_id} was created but its items were not stored: {source}")]
    OrderItemsInsert {
        order_id: OrderId,
        #[source]
        source: BackendError,
    },

    #[error("checkout backend error: {0}")]
    Backend(#[from] BackendError),
}

impl From<StoreError> for CheckoutError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotSignedIn => Self::NotSignedIn,
            StoreError::Backend(e) => Self::Backend(e),
        }
    }
}

/// Price breakdown shown on the checkout page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutSummary {
    pub subtotal: Amount,
    pub tax: Amount,
    /// Always free.
    pub shipping: Amount,
    pub total: Amount,
}

impl CheckoutSummary {
    #[must_use]
    pub fn from_subtotal(subtotal: Amount) -> Self {
        let tax = subtotal.percent(TAX_RATE);
        Self {
            subtotal,
            tax,
            shipping: Amount::ZERO,
            total: subtotal + tax,
        }
    }

    /// Summary for the lines currently in `cart`.
    #[must_use]
    pub fn for_cart(cart: &CartStore) -> Self {
        Self::from_subtotal(cart.cart_total())
    }
}

/// A checkout form pre-filled from the signed-in profile. Payment fields
/// start empty and billing defaults to the shipping address.
#[must_use]
pub fn prefill(profile: &Profile) -> CheckoutForm {
    CheckoutForm {
        full_name: profile.full_name.clone().unwrap_or_default(),
        email: profile.email.clone(),
        phone: profile.phone.clone().unwrap_or_default(),
        address: profile.address.clone().unwrap_or_default(),
        city: profile.city.clone().unwrap_or_default(),
        country: profile.country.clone().unwrap_or_default(),
        billing_same_as_shipping: true,
        ..CheckoutForm::default()
    }
}

/// Turn the current cart into an order and empty the cart.
///
/// Returns the stored order with its items attached.
///
/// # Errors
///
/// Returns `NotSignedIn` without a profile, `Validation` for a bad form,
/// `EmptyCart` for an empty cart, `OrderInsert` if nothing was written, or
/// `OrderItemsInsert` if the order row was stored without items.
#[instrument(skip(auth, cart, form))]
pub async fn place_order(
    auth: &AuthStore,
    cart: &mut CartStore,
    form: &CheckoutForm,
) -> Result<Order, CheckoutError> {
    let Some(profile) = auth.profile() else {
        return Err(CheckoutError::NotSignedIn);
    };
    form.validate()?;
    if cart.items().is_empty() {
        return Err(CheckoutError::EmptyCart);
    }

    let backend = auth.backend().as_ref();
    let summary = CheckoutSummary::for_cart(cart);

    let new_order = NewOrder {
        user_id: profile.id,
        status: OrderStatus::Pending,
        total_amount: summary.total,
        shipping_address: form.shipping_address(),
        billing_address: form.billing_address(),
        payment_method: PAYMENT_METHOD.to_owned(),
        payment_status: PaymentStatus::Completed,
    };
    let mut order: Order = backend
        .insert_one(tables::ORDERS, &new_order)
        .await
        .map_err(|e| {
            error!(error = %e, "Error creating order");
            CheckoutError::OrderInsert(e)
        })?;

    let lines: Vec<NewOrderItem> = cart
        .items()
        .iter()
        .map(|item| NewOrderItem {
            order_id: order.id,
            product_id: item.product_id,
            variant_id: item.variant_id,
            quantity: item.quantity,
            price: item.unit_price(),
        })
        .collect();
    order.items = backend
        .insert_many::<_, OrderItem>(tables::ORDER_ITEMS, &lines)
        .await
        .map_err(|source| {
            error!(order_id = %order.id, error = %source, "Error creating order items");
            CheckoutError::OrderItemsInsert {
                order_id: order.id,
                source,
            }
        })?;

    if let Err(e) = cart.clear_cart().await {
        warn!(order_id = %order.id, error = %e, "Order placed but cart was not cleared");
    }

    add_breadcrumb("checkout", "Order placed", &[("order_id", order.id.to_string().as_str())]);
    info!(order_id = %order.id, total = %order.total_amount, "Order placed");
    Ok(order)
}
