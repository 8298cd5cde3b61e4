//! Checkout from a filled cart through to the order history.

#![allow(clippy::unwrap_used)]

use apartmart_core::validation::CheckoutForm;
use apartmart_core::{Amount, OrderStatus, PaymentStatus, Role};
use apartmart_integration_tests::{TestContext, dec};
use apartmart_storefront::backend::Operation;
use apartmart_storefront::models::tables;
use apartmart_storefront::services::checkout::{self, CheckoutSummary};
use apartmart_storefront::services::{CheckoutError, customer};
use apartmart_storefront::stores::CartStore;

async fn filled_cart(ctx: &TestContext) -> CartStore {
    ctx.signed_in("shopper@example.com", Role::Customer).await;
    let lamp = ctx.product("Lamp", "10.00").await;
    let large = ctx.variant(lamp, "2.00").await;
    let bulb = ctx.product("Bulb", "5.00").await;

    let mut cart = ctx.state.cart();
    cart.add_to_cart(lamp, Some(large), 2).await.unwrap();
    cart.add_to_cart(bulb, None, 1).await.unwrap();
    cart
}

fn completed_form(ctx: &TestContext) -> CheckoutForm {
    let profile = ctx.state.auth().profile().unwrap();
    CheckoutForm {
        phone: "+44 20 7946 0000".to_owned(),
        address: "12 Analytical Row".to_owned(),
        city: "London".to_owned(),
        country: "United Kingdom".to_owned(),
        card_number: "4242424242424242".to_owned(),
        expiry_date: "12/29".to_owned(),
        cvv: "123".to_owned(),
        card_name: "Test Customer".to_owned(),
        ..checkout::prefill(&profile)
    }
}

#[tokio::test]
async fn test_order_is_placed_and_listed() {
    let ctx = TestContext::new().await;
    let mut cart = filled_cart(&ctx).await;
    let form = completed_form(&ctx);

    let summary = CheckoutSummary::for_cart(&cart);
    assert_eq!(summary.subtotal, Amount::new(dec("29.00")));
    assert_eq!(summary.tax, Amount::new(dec("2.90")));
    assert_eq!(summary.total, Amount::new(dec("31.90")));

    let order = checkout::place_order(ctx.state.auth(), &mut cart, &form)
        .await
        .unwrap();

    assert_eq!(order.total_amount, summary.total);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Completed);
    assert_eq!(order.shipping_address, "12 Analytical Row, London, United Kingdom");
    assert_eq!(order.billing_address.as_deref(), Some(order.shipping_address.as_str()));
    assert_eq!(order.item_count(), 3);
    assert!(cart.items().is_empty());
    assert!(ctx.backend.rows(tables::CART_ITEMS).await.is_empty());

    let history = customer::orders(ctx.state.auth()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, order.id);
    assert_eq!(history[0].items.len(), 2);
    let lamp_line = history[0]
        .items
        .iter()
        .find(|line| line.quantity == 2)
        .unwrap();
    assert_eq!(lamp_line.price, Amount::new(dec("12.00")));
}

#[tokio::test]
async fn test_separate_billing_is_not_recorded() {
    let ctx = TestContext::new().await;
    let mut cart = filled_cart(&ctx).await;
    let form = CheckoutForm {
        billing_same_as_shipping: false,
        ..completed_form(&ctx)
    };

    let order = checkout::place_order(ctx.state.auth(), &mut cart, &form)
        .await
        .unwrap();

    assert_eq!(order.billing_address, None);
}

#[tokio::test]
async fn test_missing_payment_fields_write_nothing() {
    let ctx = TestContext::new().await;
    let mut cart = filled_cart(&ctx).await;
    let profile = ctx.state.auth().profile().unwrap();
    let form = checkout::prefill(&profile);

    let err = checkout::place_order(ctx.state.auth(), &mut cart, &form)
        .await
        .unwrap_err();

    let CheckoutError::Validation(errors) = err else {
        panic!("expected validation errors, got {err:?}");
    };
    assert!(errors.get("card_number").is_some());
    assert!(ctx.backend.rows(tables::ORDERS).await.is_empty());
    assert_eq!(cart.cart_count(), 3);
}

#[tokio::test]
async fn test_empty_cart_is_rejected() {
    let ctx = TestContext::new().await;
    ctx.signed_in("shopper@example.com", Role::Customer).await;
    let mut cart = ctx.state.cart();
    let form = completed_form(&ctx);

    let err = checkout::place_order(ctx.state.auth(), &mut cart, &form)
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::EmptyCart));
    assert!(ctx.backend.rows(tables::ORDERS).await.is_empty());
}

#[tokio::test]
async fn test_failed_item_insert_leaves_order_without_items() {
    let ctx = TestContext::new().await;
    let mut cart = filled_cart(&ctx).await;
    let form = completed_form(&ctx);
    ctx.backend.fail_next(tables::ORDER_ITEMS, Operation::Insert).await;

    let err = checkout::place_order(ctx.state.auth(), &mut cart, &form)
        .await
        .unwrap_err();

    let CheckoutError::OrderItemsInsert { order_id, .. } = err else {
        panic!("expected an order item failure, got {err:?}");
    };
    let history = customer::orders(ctx.state.auth()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].id, order_id);
    assert!(history[0].items.is_empty());
    assert_eq!(cart.cart_count(), 3, "cart is kept for a retry");
}

#[tokio::test]
async fn test_failed_order_insert_writes_nothing() {
    let ctx = TestContext::new().await;
    let mut cart = filled_cart(&ctx).await;
    let form = completed_form(&ctx);
    ctx.backend.fail_next(tables::ORDERS, Operation::Insert).await;

    let err = checkout::place_order(ctx.state.auth(), &mut cart, &form)
        .await
        .unwrap_err();

    assert!(matches!(err, CheckoutError::OrderInsert(_)));
    assert!(ctx.backend.rows(tables::ORDERS).await.is_empty());
    assert!(ctx.backend.rows(tables::ORDER_ITEMS).await.is_empty());
}
