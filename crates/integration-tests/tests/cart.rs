//! Cart totals, merging and removal against a shared backend.

#![allow(clippy::unwrap_used)]

use apartmart_core::{Amount, Role};
use apartmart_integration_tests::{TestContext, dec, settle};
use apartmart_storefront::models::tables;
use apartmart_storefront::stores::StoreError;

#[tokio::test]
async fn test_two_line_cart_totals() {
    let ctx = TestContext::new().await;
    ctx.signed_in("shopper@example.com", Role::Customer).await;
    let a = ctx.product("Lamp", "10.00").await;
    let large = ctx.variant(a, "2.00").await;
    let b = ctx.product("Bulb", "5.00").await;

    let mut cart = ctx.state.cart();
    cart.add_to_cart(a, Some(large), 2).await.unwrap();
    cart.add_to_cart(b, None, 1).await.unwrap();

    assert_eq!(cart.cart_total(), Amount::new(dec("29.00")));
    assert_eq!(cart.cart_count(), 3);
}

#[tokio::test]
async fn test_total_is_sum_of_line_totals() {
    let ctx = TestContext::new().await;
    ctx.signed_in("shopper@example.com", Role::Customer).await;
    let chair = ctx.product("Chair", "49.99").await;
    let discounted = ctx.variant(chair, "-5.00").await;
    let rug = ctx.product("Rug", "19.95").await;

    let mut cart = ctx.state.cart();
    cart.add_to_cart(chair, Some(discounted), 3).await.unwrap();
    cart.add_to_cart(chair, None, 1).await.unwrap();
    cart.add_to_cart(rug, None, 2).await.unwrap();

    let expected: Amount = cart.items().iter().map(|item| item.line_total()).sum();
    assert_eq!(cart.cart_total(), expected);
    assert_eq!(cart.cart_total(), Amount::new(dec("224.86")));
    assert_eq!(cart.cart_count(), 6);
    assert_eq!(cart.items().len(), 3);
}

#[tokio::test]
async fn test_adjustment_larger_than_price_lowers_total() {
    let ctx = TestContext::new().await;
    ctx.signed_in("shopper@example.com", Role::Customer).await;
    let tea = ctx.product("Tea", "5.00").await;
    let voucher = ctx.variant(tea, "-8.00").await;

    let mut cart = ctx.state.cart();
    cart.add_to_cart(tea, Some(voucher), 2).await.unwrap();

    assert_eq!(cart.items()[0].line_total(), Amount::new(dec("-6.00")));
    assert_eq!(cart.cart_total(), Amount::new(dec("-6.00")));
}

#[tokio::test]
async fn test_adding_same_product_merges_line() {
    let ctx = TestContext::new().await;
    ctx.signed_in("shopper@example.com", Role::Customer).await;
    let mug = ctx.product("Mug", "8.00").await;

    let mut cart = ctx.state.cart();
    cart.add_to_cart(mug, None, 1).await.unwrap();
    cart.add_to_cart(mug, None, 2).await.unwrap();

    assert_eq!(cart.items().len(), 1);
    assert_eq!(cart.items()[0].quantity, 3);
    assert_eq!(ctx.backend.rows(tables::CART_ITEMS).await.len(), 1);
}

#[tokio::test]
async fn test_update_to_zero_or_less_matches_remove() {
    let mut end_states = Vec::new();
    for quantity in [None, Some(0), Some(-2)] {
        let ctx = TestContext::new().await;
        ctx.signed_in("shopper@example.com", Role::Customer).await;
        let keep = ctx.product("Keep", "3.00").await;
        let dropped = ctx.product("Drop", "4.00").await;

        let mut cart = ctx.state.cart();
        cart.add_to_cart(keep, None, 1).await.unwrap();
        cart.add_to_cart(dropped, None, 2).await.unwrap();
        let line = cart.items().iter().find(|i| i.product_id == dropped).unwrap().id;

        match quantity {
            None => cart.remove_from_cart(line).await.unwrap(),
            Some(q) => cart.update_quantity(line, q).await.unwrap(),
        }

        let names: Vec<String> = cart
            .items()
            .iter()
            .map(|i| i.product.as_ref().unwrap().name.clone())
            .collect();
        let stored = ctx.backend.rows(tables::CART_ITEMS).await.len();
        end_states.push((names, cart.cart_count(), cart.cart_total(), stored));
    }

    assert_eq!(end_states[0], end_states[1]);
    assert_eq!(end_states[0], end_states[2]);
    assert_eq!(end_states[0].0, vec!["Keep".to_owned()]);
}

#[tokio::test]
async fn test_cart_is_reloaded_by_a_new_store() {
    let ctx = TestContext::new().await;
    ctx.signed_in("shopper@example.com", Role::Customer).await;
    let pan = ctx.product("Pan", "22.50").await;

    ctx.state.cart().add_to_cart(pan, None, 2).await.unwrap();

    let mut reopened = ctx.state.cart();
    assert!(reopened.items().is_empty());
    reopened.fetch_cart().await.unwrap();
    assert_eq!(reopened.cart_count(), 2);
    assert_eq!(reopened.cart_total(), Amount::new(dec("45.00")));
}

#[tokio::test]
async fn test_signed_out_add_is_rejected() {
    let ctx = TestContext::new().await;
    let pan = ctx.product("Pan", "22.50").await;

    let mut cart = ctx.state.cart();
    let err = cart.add_to_cart(pan, None, 1).await.unwrap_err();

    assert!(matches!(err, StoreError::NotSignedIn));
    assert!(ctx.backend.rows(tables::CART_ITEMS).await.is_empty());
}

#[tokio::test]
async fn test_signed_out_store_loads_nothing() {
    let ctx = TestContext::new().await;
    ctx.signed_in("shopper@example.com", Role::Customer).await;
    let pan = ctx.product("Pan", "22.50").await;
    ctx.state.cart().add_to_cart(pan, None, 1).await.unwrap();

    ctx.state.auth().sign_out().await.unwrap();
    settle().await;
    let mut cart = ctx.state.cart();
    cart.fetch_cart().await.unwrap();

    assert!(cart.items().is_empty());
    assert_eq!(cart.cart_total(), Amount::ZERO);
    assert_eq!(ctx.backend.rows(tables::CART_ITEMS).await.len(), 1);
}
