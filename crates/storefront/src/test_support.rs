//! Seed helpers shared by unit tests.

#![allow(clippy::unwrap_used)]

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value, json};

use apartmart_core::{CategoryId, Price, ProductId, Role, UserId, VariantId};

use crate::backend::{Backend, MemoryBackend};
use crate::models::tables;

pub const PASSWORD: &str = "Secret1";

fn id_of<T: FromStr>(row: &Value) -> T
where
    T::Err: std::fmt::Debug,
{
    row["id"].as_str().unwrap().parse().unwrap()
}

fn price(raw: &str) -> Value {
    serde_json::to_value(Price::new(Decimal::from_str(raw).unwrap()).unwrap()).unwrap()
}

/// Sign up `email` (leaving the session active) and store its profile.
pub async fn signed_in_user(backend: &MemoryBackend, email: &str, role: Role) -> UserId {
    let created = backend.sign_up(email, PASSWORD).await.unwrap();
    backend
        .seed(
            tables::PROFILES,
            vec![json!({
                "id": created.user.id,
                "email": email,
                "full_name": format!("{role} user"),
                "role": role,
            })],
        )
        .await
        .unwrap();
    created.user.id
}

async fn insert_product(backend: &MemoryBackend, row: Value) -> ProductId {
    let rows = backend.seed(tables::PRODUCTS, vec![row]).await.unwrap();
    id_of(&rows[0])
}

pub async fn seed_product(backend: &MemoryBackend, name: &str, amount: &str) -> ProductId {
    insert_product(
        backend,
        json!({ "name": name, "price": price(amount), "inventory_count": 10, "is_active": true }),
    )
    .await
}

pub async fn seed_inactive_product(backend: &MemoryBackend, name: &str, amount: &str) -> ProductId {
    insert_product(
        backend,
        json!({ "name": name, "price": price(amount), "inventory_count": 10, "is_active": false }),
    )
    .await
}

pub async fn seed_product_with_description(
    backend: &MemoryBackend,
    name: &str,
    amount: &str,
    description: &str,
) -> ProductId {
    insert_product(
        backend,
        json!({
            "name": name,
            "description": description,
            "price": price(amount),
            "inventory_count": 10,
            "is_active": true
        }),
    )
    .await
}

pub async fn seed_product_in(
    backend: &MemoryBackend,
    name: &str,
    amount: &str,
    category: CategoryId,
) -> ProductId {
    insert_product(
        backend,
        json!({
            "name": name,
            "price": price(amount),
            "category_id": category,
            "inventory_count": 10,
            "is_active": true
        }),
    )
    .await
}

pub async fn seed_category(backend: &MemoryBackend, name: &str) -> CategoryId {
    let rows = backend
        .seed(
            tables::CATEGORIES,
            vec![json!({ "name": name, "is_active": true })],
        )
        .await
        .unwrap();
    id_of(&rows[0])
}

pub async fn seed_variant(backend: &MemoryBackend, product: ProductId, adjustment: &str) -> VariantId {
    let adjustment = Decimal::from_str(adjustment).unwrap();
    let rows = backend
        .seed(
            tables::PRODUCT_VARIANTS,
            vec![json!({
                "product_id": product,
                "name": "Size",
                "value": "Large",
                "price_adjustment": adjustment.to_f64(),
                "inventory_count": 5
            })],
        )
        .await
        .unwrap();
    id_of(&rows[0])
}
