//! Integration tests for ApartMart.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p apartmart-integration-tests
//! ```
//!
//! Every test runs the storefront against an in-process `MemoryBackend`,
//! except `hosted_backend`, which points the real HTTP client at a mock
//! server.
//!
//! # Test Categories
//!
//! - `cart` - Cart totals, merging and removal
//! - `catalog` - Product filtering and sorting
//! - `access` - Route guard decisions across sign-in and sign-out
//! - `bootstrap` - Bootstrap administrator provisioning
//! - `checkout` - Order placement and its partial failures
//! - `back_office` - Team product editor and administrator user management

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::{Value, json};

use apartmart_core::{CategoryId, ProductId, Role, UserId, VariantId};
use apartmart_storefront::AppState;
use apartmart_storefront::backend::{MEMORY_BASE_URL, MemoryBackend};
use apartmart_storefront::config::StorefrontConfig;
use apartmart_storefront::models::tables;

/// Password given to every seeded user.
pub const PASSWORD: &str = "Engine1";

/// A storefront wired to a fresh in-memory backend.
pub struct TestContext {
    pub backend: MemoryBackend,
    pub state: AppState,
}

impl TestContext {
    /// Bootstrap administrator disabled.
    pub async fn new() -> Self {
        Self::with_env(&[]).await
    }

    /// Extra configuration variables on top of the backend location.
    pub async fn with_env(vars: &[(&str, &str)]) -> Self {
        let config = StorefrontConfig::from_lookup(|key| match key {
            "SUPABASE_URL" => Some(MEMORY_BASE_URL.to_owned()),
            "SUPABASE_ANON_KEY" => Some("anon".to_owned()),
            other => vars
                .iter()
                .find(|(name, _)| *name == other)
                .map(|(_, value)| (*value).to_owned()),
        })
        .unwrap();

        let backend = MemoryBackend::new();
        let state = AppState::with_backend(config, Arc::new(backend.clone()));
        state.auth().initialize().await;
        Self { backend, state }
    }

    /// Register `email` with a profile of `role`, without signing in.
    pub async fn user(&self, email: &str, role: Role) -> UserId {
        let id = self.backend.create_identity(email, PASSWORD).await.unwrap();
        self.backend
            .seed(
                tables::PROFILES,
                vec![json!({
                    "id": id,
                    "email": email,
                    "full_name": format!("Test {role}"),
                    "username": email.split('@').next().unwrap(),
                    "role": role,
                })],
            )
            .await
            .unwrap();
        id
    }

    /// Register `email` with `role` and sign in as it.
    pub async fn signed_in(&self, email: &str, role: Role) -> UserId {
        let id = self.user(email, role).await;
        self.state.auth().sign_in(email, PASSWORD).await.unwrap();
        settle().await;
        id
    }

    pub async fn category(&self, name: &str) -> CategoryId {
        let rows = self
            .backend
            .seed(
                tables::CATEGORIES,
                vec![json!({ "name": name, "is_active": true })],
            )
            .await
            .unwrap();
        id_of(&rows[0])
    }

    /// An active product priced at `price` (e.g. `"10.00"`).
    pub async fn product(&self, name: &str, price: &str) -> ProductId {
        self.product_row(json!({ "name": name, "price": amount(price) }))
            .await
    }

    pub async fn product_in(&self, name: &str, price: &str, category: CategoryId) -> ProductId {
        self.product_row(json!({
            "name": name,
            "price": amount(price),
            "category_id": category,
        }))
        .await
    }

    pub async fn described_product(&self, name: &str, price: &str, description: &str) -> ProductId {
        self.product_row(json!({
            "name": name,
            "price": amount(price),
            "description": description,
        }))
        .await
    }

    pub async fn inactive_product(&self, name: &str, price: &str) -> ProductId {
        self.product_row(json!({ "name": name, "price": amount(price), "is_active": false }))
            .await
    }

    async fn product_row(&self, mut row: Value) -> ProductId {
        let fields = row.as_object_mut().unwrap();
        fields.entry("inventory_count").or_insert(json!(10));
        fields.entry("is_active").or_insert(json!(true));
        let rows = self.backend.seed(tables::PRODUCTS, vec![row]).await.unwrap();
        id_of(&rows[0])
    }

    /// A variant adjusting its product's price by `adjustment`.
    pub async fn variant(&self, product: ProductId, adjustment: &str) -> VariantId {
        let rows = self
            .backend
            .seed(
                tables::PRODUCT_VARIANTS,
                vec![json!({
                    "product_id": product,
                    "name": "Size",
                    "value": "Large",
                    "price_adjustment": amount(adjustment),
                    "inventory_count": 5,
                })],
            )
            .await
            .unwrap();
        id_of(&rows[0])
    }
}

/// Let the session listener catch up with queued auth events.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// A decimal literal.
pub fn dec(raw: &str) -> Decimal {
    raw.parse().unwrap()
}

/// Prices travel as JSON numbers.
fn amount(raw: &str) -> Value {
    json!(dec(raw).to_string().parse::<f64>().unwrap())
}

fn id_of<T>(row: &Value) -> T
where
    T: std::str::FromStr,
    T::Err: std::fmt::Debug,
{
    row["id"].as_str().unwrap().parse().unwrap()
}
