//! The storefront against a mock of the hosted backend's HTTP API.

#![allow(clippy::unwrap_used)]

use httpmock::prelude::*;
use serde_json::json;

use apartmart_core::Role;
use apartmart_storefront::AppState;
use apartmart_storefront::config::StorefrontConfig;
use apartmart_storefront::guard::GuardDecision;
use apartmart_storefront::routes::Route;

const ANON_KEY: &str = "anon-integration-key";
const USER_ID: &str = "5d0c8e1a-7b2f-4c3d-9e8f-1a2b3c4d5e6f";

fn state(server: &MockServer) -> AppState {
    let base_url = server.base_url();
    let config = StorefrontConfig::from_lookup(|key| match key {
        "SUPABASE_URL" => Some(base_url.clone()),
        "SUPABASE_ANON_KEY" => Some(ANON_KEY.to_owned()),
        _ => None,
    })
    .unwrap();
    AppState::new(config).unwrap()
}

fn product(id: &str, name: &str, price: f64) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "description": null,
        "price": price,
        "category_id": null,
        "inventory_count": 4,
        "sku": null,
        "is_active": true,
        "weight": null,
        "dimensions": null,
        "tags": null,
        "created_by": null,
        "created_at": "2024-05-01T10:00:00Z",
        "updated_at": "2024-05-01T10:00:00Z",
        "category": null,
        "images": []
    })
}

#[tokio::test]
async fn test_catalog_is_read_with_anon_key() {
    let server = MockServer::start_async().await;
    let products = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/products")
                .query_param("is_active", "eq.true")
                .header("apikey", ANON_KEY);
            then.status(200).json_body(json!([
                product("0f0e0d0c-0b0a-4909-8807-060504030201", "Desk Lamp", 27.5),
                product("1f1e1d1c-1b1a-4919-8817-161514131211", "Tea Kettle", 34.0),
            ]));
        })
        .await;

    let mut store = state(&server).products();
    store.fetch_products().await.unwrap();
    store.set_search_term("LAMP");

    products.assert_async().await;
    let names: Vec<&str> = store.filtered_products().iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Desk Lamp"]);
}

#[tokio::test]
async fn test_sign_in_loads_profile_and_opens_team_routes() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/auth/v1/token")
                .query_param("grant_type", "password");
            then.status(200).json_body(json!({
                "access_token": "team-access-token",
                "token_type": "bearer",
                "expires_in": 3600,
                "refresh_token": "team-refresh-token",
                "user": { "id": USER_ID, "email": "staff@example.com" }
            }));
        })
        .await;
    let profile = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/rest/v1/profiles")
                .query_param("id", format!("eq.{USER_ID}"))
                .header("Authorization", "Bearer team-access-token");
            then.status(200).json_body(json!([{
                "id": USER_ID,
                "email": "staff@example.com",
                "username": "staff",
                "full_name": "Staff Member",
                "role": "team",
                "avatar_url": null,
                "phone": null,
                "address": null,
                "city": null,
                "country": null,
                "created_at": "2024-05-01T10:00:00Z",
                "updated_at": "2024-05-01T10:00:00Z"
            }]));
        })
        .await;

    let state = state(&server);
    state.auth().sign_in("staff@example.com", "Engine1").await.unwrap();

    profile.assert_async().await;
    let snapshot = state.auth().snapshot();
    assert_eq!(snapshot.role(), Some(Role::Team));
    assert_eq!(Route::guard(&snapshot, "/team").1, GuardDecision::Allow);
    assert_eq!(Route::guard(&snapshot, "/admin").1, GuardDecision::RedirectHome);
}

#[tokio::test]
async fn test_rejected_sign_in_keeps_visitor_state() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/auth/v1/token");
            then.status(400).json_body(json!({
                "code": 400,
                "error_code": "invalid_credentials",
                "msg": "Invalid login credentials"
            }));
        })
        .await;

    let state = state(&server);
    let err = state
        .auth()
        .sign_in("staff@example.com", "wrong")
        .await
        .unwrap_err();

    assert!(err.is_invalid_credentials());
    assert!(!state.auth().snapshot().is_authenticated());
}
