//! Categories, products, images and variants.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use apartmart_core::validation::ProductDraft;
use apartmart_core::{CategoryId, Price, ProductId, ProductImageId, UserId, VariantId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub parent_id: Option<CategoryId>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// A catalog product with whichever relations the query embedded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub category_id: Option<CategoryId>,
    pub inventory_count: i32,
    pub sku: Option<String>,
    pub is_active: bool,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    pub tags: Option<Vec<String>>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ProductImage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<ProductVariant>,
}

impl Product {
    /// Image urls in display order.
    #[must_use]
    pub fn image_urls(&self) -> Vec<&str> {
        let mut images: Vec<&ProductImage> = self.images.iter().collect();
        images.sort_by_key(|i| i.sort_order);
        images.into_iter().map(|i| i.image_url.as_str()).collect()
    }

    /// The primary image, falling back to the first by sort order.
    #[must_use]
    pub fn primary_image(&self) -> Option<&ProductImage> {
        self.images
            .iter()
            .find(|i| i.is_primary)
            .or_else(|| self.images.iter().min_by_key(|i| i.sort_order))
    }

    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.inventory_count > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: ProductImageId,
    pub product_id: ProductId,
    pub image_url: String,
    pub alt_text: Option<String>,
    pub is_primary: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// A purchasable sub-option (size, color, ...) of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub name: String,
    pub value: String,
    /// May be negative.
    #[serde(default, with = "rust_decimal::serde::float")]
    pub price_adjustment: Decimal,
    pub inventory_count: i32,
    pub created_at: DateTime<Utc>,
}

/// Product insert/update payload written by team members.
///
/// `created_by` is only sent on insert; every other optional column is
/// written as `null` when unset so that edits can clear it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductInput {
    pub name: String,
    pub description: Option<String>,
    pub price: Price,
    pub category_id: Option<CategoryId>,
    pub inventory_count: i32,
    pub sku: Option<String>,
    pub is_active: bool,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub weight: Option<Decimal>,
    pub dimensions: Option<String>,
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
}

impl From<ProductDraft> for ProductInput {
    fn from(draft: ProductDraft) -> Self {
        Self {
            name: draft.name,
            description: draft.description,
            price: draft.price,
            category_id: draft.category_id,
            inventory_count: draft.inventory_count,
            sku: draft.sku,
            is_active: draft.is_active,
            weight: draft.weight,
            dimensions: draft.dimensions,
            tags: draft.tags,
            created_by: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewProductImage {
    pub product_id: ProductId,
    pub image_url: String,
    pub alt_text: Option<String>,
    pub is_primary: bool,
    pub sort_order: i32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    const PRODUCT_ID: &str = "2f7b6c1a-8d4e-4f3a-9b2c-1e0d5a6b7c8d";

    fn image(id: &str, sort_order: i32, is_primary: bool) -> serde_json::Value {
        json!({
            "id": id,
            "product_id": PRODUCT_ID,
            "image_url": format!("https://cdn.example.com/{sort_order}.png"),
            "alt_text": null,
            "is_primary": is_primary,
            "sort_order": sort_order,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_decode_with_embeds() {
        let product: Product = serde_json::from_value(json!({
            "id": PRODUCT_ID,
            "name": "Green Tea",
            "description": null,
            "price": 12.5,
            "category_id": null,
            "inventory_count": 4,
            "sku": "TEA-01",
            "is_active": true,
            "weight": 0.25,
            "dimensions": null,
            "tags": ["tea", "organic"],
            "created_by": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "category": null,
            "images": [
                image("0a6c2e1d-1111-4a2b-8c3d-4e5f6a7b8c9d", 1, false),
                image("0a6c2e1d-2222-4a2b-8c3d-4e5f6a7b8c9d", 0, true)
            ]
        }))
        .unwrap();

        assert_eq!(product.price, Price::from_cents(1250));
        assert_eq!(product.weight, Some(Decimal::new(25, 2)));
        assert!(product.variants.is_empty());
        assert_eq!(
            product.image_urls(),
            vec!["https://cdn.example.com/0.png", "https://cdn.example.com/1.png"]
        );
        assert_eq!(product.primary_image().unwrap().sort_order, 0);
    }

    #[test]
    fn test_negative_variant_adjustment() {
        let variant: ProductVariant = serde_json::from_value(json!({
            "id": "9c8b7a6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d",
            "product_id": PRODUCT_ID,
            "name": "Size",
            "value": "Small",
            "price_adjustment": -1.5,
            "inventory_count": 3,
            "created_at": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        assert_eq!(variant.price_adjustment, Decimal::new(-15, 1));
    }

    #[test]
    fn test_input_writes_nulls_but_omits_creator() {
        let input = ProductInput {
            name: "Soap".to_owned(),
            description: None,
            price: Price::from_cents(300),
            category_id: None,
            inventory_count: 0,
            sku: None,
            is_active: false,
            weight: None,
            dimensions: None,
            tags: None,
            created_by: None,
        };
        let value = serde_json::to_value(&input).unwrap();
        assert!(value["description"].is_null());
        assert!(value.get("created_by").is_none());
        assert_eq!(value["price"], json!(3.0));
    }
}
