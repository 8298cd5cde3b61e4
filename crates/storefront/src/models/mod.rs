//! Typed rows for every backend table.
//!
//! Read types mirror the stored row plus any embedded relations (absent
//! embeds decode as `None` or empty). Insert and patch payloads are separate
//! types so that server-assigned columns are never sent.

mod cart;
mod catalog;
mod engagement;
mod order;
mod profile;

pub use cart::{CartItem, NewCartItem, QuantityUpdate};
pub use catalog::{Category, NewProductImage, Product, ProductImage, ProductInput, ProductVariant};
pub use engagement::{Review, WishlistItem};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem};
pub use profile::{NewProfile, Profile, ProfileSummary, ProfileUpdate, RoleUpdate};

/// Backend table names.
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const CATEGORIES: &str = "categories";
    pub const PRODUCTS: &str = "products";
    pub const PRODUCT_IMAGES: &str = "product_images";
    pub const PRODUCT_VARIANTS: &str = "product_variants";
    pub const CART_ITEMS: &str = "cart_items";
    pub const ORDERS: &str = "orders";
    pub const ORDER_ITEMS: &str = "order_items";
    pub const REVIEWS: &str = "reviews";
    pub const WISHLIST_ITEMS: &str = "wishlist_items";
}
