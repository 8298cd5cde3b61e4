//! Public catalog commands.
//!
//! # Usage
//!
//! ```bash
//! am-cli products --search mug --category Kitchen --sort price
//! am-cli products --sort name --asc
//! am-cli categories
//! am-cli reviews <product-id>
//! ```

use clap::Args;
use tracing::info;

use apartmart_core::ProductId;
use apartmart_storefront::AppState;
use apartmart_storefront::services::customer;
use apartmart_storefront::stores::{SortField, SortOrder};

use super::{CliError, parse_arg};

#[derive(Args)]
pub struct ProductsArgs {
    /// Case-insensitive match against name and description
    #[arg(short, long)]
    search: Option<String>,

    /// Category name or id
    #[arg(short, long)]
    category: Option<String>,

    /// Sort by `name`, `price` or `created_at`
    #[arg(long, default_value = "created_at")]
    sort: SortField,

    /// Sort ascending instead of descending
    #[arg(long)]
    asc: bool,
}

/// List active products through the product store's filtered view.
///
/// # Errors
///
/// Returns an error for an unknown category or a failed fetch.
pub async fn products(state: &AppState, args: &ProductsArgs) -> Result<(), CliError> {
    let mut store = state.products();
    store.fetch_products().await?;

    if let Some(wanted) = &args.category {
        store.fetch_categories().await?;
        let category = store
            .categories()
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(wanted) || c.id.to_string() == *wanted)
            .map(|c| c.id)
            .ok_or_else(|| CliError::InvalidArgument {
                name: "category",
                reason: format!("no active category named {wanted}"),
            })?;
        store.set_selected_category(Some(category));
    }
    if let Some(term) = &args.search {
        store.set_search_term(term.as_str());
    }
    let order = if args.asc { SortOrder::Asc } else { SortOrder::Desc };
    store.set_sorting(args.sort, order);

    let shown = store.filtered_products();
    for product in &shown {
        info!(
            id = %product.id,
            price = %product.price,
            category = product.category.as_ref().map_or("-", |c| c.name.as_str()),
            in_stock = product.in_stock(),
            "{}",
            product.name
        );
    }
    info!(shown = shown.len(), total = store.products().len(), "Products listed");
    Ok(())
}

/// List active categories by name.
///
/// # Errors
///
/// Returns the fetch error.
pub async fn categories(state: &AppState) -> Result<(), CliError> {
    let mut store = state.products();
    store.fetch_categories().await?;
    for category in store.categories() {
        info!(id = %category.id, "{}", category.name);
    }
    Ok(())
}

/// List reviews for a product.
///
/// # Errors
///
/// Returns an error for a malformed id or a failed fetch.
pub async fn reviews(state: &AppState, product_id: &str) -> Result<(), CliError> {
    let product_id: ProductId = parse_arg("product id", product_id)?;
    let reviews = customer::product_reviews(state.backend().as_ref(), product_id).await?;
    for review in &reviews {
        let reviewer = review
            .profile
            .as_ref()
            .and_then(|p| p.full_name.as_deref().or(p.username.as_deref()))
            .unwrap_or("anonymous");
        info!(
            rating = review.rating,
            reviewer,
            verified = review.is_verified_purchase,
            "{}",
            review.title.as_deref().unwrap_or_default()
        );
    }
    info!(count = reviews.len(), "Reviews listed");
    Ok(())
}
