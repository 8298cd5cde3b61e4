//! Catalog listing state and the derived filtered/sorted view.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, instrument};

use apartmart_core::CategoryId;

use super::StoreError;
use crate::backend::{Backend, Embed, Query};
use crate::models::{Category, Product, tables};

/// Column the product view is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    Name,
    Price,
    #[default]
    CreatedAt,
}

impl SortField {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Price => "price",
            Self::CreatedAt => "created_at",
        }
    }

    fn compare(self, a: &Product, b: &Product) -> Ordering {
        match self {
            Self::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            Self::Price => a.price.cmp(&b.price),
            Self::CreatedAt => a.created_at.cmp(&b.created_at),
        }
    }
}

impl fmt::Display for SortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown sort field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sort field: {0} (expected name, price or created_at)")]
pub struct SortFieldParseError(pub String);

impl FromStr for SortField {
    type Err = SortFieldParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "price" => Ok(Self::Price),
            "created_at" => Ok(Self::CreatedAt),
            other => Err(SortFieldParseError(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Catalog rows plus local search/category/sort criteria.
pub struct ProductStore {
    backend: Arc<dyn Backend>,
    products: Vec<Product>,
    categories: Vec<Category>,
    loading: bool,
    search_term: String,
    selected_category: Option<CategoryId>,
    sort_by: SortField,
    sort_order: SortOrder,
}

impl ProductStore {
    /// Empty store sorted newest first.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            products: Vec::new(),
            categories: Vec::new(),
            loading: false,
            search_term: String::new(),
            selected_category: None,
            sort_by: SortField::default(),
            sort_order: SortOrder::default(),
        }
    }

    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    #[must_use]
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    #[must_use]
    pub const fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    #[must_use]
    pub const fn selected_category(&self) -> Option<CategoryId> {
        self.selected_category
    }

    #[must_use]
    pub const fn sorting(&self) -> (SortField, SortOrder) {
        (self.sort_by, self.sort_order)
    }

    /// Load active products with category and images, newest first.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the previous list is kept.
    #[instrument(skip(self))]
    pub async fn fetch_products(&mut self) -> Result<(), StoreError> {
        self.loading = true;
        let result = self
            .backend
            .fetch::<Product>(
                tables::PRODUCTS,
                &Query::new()
                    .embed(Embed::one("category", tables::CATEGORIES, "category_id"))
                    .embed(Embed::many("images", tables::PRODUCT_IMAGES, "product_id"))
                    .eq("is_active", true)
                    .order("created_at", false),
            )
            .await;
        self.loading = false;

        match result {
            Ok(products) => {
                self.products = products;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Error fetching products");
                Err(e.into())
            }
        }
    }

    /// Load active categories ordered by name.
    ///
    /// # Errors
    ///
    /// Returns the backend error; the previous list is kept.
    #[instrument(skip(self))]
    pub async fn fetch_categories(&mut self) -> Result<(), StoreError> {
        match self
            .backend
            .fetch::<Category>(
                tables::CATEGORIES,
                &Query::new().eq("is_active", true).order("name", true),
            )
            .await
        {
            Ok(categories) => {
                self.categories = categories;
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Error fetching categories");
                Err(e.into())
            }
        }
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    pub const fn set_selected_category(&mut self, category: Option<CategoryId>) {
        self.selected_category = category;
    }

    pub const fn set_sorting(&mut self, field: SortField, order: SortOrder) {
        self.sort_by = field;
        self.sort_order = order;
    }

    /// Products matching the search term (case-insensitive, name or
    /// description) and selected category, stably sorted by the chosen
    /// field. Recomputed on every call.
    #[must_use]
    pub fn filtered_products(&self) -> Vec<&Product> {
        let term = self.search_term.to_lowercase();
        let mut filtered: Vec<&Product> = self
            .products
            .iter()
            .filter(|p| {
                term.is_empty()
                    || p.name.to_lowercase().contains(&term)
                    || p.description
                        .as_deref()
                        .is_some_and(|d| d.to_lowercase().contains(&term))
            })
            .filter(|p| {
                self.selected_category
                    .is_none_or(|category| p.category_id == Some(category))
            })
            .collect();

        let field = self.sort_by;
        match self.sort_order {
            SortOrder::Asc => filtered.sort_by(|a, b| field.compare(a, b)),
            SortOrder::Desc => filtered.sort_by(|a, b| field.compare(b, a)),
        }
        filtered
    }
}
