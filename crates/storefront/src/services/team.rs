//! Team views: the catalog dashboard, the product editor and image uploads.

use std::path::Path;
use std::sync::Arc;

use tracing::{error, info, instrument};
use uuid::Uuid;

use apartmart_core::validation::ProductForm;
use apartmart_core::{OrderStatus, ProductId, UserId};

use super::admin::RECENT_LIMIT;
use crate::backend::{Backend, BackendError, Embed, Query};
use crate::models::{NewProductImage, Order, Product, ProductInput, ProductImage, tables};

/// Folder inside the image bucket that product images are stored under.
pub const PRODUCT_IMAGE_FOLDER: &str = "products";

/// Catalog and order-queue totals plus the newest products and orders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamDashboard {
    pub total_products: u64,
    pub active_products: u64,
    pub total_orders: u64,
    pub pending_orders: u64,
    /// Newest products with category and images.
    pub recent_products: Vec<Product>,
    /// Newest orders with the ordering profile's name and email.
    pub recent_orders: Vec<Order>,
}

/// A file picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl ImageUpload {
    /// Wrap file contents, deriving the content type from the extension.
    #[must_use]
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_owned();
        Self {
            file_name,
            bytes,
            content_type,
        }
    }

    fn extension(&self) -> Option<&str> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
    }
}

/// Content type for common image extensions, `application/octet-stream`
/// otherwise.
#[must_use]
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("avif") => "image/avif",
        _ => "application/octet-stream",
    }
}

/// Pre-fill the product editor from a stored product. Tags are joined
/// with `", "`.
#[must_use]
pub fn product_form(product: &Product) -> ProductForm {
    ProductForm {
        name: product.name.clone(),
        description: product.description.clone().unwrap_or_default(),
        price: product.price.amount().to_string(),
        inventory_count: product.inventory_count.to_string(),
        category_id: product
            .category_id
            .map(|id| id.to_string())
            .unwrap_or_default(),
        sku: product.sku.clone().unwrap_or_default(),
        weight: product.weight.map(|w| w.to_string()).unwrap_or_default(),
        dimensions: product.dimensions.clone().unwrap_or_default(),
        tags: product.tags.as_ref().map(|t| t.join(", ")).unwrap_or_default(),
        is_active: product.is_active,
    }
}

/// Team-facing catalog operations.
#[derive(Clone)]
pub struct TeamService {
    backend: Arc<dyn Backend>,
    image_bucket: String,
}

impl TeamService {
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>, image_bucket: impl Into<String>) -> Self {
        Self {
            backend,
            image_bucket: image_bucket.into(),
        }
    }

    /// Load the team dashboard. The six reads run concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first backend error.
    #[instrument(skip(self))]
    pub async fn dashboard(&self) -> Result<TeamDashboard, BackendError> {
        let backend = self.backend.as_ref();
        let everything = Query::new();
        let active = Query::new().eq("is_active", true);
        let pending = Query::new().eq("status", OrderStatus::Pending);
        let newest = Query::new().order("created_at", false).limit(RECENT_LIMIT);
        let newest_products = newest
            .clone()
            .embed(Embed::one("category", tables::CATEGORIES, "category_id"))
            .embed(Embed::many("images", tables::PRODUCT_IMAGES, "product_id"));
        let newest_orders = newest.embed(Embed::one("profile", tables::PROFILES, "user_id"));

        let result = tokio::try_join!(
            backend.count(tables::PRODUCTS, &everything),
            backend.count(tables::PRODUCTS, &active),
            backend.count(tables::ORDERS, &everything),
            backend.count(tables::ORDERS, &pending),
            backend.fetch::<Product>(tables::PRODUCTS, &newest_products),
            backend.fetch::<Order>(tables::ORDERS, &newest_orders),
        );

        match result {
            Ok((
                total_products,
                active_products,
                total_orders,
                pending_orders,
                recent_products,
                recent_orders,
            )) => Ok(TeamDashboard {
                total_products,
                active_products,
                total_orders,
                pending_orders,
                recent_products,
                recent_orders,
            }),
            Err(e) => {
                error!(error = %e, "Error fetching team dashboard data");
                Err(e)
            }
        }
    }

    /// A product with its images in display order, for editing.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if no product has that id.
    #[instrument(skip(self))]
    pub async fn load_product(&self, id: ProductId) -> Result<Product, BackendError> {
        let mut product: Product = self
            .backend
            .fetch_single(
                tables::PRODUCTS,
                &Query::new()
                    .embed(Embed::many("images", tables::PRODUCT_IMAGES, "product_id"))
                    .eq("id", id),
            )
            .await
            .inspect_err(|e| error!(product_id = %id, error = %e, "Error fetching product"))?;
        product.images.sort_by_key(|image| image.sort_order);
        Ok(product)
    }

    /// Create a product, or update `editing` in place.
    ///
    /// A non-empty `image_urls` replaces the product's images: an edit first
    /// deletes the existing image rows, then the urls are stored in order
    /// with the first one primary. An empty list leaves images untouched.
    /// `created_by` is recorded on insert only.
    ///
    /// # Errors
    ///
    /// Returns the backend error of the first failing write. Earlier
    /// writes are not rolled back.
    #[instrument(skip(self, input, image_urls), fields(name = %input.name))]
    pub async fn save_product(
        &self,
        editing: Option<ProductId>,
        input: ProductInput,
        image_urls: &[String],
        created_by: UserId,
    ) -> Result<ProductId, BackendError> {
        let result = self
            .write_product(editing, input, image_urls, created_by)
            .await;
        match &result {
            Ok(id) => info!(product_id = %id, edited = editing.is_some(), "Product saved"),
            Err(e) => error!(error = %e, "Error saving product"),
        }
        result
    }

    async fn write_product(
        &self,
        editing: Option<ProductId>,
        input: ProductInput,
        image_urls: &[String],
        created_by: UserId,
    ) -> Result<ProductId, BackendError> {
        let backend = self.backend.as_ref();

        let product_id = match editing {
            Some(id) => {
                let updated: Vec<Product> = backend
                    .update_rows(
                        tables::PRODUCTS,
                        &Query::new().eq("id", id),
                        &ProductInput {
                            created_by: None,
                            ..input
                        },
                    )
                    .await?;
                if updated.is_empty() {
                    return Err(BackendError::NotFound(tables::PRODUCTS.to_owned()));
                }
                id
            }
            None => {
                let created: Product = backend
                    .insert_one(
                        tables::PRODUCTS,
                        &ProductInput {
                            created_by: Some(created_by),
                            ..input
                        },
                    )
                    .await?;
                created.id
            }
        };

        if image_urls.is_empty() {
            return Ok(product_id);
        }

        if editing.is_some() {
            backend
                .delete(
                    tables::PRODUCT_IMAGES,
                    &Query::new().eq("product_id", product_id),
                )
                .await?;
        }

        let rows: Vec<NewProductImage> = image_urls
            .iter()
            .zip(0..)
            .map(|(url, index)| NewProductImage {
                product_id,
                image_url: url.clone(),
                alt_text: None,
                is_primary: index == 0,
                sort_order: index,
            })
            .collect();
        backend
            .insert_many::<_, ProductImage>(tables::PRODUCT_IMAGES, &rows)
            .await?;

        Ok(product_id)
    }

    /// Upload files to the image bucket under
    /// `products/<random>.<extension>` and return their public urls in
    /// input order.
    ///
    /// # Errors
    ///
    /// Returns the first upload error. Files uploaded before it stay in the
    /// bucket.
    #[instrument(skip(self, files), fields(count = files.len()))]
    pub async fn upload_images(&self, files: Vec<ImageUpload>) -> Result<Vec<String>, BackendError> {
        let mut urls = Vec::with_capacity(files.len());
        for file in files {
            let name = Uuid::new_v4().simple().to_string();
            let path = match file.extension() {
                Some(ext) => format!("{PRODUCT_IMAGE_FOLDER}/{name}.{ext}"),
                None => format!("{PRODUCT_IMAGE_FOLDER}/{name}"),
            };

            if let Err(e) = self
                .backend
                .upload(&self.image_bucket, &path, file.bytes, &file.content_type)
                .await
            {
                error!(file = %file.file_name, error = %e, "Error uploading images");
                return Err(e);
            }
            urls.push(self.backend.public_url(&self.image_bucket, &path));
        }
        Ok(urls)
    }
}
