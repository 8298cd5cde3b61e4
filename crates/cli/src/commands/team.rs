//! Team commands: dashboard, product editor and image uploads.
//!
//! # Usage
//!
//! ```bash
//! am-cli team dashboard
//! am-cli team upload ./mug-front.jpg ./mug-side.png
//! am-cli team save-product --name "Tea Mug" --price 12.50 --inventory 40 \
//!     --tags "kitchen, ceramic" --image https://.../products/ab12.jpg
//! am-cli team save-product --id <product-id> --price 11.00 --inventory 38
//! ```
//!
//! Editing starts from the stored product, so only the flags given change.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use tracing::info;

use apartmart_core::ProductId;
use apartmart_core::validation::ProductForm;
use apartmart_storefront::AppState;
use apartmart_storefront::models::ProductInput;
use apartmart_storefront::routes::Route;
use apartmart_storefront::services::ImageUpload;
use apartmart_storefront::services::team::product_form;

use super::{CliError, Credentials, parse_arg, sign_in_for};

#[derive(Subcommand)]
pub enum TeamAction {
    /// Catalog and order-queue totals
    Dashboard,
    /// Create a product, or edit one with `--id`
    SaveProduct(SaveProductArgs),
    /// Upload image files and print their public urls
    Upload {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Args)]
pub struct SaveProductArgs {
    /// Product to edit
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    price: Option<String>,
    #[arg(long)]
    inventory: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    sku: Option<String>,
    #[arg(long)]
    weight: Option<String>,
    #[arg(long)]
    dimensions: Option<String>,
    /// Comma-separated
    #[arg(long)]
    tags: Option<String>,
    /// Hide the product from the catalog
    #[arg(long)]
    inactive: bool,
    /// Image url; repeat for more. The first is the primary image.
    #[arg(long = "image")]
    images: Vec<String>,
}

/// Run a team action.
///
/// # Errors
///
/// Returns the sign-in, guard, argument, validation, file or backend error.
pub async fn run(state: &AppState, credentials: &Credentials, action: TeamAction) -> Result<(), CliError> {
    let profile = sign_in_for(state, credentials, Route::Team).await?;
    let team = state.team();

    match action {
        TeamAction::Dashboard => {
            let dashboard = team.dashboard().await?;
            info!(
                products = dashboard.total_products,
                active = dashboard.active_products,
                orders = dashboard.total_orders,
                pending = dashboard.pending_orders,
                "Dashboard"
            );
            for product in &dashboard.recent_products {
                info!(id = %product.id, price = %product.price, active = product.is_active, "{}", product.name);
            }
            for order in &dashboard.recent_orders {
                info!(id = %order.id, status = %order.status, total = %order.total_amount, "Recent order");
            }
        }
        TeamAction::SaveProduct(args) => {
            let editing: Option<ProductId> = args
                .id
                .as_deref()
                .map(|raw| parse_arg("product id", raw))
                .transpose()?;
            let mut form = match editing {
                Some(id) => product_form(&team.load_product(id).await?),
                None => ProductForm {
                    is_active: true,
                    ..ProductForm::default()
                },
            };
            apply(&mut form, &args);

            let input = ProductInput::from(form.parse()?);
            let id = team
                .save_product(editing, input, &args.images, profile.id)
                .await?;
            info!(product_id = %id, images = args.images.len(), "Product saved");
        }
        TeamAction::Upload { files } => {
            let mut uploads = Vec::with_capacity(files.len());
            for path in files {
                let bytes = tokio::fs::read(&path).await.map_err(|source| CliError::ReadFile {
                    path: path.display().to_string(),
                    source,
                })?;
                let file_name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                uploads.push(ImageUpload::new(file_name, bytes));
            }
            for url in team.upload_images(uploads).await? {
                info!(%url, "Uploaded");
            }
        }
    }
    Ok(())
}

fn apply(form: &mut ProductForm, args: &SaveProductArgs) {
    let fields = [
        (&mut form.name, &args.name),
        (&mut form.description, &args.description),
        (&mut form.price, &args.price),
        (&mut form.inventory_count, &args.inventory),
        (&mut form.category_id, &args.category),
        (&mut form.sku, &args.sku),
        (&mut form.weight, &args.weight),
        (&mut form.dimensions, &args.dimensions),
        (&mut form.tags, &args.tags),
    ];
    for (field, value) in fields {
        if let Some(value) = value {
            field.clone_from(value);
        }
    }
    if args.inactive {
        form.is_active = false;
    }
}
