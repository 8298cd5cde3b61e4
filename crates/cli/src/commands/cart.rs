//! Cart and checkout commands.
//!
//! # Usage
//!
//! ```bash
//! am-cli cart show
//! am-cli cart add <product-id> --variant <variant-id> -q 2
//! am-cli cart update <item-id> 3
//! am-cli cart remove <item-id>
//! am-cli checkout --card-number 4242424242424242 --expiry-date 12/29 --cvv 123 \
//!     --card-name "Ada Lovelace"
//! ```
//!
//! Checkout pre-fills name, email, phone and address from the profile; any
//! flag given overrides the pre-filled value.

use clap::{Args, Subcommand};
use tracing::info;

use apartmart_core::{CartItemId, ProductId, VariantId};
use apartmart_storefront::AppState;
use apartmart_storefront::routes::Route;
use apartmart_storefront::services::checkout::{self, CheckoutSummary};
use apartmart_storefront::stores::{CartStore, DEFAULT_QUANTITY};

use super::{CliError, Credentials, parse_arg, sign_in_for};

#[derive(Subcommand)]
pub enum CartAction {
    /// Show cart lines and totals
    Show,
    /// Add a product, merging with an existing line
    Add {
        product_id: String,
        #[arg(long)]
        variant: Option<String>,
        #[arg(short, long, default_value_t = DEFAULT_QUANTITY)]
        quantity: u32,
    },
    /// Set a line's quantity; zero or less removes it
    Update {
        item_id: String,
        #[arg(allow_negative_numbers = true)]
        quantity: i32,
    },
    /// Remove a line
    Remove { item_id: String },
    /// Remove every line
    Clear,
}

#[derive(Args)]
pub struct CheckoutArgs {
    #[arg(long)]
    full_name: Option<String>,
    #[arg(long = "contact-email")]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    address: Option<String>,
    #[arg(long)]
    city: Option<String>,
    #[arg(long)]
    country: Option<String>,

    #[arg(long, default_value = "")]
    card_number: String,
    /// MM/YY
    #[arg(long, default_value = "")]
    expiry_date: String,
    #[arg(long, default_value = "")]
    cvv: String,
    #[arg(long, default_value = "")]
    card_name: String,

    /// Record billing separately from the shipping address
    #[arg(long)]
    separate_billing: bool,
}

/// Run a cart action for the signed-in customer, then print the cart.
///
/// # Errors
///
/// Returns the sign-in, guard, argument or store error.
pub async fn run(state: &AppState, credentials: &Credentials, action: CartAction) -> Result<(), CliError> {
    sign_in_for(state, credentials, Route::Cart).await?;
    let mut cart = state.cart();
    cart.fetch_cart().await?;

    match action {
        CartAction::Show => {}
        CartAction::Add {
            product_id,
            variant,
            quantity,
        } => {
            let product_id: ProductId = parse_arg("product id", &product_id)?;
            let variant_id: Option<VariantId> = variant
                .as_deref()
                .map(|raw| parse_arg("variant id", raw))
                .transpose()?;
            cart.add_to_cart(product_id, variant_id, quantity).await?;
            info!(product_id = %product_id, quantity, "Added to cart");
        }
        CartAction::Update { item_id, quantity } => {
            let item_id: CartItemId = parse_arg("cart item id", &item_id)?;
            cart.update_quantity(item_id, quantity).await?;
        }
        CartAction::Remove { item_id } => {
            let item_id: CartItemId = parse_arg("cart item id", &item_id)?;
            cart.remove_from_cart(item_id).await?;
        }
        CartAction::Clear => cart.clear_cart().await?,
    }

    print_cart(&cart);
    Ok(())
}

fn print_cart(cart: &CartStore) {
    for item in cart.items() {
        let name = item.product.as_ref().map_or("(product unavailable)", |p| p.name.as_str());
        info!(
            id = %item.id,
            quantity = item.quantity,
            unit = %item.unit_price(),
            line = %item.line_total(),
            variant = item.variant.as_ref().map(|v| v.name.as_str()),
            "{name}"
        );
    }
    info!(items = cart.cart_count(), total = %cart.cart_total(), "Cart");
}

/// Place an order for the signed-in customer's cart.
///
/// # Errors
///
/// Returns the sign-in, guard or checkout error.
pub async fn checkout(state: &AppState, credentials: &Credentials, args: CheckoutArgs) -> Result<(), CliError> {
    let profile = sign_in_for(state, credentials, Route::Checkout).await?;
    let mut cart = state.cart();
    cart.fetch_cart().await?;

    let mut form = checkout::prefill(&profile);
    let overrides = [
        (&mut form.full_name, args.full_name),
        (&mut form.email, args.email),
        (&mut form.phone, args.phone),
        (&mut form.address, args.address),
        (&mut form.city, args.city),
        (&mut form.country, args.country),
    ];
    for (field, value) in overrides {
        if let Some(value) = value {
            *field = value;
        }
    }
    form.card_number = args.card_number;
    form.expiry_date = args.expiry_date;
    form.cvv = args.cvv;
    form.card_name = args.card_name;
    form.billing_same_as_shipping = !args.separate_billing;

    let summary = CheckoutSummary::for_cart(&cart);
    info!(
        subtotal = %summary.subtotal,
        tax = %summary.tax,
        shipping = %summary.shipping,
        total = %summary.total,
        "Order summary"
    );

    let order = checkout::place_order(state.auth(), &mut cart, &form).await?;
    info!(
        order_id = %order.id,
        total = %order.total_amount,
        items = order.item_count(),
        "Order placed"
    );
    Ok(())
}
