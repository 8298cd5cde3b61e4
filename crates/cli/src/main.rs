//! ApartMart CLI - Command-line front end for the storefront.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! am-cli products --search tea --sort price
//!
//! # Work with a cart (signs in first)
//! am-cli --email ada@example.com --password Engine1 cart add <product-id> -q 2
//! am-cli --email ada@example.com --password Engine1 checkout --card-number 4242...
//!
//! # Provision the bootstrap administrator (BOOTSTRAP_ADMIN_ENABLED=true)
//! am-cli bootstrap-admin
//!
//! # See what the access guard decides for a location
//! am-cli guard /admin/users
//! ```
//!
//! # Commands
//!
//! - `products`, `categories`, `reviews` - Public catalog
//! - `signup` - Create a customer account
//! - `cart`, `checkout`, `orders`, `wishlist` - Signed-in customer views
//! - `admin` - Administrator dashboard and user management
//! - `team` - Team dashboard, product editor and image uploads
//! - `bootstrap-admin` - One-time administrator provisioning
//! - `guard` - Print the access guard decision for a path

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use apartmart_storefront::config::StorefrontConfig;

mod commands;

use commands::{CliError, Credentials};

#[derive(Parser)]
#[command(name = "am-cli")]
#[command(author, version, about = "ApartMart storefront CLI")]
struct Cli {
    /// Email to sign in with
    #[arg(long, global = true, env = "AM_EMAIL")]
    email: Option<String>,

    /// Password to sign in with
    #[arg(long, global = true, env = "AM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision (or sign in as) the bootstrap administrator
    BootstrapAdmin,
    /// List active products
    Products(commands::catalog::ProductsArgs),
    /// List active categories
    Categories,
    /// List reviews for a product
    Reviews {
        /// Product id
        product_id: String,
    },
    /// Create a customer account
    Signup(commands::account::SignupArgs),
    /// Show or change the cart
    Cart {
        #[command(subcommand)]
        action: commands::cart::CartAction,
    },
    /// Place an order for the current cart
    Checkout(commands::cart::CheckoutArgs),
    /// List your orders
    Orders,
    /// List your wishlist
    Wishlist,
    /// Administrator tools
    Admin {
        #[command(subcommand)]
        action: commands::admin::AdminAction,
    },
    /// Team tools
    Team {
        #[command(subcommand)]
        action: commands::team::TeamAction,
    },
    /// Print the access guard decision for a location
    Guard {
        /// Location, e.g. `/admin/users`
        path: String,
    },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: Option<&StorefrontConfig>) -> Option<sentry::ClientInitGuard> {
    let dsn = config?.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Configuration errors are reported after tracing is up
    let config = StorefrontConfig::from_env();
    let _sentry_guard = init_sentry(config.as_ref().ok());

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "apartmart_storefront=info,apartmart_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(CliError::from(e)),
    };

    if let Err(e) = result {
        e.report();
        tracing::error!("Command failed: {}", e.user_message());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: StorefrontConfig) -> Result<(), CliError> {
    let credentials = Credentials::new(cli.email, cli.password);

    let state = commands::connect(config).await?;

    match cli.command {
        Commands::BootstrapAdmin => commands::account::bootstrap_admin(&state).await,
        Commands::Products(args) => commands::catalog::products(&state, &args).await,
        Commands::Categories => commands::catalog::categories(&state).await,
        Commands::Reviews { product_id } => commands::catalog::reviews(&state, &product_id).await,
        Commands::Signup(args) => commands::account::signup(&state, args).await,
        Commands::Cart { action } => commands::cart::run(&state, &credentials, action).await,
        Commands::Checkout(args) => commands::cart::checkout(&state, &credentials, args).await,
        Commands::Orders => commands::account::orders(&state, &credentials).await,
        Commands::Wishlist => commands::account::wishlist(&state, &credentials).await,
        Commands::Admin { action } => commands::admin::run(&state, &credentials, action).await,
        Commands::Team { action } => commands::team::run(&state, &credentials, action).await,
        Commands::Guard { path } => commands::guard::run(&state, &credentials, &path).await,
    }
}
