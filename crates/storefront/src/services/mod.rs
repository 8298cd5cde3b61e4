//! Business logic composed from the backend and the stores.
//!
//! # Services
//!
//! - [`bootstrap`] - One-time bootstrap administrator provisioning
//! - [`checkout`] - Pricing policy and order placement
//! - [`customer`] - Order history, wishlist and reviews
//! - [`admin`] - Administrator dashboard and user management
//! - [`team`] - Team dashboard, product editor and image uploads

pub mod admin;
pub mod bootstrap;
pub mod checkout;
pub mod customer;
pub mod team;

pub use admin::{AdminDashboard, UserDirectory};
pub use bootstrap::BootstrapAdmin;
pub use checkout::{CheckoutError, CheckoutSummary};
pub use team::{ImageUpload, TeamDashboard, TeamService};
