//! ApartMart storefront client library.
//!
//! Everything the storefront views need, independent of how they are
//! rendered:
//!
//! - [`backend`] - Hosted backend wrapper (`Backend` trait, REST and in-memory implementations)
//! - [`models`] - Typed rows for every table
//! - [`stores`] - Auth, cart and product state
//! - [`guard`] / [`routes`] - Access guard and the client route table
//! - [`services`] - Checkout, bootstrap administrator, admin and team operations
//! - [`config`] / [`error`] / [`state`] - Startup configuration, errors and shared state

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod config;
pub mod error;
pub mod guard;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod stores;

#[cfg(test)]
mod test_support;

pub use error::AppError;
pub use state::AppState;
