//! ApartMart Core - Shared domain types.
//!
//! This crate provides common types used across all ApartMart components:
//! - `storefront` - Backend client, stores, access guard and services
//! - `cli` - Command-line front end
//!
//! # Architecture
//!
//! The core crate contains only types and validation rules - no I/O, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, roles and statuses
//! - [`validation`] - Client-side form rules (sign-in, sign-up, product, checkout)

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;
pub mod validation;

pub use types::*;
pub use validation::{FieldError, ValidationErrors};
