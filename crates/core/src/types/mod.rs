//! Core types for ApartMart.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod price;
pub mod role;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use price::{Amount, Price, PriceError};
pub use role::{Role, RoleParseError};
pub use status::*;
