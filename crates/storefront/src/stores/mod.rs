//! Application state containers.
//!
//! Each store owns a slice of client state rebuilt from the backend:
//!
//! - [`AuthStore`] - session identity and profile, published over a
//!   `watch` channel and kept current by a session-change listener
//! - [`CartStore`] - the signed-in user's cart lines and derived totals
//! - [`ProductStore`] - catalog rows and the filtered/sorted view
//!
//! Stores are explicit handles threaded through the caller; nothing here
//! is a process-wide singleton.

mod auth;
mod cart;
mod products;

pub use auth::{AuthError, AuthSnapshot, AuthStore};
pub use cart::{CartStore, DEFAULT_QUANTITY};
pub use products::{ProductStore, SortField, SortFieldParseError, SortOrder};

use thiserror::Error;

use crate::backend::BackendError;

/// Errors from cart and product store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The operation needs a signed-in profile.
    #[error("not signed in")]
    NotSignedIn,

    /// Backend request failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}
