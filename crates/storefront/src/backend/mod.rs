//! Hosted backend client wrapper.
//!
//! # Architecture
//!
//! - The hosted service owns authentication, row storage and file storage
//! - Every read and write is a direct request; nothing is cached locally
//! - Stores talk to the service through the object-safe [`Backend`] trait
//!   and hold it as `Arc<dyn Backend>`
//!
//! # Implementations
//!
//! - [`SupabaseBackend`] - `reqwest` client for the REST, auth and storage APIs
//! - [`MemoryBackend`] - in-process tables with the same query semantics
//!
//! # Example
//!
//! ```rust,ignore
//! use apartmart_storefront::backend::{Backend, Query, SupabaseBackend};
//! use apartmart_storefront::models::{Product, tables};
//!
//! let backend = SupabaseBackend::new(&config.backend)?;
//! let products: Vec<Product> = (&backend as &dyn Backend)
//!     .fetch(tables::PRODUCTS, &Query::new().eq("is_active", true))
//!     .await?;
//! ```

mod memory;
mod query;
mod supabase;

pub use memory::{Call, Failure, MEMORY_BASE_URL, MemoryBackend, Operation};
pub use query::{Cardinality, Embed, Filter, OrderBy, Query};
pub use supabase::SupabaseBackend;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;

use apartmart_core::UserId;

/// Errors that can occur when talking to the hosted backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("backend returned {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body.
        message: String,
    },

    /// Email/password pair was rejected.
    #[error("Invalid login credentials")]
    InvalidCredentials,

    /// Sign-up for an email that already has an identity.
    #[error("User already registered")]
    UserAlreadyExists,

    /// The request needs a signed-in session.
    #[error("not signed in")]
    NotAuthenticated,

    /// A single row was expected but none matched.
    #[error("row not found in {0}")]
    NotFound(String),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The request could not be built (bad URL, unusable path).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// The authenticated identity behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct AuthUser {
    /// Identity id. The matching profile row uses the same id.
    pub id: UserId,
    /// Email the identity signed up with.
    pub email: Option<String>,
}

/// A signed-in session. Tokens stay inside the backend implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub user: AuthUser,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Result of creating a credential identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUp {
    pub user: AuthUser,
    /// Present when the service signs the new identity in immediately.
    pub session: Option<AuthSession>,
}

/// Session-change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    TokenRefreshed(AuthSession),
    SignedOut,
}

/// Capacity of the session-change broadcast channel.
pub(crate) const AUTH_EVENT_CAPACITY: usize = 16;

/// Direct-call surface of the hosted backend.
#[async_trait]
pub trait Backend: Send + Sync {
    // Auth

    /// The current session, refreshing it first if it has expired.
    async fn get_session(&self) -> Result<Option<AuthSession>, BackendError>;

    /// Sign in with email and password.
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, BackendError>;

    /// Create a credential identity.
    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUp, BackendError>;

    /// Invalidate the current session.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Receive every future session change.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    // Rows

    /// Read rows.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, BackendError>;

    /// Count rows matching the query's filters.
    async fn count(&self, table: &str, query: &Query) -> Result<u64, BackendError>;

    /// Insert one object or an array of objects, returning the stored rows.
    async fn insert(&self, table: &str, rows: Value) -> Result<Vec<Value>, BackendError>;

    /// Patch every row matching the query's filters, returning the updated rows.
    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, BackendError>;

    /// Delete every row matching the query's filters.
    async fn delete(&self, table: &str, query: &Query) -> Result<(), BackendError>;

    // Storage

    /// Store a binary object at `path` inside `bucket`.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BackendError>;

    /// Public URL of an object.
    fn public_url(&self, bucket: &str, path: &str) -> String;
}

// =============================================================================
// Typed helpers
// =============================================================================

impl<'a> dyn Backend + 'a {
    /// Read rows and decode them.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or `Parse` if a row does not decode as `T`.
    pub async fn fetch<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, BackendError> {
        let rows = self.select(table, query).await?;
        decode_rows(rows)
    }

    /// First matching row, if any.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or `Parse` if the row does not decode.
    pub async fn fetch_optional<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<Option<T>, BackendError> {
        let rows = self.select(table, &query.clone().limit(1)).await?;
        rows.into_iter()
            .next()
            .map(serde_json::from_value)
            .transpose()
            .map_err(BackendError::from)
    }

    /// Exactly one matching row.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when nothing matches.
    pub async fn fetch_single<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &Query,
    ) -> Result<T, BackendError> {
        self.fetch_optional(table, query)
            .await?
            .ok_or_else(|| BackendError::NotFound(table.to_owned()))
    }

    /// Insert one row and decode the stored representation.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or `NotFound` if the service returned no row.
    pub async fn insert_one<I, T>(&self, table: &str, row: &I) -> Result<T, BackendError>
    where
        I: Serialize + Sync,
        T: DeserializeOwned,
    {
        let rows = self.insert(table, serde_json::to_value(row)?).await?;
        let first = rows
            .into_iter()
            .next()
            .ok_or_else(|| BackendError::NotFound(table.to_owned()))?;
        Ok(serde_json::from_value(first)?)
    }

    /// Insert several rows in one request.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or `Parse` if a stored row does not decode.
    pub async fn insert_many<I, T>(&self, table: &str, rows: &[I]) -> Result<Vec<T>, BackendError>
    where
        I: Serialize + Sync,
        T: DeserializeOwned,
    {
        let stored = self.insert(table, serde_json::to_value(rows)?).await?;
        decode_rows(stored)
    }

    /// Patch matching rows and decode the updated representations.
    ///
    /// # Errors
    ///
    /// Returns the backend error, or `Parse` if a row does not decode.
    pub async fn update_rows<P, T>(
        &self,
        table: &str,
        query: &Query,
        patch: &P,
    ) -> Result<Vec<T>, BackendError>
    where
        P: Serialize + Sync,
        T: DeserializeOwned,
    {
        let rows = self
            .update(table, query, serde_json::to_value(patch)?)
            .await?;
        decode_rows(rows)
    }
}

fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, BackendError> {
    rows.into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<T>, _>>()
        .map_err(BackendError::from)
}
