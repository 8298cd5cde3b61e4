//! Application state shared across views.

use std::sync::Arc;

use crate::backend::{Backend, BackendError, SupabaseBackend};
use crate::config::StorefrontConfig;
use crate::services::{TeamService, UserDirectory};
use crate::stores::{AuthStore, CartStore, ProductStore};

/// Application state shared across all views.
///
/// Cheaply cloneable via `Arc`. Holds the one backend handle and the one
/// auth store; per-view state (cart, catalog, user list) is created from it
/// on demand.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: Arc<dyn Backend>,
    auth: AuthStore,
}

impl AppState {
    /// Connect to the hosted backend described by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: StorefrontConfig) -> Result<Self, BackendError> {
        let backend = SupabaseBackend::new(&config.backend)?;
        Ok(Self::with_backend(config, Arc::new(backend)))
    }

    /// Use an existing backend handle, such as a `MemoryBackend`.
    #[must_use]
    pub fn with_backend(config: StorefrontConfig, backend: Arc<dyn Backend>) -> Self {
        let auth = AuthStore::new(Arc::clone(&backend), config.bootstrap.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                auth,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.inner.backend
    }

    #[must_use]
    pub fn auth(&self) -> &AuthStore {
        &self.inner.auth
    }

    /// A cart bound to the shared auth store.
    #[must_use]
    pub fn cart(&self) -> CartStore {
        CartStore::new(Arc::clone(&self.inner.backend), self.inner.auth.clone())
    }

    #[must_use]
    pub fn products(&self) -> ProductStore {
        ProductStore::new(Arc::clone(&self.inner.backend))
    }

    #[must_use]
    pub fn team(&self) -> TeamService {
        TeamService::new(
            Arc::clone(&self.inner.backend),
            self.inner.config.image_bucket.clone(),
        )
    }

    #[must_use]
    pub fn user_directory(&self) -> UserDirectory {
        UserDirectory::new(Arc::clone(&self.inner.backend))
    }
}
