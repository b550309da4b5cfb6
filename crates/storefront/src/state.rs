//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::ExposeSecret;

use bazaar_core::pricing::PricingPolicy;
use bazaar_core::token::Signer;
use bazaar_platform::{AuthProvider, Backend};

use crate::config::StorefrontConfig;
use crate::services::catalog::Catalog;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to the
/// platform clients, the catalog cache and the token signers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    backend: Arc<dyn Backend>,
    auth: Arc<dyn AuthProvider>,
    catalog: Catalog,
    quote_signer: Signer,
    delivery_signer: Signer,
}

impl AppState {
    /// Create a new application state.
    ///
    /// `backend` and `auth` are the platform clients; production passes the
    /// REST implementations, tests the in-memory ones.
    #[must_use]
    pub fn new(
        config: StorefrontConfig,
        backend: Arc<dyn Backend>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let catalog = Catalog::new(Arc::clone(&backend));
        let quote_signer = Signer::new(config.quote_secret.expose_secret());
        let delivery_signer = Signer::new(config.delivery_token_secret.expose_secret());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                auth,
                catalog,
                quote_signer,
                delivery_signer,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// The platform row store.
    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.inner.backend.as_ref()
    }

    /// Shared handle to the row store, for work that outlives the request.
    #[must_use]
    pub fn backend_handle(&self) -> Arc<dyn Backend> {
        Arc::clone(&self.inner.backend)
    }

    #[must_use]
    pub fn auth(&self) -> &dyn AuthProvider {
        self.inner.auth.as_ref()
    }

    /// Cached catalog reads.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn pricing(&self) -> &PricingPolicy {
        &self.inner.config.pricing
    }

    #[must_use]
    pub fn quote_signer(&self) -> &Signer {
        &self.inner.quote_signer
    }

    #[must_use]
    pub fn delivery_signer(&self) -> &Signer {
        &self.inner.delivery_signer
    }
}
