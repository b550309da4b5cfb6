//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::ExposeSecret;

use bazaar_core::token::Signer;
use bazaar_platform::{AuthProvider, Backend};

use crate::config::AdminConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AdminConfig,
    backend: Arc<dyn Backend>,
    auth: Arc<dyn AuthProvider>,
    delivery_signer: Signer,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The back office uses the platform's service key, so `backend` sees
    /// every row regardless of owner.
    #[must_use]
    pub fn new(
        config: AdminConfig,
        backend: Arc<dyn Backend>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let delivery_signer = Signer::new(config.delivery_token_secret.expose_secret());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                backend,
                auth,
                delivery_signer,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AdminConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.inner.backend.as_ref()
    }

    #[must_use]
    pub fn auth(&self) -> &dyn AuthProvider {
        self.inner.auth.as_ref()
    }

    /// Mints delivery handoff codes the storefront's courier portal verifies.
    #[must_use]
    pub fn delivery_signer(&self) -> &Signer {
        &self.inner.delivery_signer
    }
}
