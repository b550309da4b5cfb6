//! Platform connection settings.
//!
//! - `PLATFORM_URL` - project URL
//! - `PLATFORM_ANON_KEY` - public key sent as `apikey`
//! - `PLATFORM_SERVICE_KEY` - service key for server-side access

use secrecy::SecretString;

use crate::env::{self, ConfigError};

/// Where the platform lives and how to authenticate against it.
#[derive(Clone)]
pub struct PlatformConfig {
    /// Project URL, e.g. `https://abc.platform.example`.
    pub url: String,
    /// Public key sent as `apikey` on every request.
    pub anon_key: SecretString,
    /// Service key used as bearer token for server-side writes.
    pub service_key: SecretString,
}

impl std::fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformConfig")
            .field("url", &self.url)
            .field("anon_key", &"[REDACTED]")
            .field("service_key", &"[REDACTED]")
            .finish()
    }
}

impl PlatformConfig {
    /// Load from `PLATFORM_*` variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is missing or the service key is weak.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = env::required("PLATFORM_URL")?;
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::InvalidEnvVar(
                "PLATFORM_URL".to_owned(),
                "must start with http:// or https://".to_owned(),
            ));
        }
        Ok(Self {
            url,
            anon_key: SecretString::from(env::required("PLATFORM_ANON_KEY")?),
            service_key: env::validated_secret("PLATFORM_SERVICE_KEY")?,
        })
    }

    /// Base URL without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    #[must_use]
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.base_url())
    }

    #[must_use]
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.base_url())
    }

    #[must_use]
    pub fn storage_url(&self) -> String {
        format!("{}/storage/v1", self.base_url())
    }

    /// Websocket endpoint for realtime subscriptions.
    #[must_use]
    pub fn realtime_url(&self) -> String {
        let base = self.base_url();
        let ws = base
            .strip_prefix("https://")
            .map(|rest| format!("wss://{rest}"))
            .or_else(|| base.strip_prefix("http://").map(|rest| format!("ws://{rest}")))
            .unwrap_or_else(|| base.to_owned());
        format!("{ws}/realtime/v1/websocket")
    }
}
