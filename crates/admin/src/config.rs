//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADMIN_DATABASE_URL` - `PostgreSQL` connection string for the session store
//! - `ADMIN_BASE_URL` - Public URL for the back office
//! - `PLATFORM_URL`, `PLATFORM_ANON_KEY`, `PLATFORM_SERVICE_KEY` - hosted platform
//! - `DELIVERY_TOKEN_SECRET` - Key for delivery handoff QR codes (shared with storefront)
//!
//! ## Optional
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `DELIVERY_TOKEN_TTL_HOURS` - Lifetime of a minted QR code (default: 48)
//! - `LOW_STOCK_THRESHOLD` - Dashboard low-stock cut-off (default: 5)
//! - `LOG_FORMAT` - `json` for structured logs, anything else for text
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Share of errors reported (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Share of requests traced (default: 0.1)

use std::net::{IpAddr, SocketAddr};

use chrono::Duration;
use secrecy::SecretString;

use bazaar_platform::PlatformConfig;
use bazaar_platform::env::{self, ConfigError};

const DEFAULT_DELIVERY_TOKEN_TTL_HOURS: i64 = 48;
const DEFAULT_LOW_STOCK_THRESHOLD: u32 = 5;

/// Admin application configuration.
#[derive(Clone)]
pub struct AdminConfig {
    /// `PostgreSQL` URL for the session store (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the back office
    pub base_url: String,
    /// Hosted platform connection
    pub platform: PlatformConfig,
    /// Key for minting delivery handoff codes
    pub delivery_token_secret: SecretString,
    /// How long a minted handoff code stays valid
    pub delivery_token_ttl: Duration,
    /// Products at or below this stock show on the dashboard
    pub low_stock_threshold: u32,
    /// Emit JSON log lines
    pub json_logs: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("platform", &self.platform)
            .field("delivery_token_secret", &"[REDACTED]")
            .field("delivery_token_ttl", &self.delivery_token_ttl)
            .field("low_stock_threshold", &self.low_stock_threshold)
            .field("json_logs", &self.json_logs)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[SET]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish_non_exhaustive()
    }
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = env::database_url("ADMIN_DATABASE_URL")?;
        let host = env::or_default("ADMIN_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_HOST".to_owned(), e.to_string()))?;
        let port = env::parsed_or("ADMIN_PORT", 3001_u16)?;
        let base_url = env::required("ADMIN_BASE_URL")?;

        let ttl_hours = env::parsed_or("DELIVERY_TOKEN_TTL_HOURS", DEFAULT_DELIVERY_TOKEN_TTL_HOURS)?;
        if ttl_hours <= 0 {
            return Err(ConfigError::InvalidEnvVar(
                "DELIVERY_TOKEN_TTL_HOURS".to_owned(),
                "must be positive".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            platform: PlatformConfig::from_env()?,
            delivery_token_secret: env::signing_secret("DELIVERY_TOKEN_SECRET")?,
            delivery_token_ttl: Duration::hours(ttl_hours),
            low_stock_threshold: env::parsed_or("LOW_STOCK_THRESHOLD", DEFAULT_LOW_STOCK_THRESHOLD)?,
            json_logs: env::optional("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
            sentry_dsn: env::optional("SENTRY_DSN"),
            sentry_environment: env::optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env::parsed_or("SENTRY_SAMPLE_RATE", 1.0_f32)?,
            sentry_traces_sample_rate: env::parsed_or("SENTRY_TRACES_SAMPLE_RATE", 0.1_f32)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should be marked `Secure`.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn config() -> AdminConfig {
        AdminConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3001,
            base_url: "http://localhost:3001".to_string(),
            platform: PlatformConfig {
                url: "http://localhost:54321".to_string(),
                anon_key: SecretString::from("anon"),
                service_key: SecretString::from("service"),
            },
            delivery_token_secret: SecretString::from("delivery-token-key-for-tests-only-01"),
            delivery_token_ttl: Duration::hours(48),
            low_stock_threshold: 5,
            json_logs: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.0,
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3001);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", config());
        assert!(debug_output.contains("localhost:3001"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("delivery-token-key"));
        assert!(!debug_output.contains("postgres://"));
    }
}
