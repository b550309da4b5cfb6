//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for the session store
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront
//! - `PLATFORM_URL`, `PLATFORM_ANON_KEY`, `PLATFORM_SERVICE_KEY` - hosted platform
//! - `QUOTE_SIGNING_SECRET` - Key for signed checkout quotes
//! - `DELIVERY_TOKEN_SECRET` - Key for delivery handoff QR codes (shared with admin)
//! - `PAYMENT_GATEWAY_KEY` - Public merchant key handed to the payment widget
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `PRICING_SHIPPING_FEE` - Flat shipping fee (default: 25)
//! - `PRICING_FREE_SHIPPING_THRESHOLD` - Free shipping above this subtotal (default: 500)
//! - `PRICING_TAX_RATE` - Tax as a fraction (default: 0.18)
//! - `PRICING_COD_LIMIT` - Cash on delivery unavailable from this total (default: 5000)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_TRACES_SAMPLE_RATE` - Share of requests traced (default: 0.1)

use std::net::{IpAddr, SocketAddr};

use rust_decimal::Decimal;
use secrecy::SecretString;

use bazaar_core::Money;
use bazaar_core::pricing::PricingPolicy;
use bazaar_platform::PlatformConfig;
use bazaar_platform::env::{self, ConfigError};

/// Storefront application configuration.
#[derive(Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` URL for the session store (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Hosted platform connection
    pub platform: PlatformConfig,
    /// Key for signing checkout quotes
    pub quote_secret: SecretString,
    /// Key for verifying delivery handoff codes
    pub delivery_token_secret: SecretString,
    /// Public merchant key for the payment widget
    pub payment_gateway_key: String,
    /// Shipping, tax and COD rules
    pub pricing: PricingPolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
    pub sentry_traces_sample_rate: f32,
}

impl std::fmt::Debug for StorefrontConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorefrontConfig")
            .field("database_url", &"[REDACTED]")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("platform", &self.platform)
            .field("quote_secret", &"[REDACTED]")
            .field("delivery_token_secret", &"[REDACTED]")
            .field("payment_gateway_key", &self.payment_gateway_key)
            .field("pricing", &self.pricing)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[SET]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish_non_exhaustive()
    }
}

impl StorefrontConfig {
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

        let database_url = env::database_url("STOREFRONT_DATABASE_URL")?;
        let host = env::or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_owned(), e.to_string()))?;
        let port = env::parsed_or("STOREFRONT_PORT", 3000_u16)?;
        let base_url = env::required("STOREFRONT_BASE_URL")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            platform: PlatformConfig::from_env()?,
            quote_secret: env::signing_secret("QUOTE_SIGNING_SECRET")?,
            delivery_token_secret: env::signing_secret("DELIVERY_TOKEN_SECRET")?,
            payment_gateway_key: env::required("PAYMENT_GATEWAY_KEY")?,
            pricing: pricing_from_env()?,
            sentry_dsn: env::optional("SENTRY_DSN"),
            sentry_environment: env::optional("SENTRY_ENVIRONMENT"),
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

/// Default pricing with any `PRICING_*` overrides applied.
fn pricing_from_env() -> Result<PricingPolicy, ConfigError> {
    let defaults = PricingPolicy::default();
    let money = |key: &str, default: Money| -> Result<Money, ConfigError> {
        let amount: Decimal = env::parsed_or(key, default.amount())?;
        if amount.is_sign_negative() {
            return Err(ConfigError::InvalidEnvVar(
                key.to_owned(),
                "must not be negative".to_owned(),
            ));
        }
        Ok(Money::new(amount))
    };

    let tax_rate: Decimal = env::parsed_or("PRICING_TAX_RATE", defaults.tax_rate)?;
    if tax_rate.is_sign_negative() || tax_rate >= Decimal::ONE {
        return Err(ConfigError::InvalidEnvVar(
            "PRICING_TAX_RATE".to_owned(),
            "must be a fraction between 0 and 1".to_owned(),
        ));
    }

    Ok(PricingPolicy {
        shipping_fee: money("PRICING_SHIPPING_FEE", defaults.shipping_fee)?,
        free_shipping_threshold: money(
            "PRICING_FREE_SHIPPING_THRESHOLD",
            defaults.free_shipping_threshold,
        )?,
        tax_rate,
        cod_limit: money("PRICING_COD_LIMIT", defaults.cod_limit)?,
        wallet_cap: defaults.wallet_cap,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn config() -> StorefrontConfig {
        StorefrontConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            platform: PlatformConfig {
                url: "http://localhost:54321".to_string(),
                anon_key: SecretString::from("anon"),
                service_key: SecretString::from("service"),
            },
            quote_secret: SecretString::from("quote-signing-key-for-tests-only-0001"),
            delivery_token_secret: SecretString::from("delivery-token-key-for-tests-only-01"),
            payment_gateway_key: "rzp_test_key".to_string(),
            pricing: PricingPolicy::default(),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_traces_sample_rate: 0.0,
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug_output = format!("{:?}", config());
        assert!(debug_output.contains("localhost:3000"));
        assert!(debug_output.contains("rzp_test_key"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("quote-signing-key"));
        assert!(!debug_output.contains("delivery-token-key"));
    }

    #[test]
    fn test_https_detection() {
        let mut c = config();
        assert!(!c.is_https());
        c.base_url = "https://shop.example.in".to_string();
        assert!(c.is_https());
    }
}
