//! CLI subcommands.

pub mod migrate;
pub mod roles;
pub mod seed;

use thiserror::Error;

use bazaar_core::ContactError;
use bazaar_platform::env::ConfigError;
use bazaar_platform::{PlatformConfig, RepositoryError, RestBackend};

/// Errors from any CLI command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid email: {0}")]
    Email(#[from] ContactError),

    #[error("No account with email {0}")]
    UnknownAccount(String),

    #[error("Platform error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Rejected(#[from] bazaar_admin::error::AppError),
}

/// Platform client with the service key from the environment.
///
/// # Errors
///
/// Returns `CliError::Config` if the platform variables are missing.
pub fn platform_backend() -> Result<RestBackend, CliError> {
    Ok(RestBackend::new(PlatformConfig::from_env()?))
}
