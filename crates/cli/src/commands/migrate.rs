//! Session-store migrations.
//!
//! Domain tables live on the hosted platform; the only schema this
//! workspace owns is the `tower-sessions` table of each binary.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - storefront session database
//! - `ADMIN_DATABASE_URL` - admin session database
//!
//! Both fall back to `DATABASE_URL`.

use tower_sessions_sqlx_store::PostgresStore;

use bazaar_admin::db::{self, SESSION_SCHEMA, SESSION_TABLE};
use bazaar_platform::env;

use super::CliError;

/// Create the storefront session table (default schema and table).
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or the DDL fails.
pub async fn storefront() -> Result<(), CliError> {
    let url = env::database_url("STOREFRONT_DATABASE_URL")?;
    tracing::info!("Connecting to storefront session database...");
    let pool = db::create_pool(&url).await?;

    PostgresStore::new(pool).migrate().await?;
    tracing::info!("Storefront session table ready");
    Ok(())
}

/// Create the admin session table `admin.session`.
///
/// # Errors
///
/// Returns `CliError` if the database is unreachable or the DDL fails.
pub async fn admin() -> Result<(), CliError> {
    let url = env::database_url("ADMIN_DATABASE_URL")?;
    tracing::info!("Connecting to admin session database...");
    let pool = db::create_pool(&url).await?;

    let store = PostgresStore::new(pool)
        .with_schema_name(SESSION_SCHEMA)
        .and_then(|s| s.with_table_name(SESSION_TABLE))
        .map_err(|e| CliError::Database(sqlx::Error::Configuration(e.into())))?;
    store.migrate().await?;
    tracing::info!("Admin session table {SESSION_SCHEMA}.{SESSION_TABLE} ready");
    Ok(())
}
