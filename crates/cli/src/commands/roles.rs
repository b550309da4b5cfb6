//! Role management.
//!
//! The account must already exist (signed up through the storefront).
//! Promoting to `admin` grants back-office access on the next request;
//! demoting takes it away just as fast.

use bazaar_core::models::Profile;
use bazaar_core::{Email, UserRole};
use bazaar_platform::Backend;
use bazaar_platform::repositories::ProfileRepository;

use super::CliError;

/// Set the role of the account registered under `email`.
///
/// # Errors
///
/// Returns `CliError::UnknownAccount` if no profile has that email.
pub async fn promote(backend: &dyn Backend, email: &str, role: UserRole) -> Result<Profile, CliError> {
    let email = Email::parse(email)?;
    let profiles = ProfileRepository::new(backend);
    let profile = profiles
        .by_email(&email)
        .await?
        .ok_or_else(|| CliError::UnknownAccount(email.to_string()))?;

    if profile.role == role {
        tracing::info!(user_id = %profile.id, %role, "Role unchanged");
        return Ok(profile);
    }

    let updated = profiles.set_role(profile.id, role).await?;
    tracing::info!(user_id = %updated.id, from = %profile.role, to = %role, "Role changed");
    Ok(updated)
}
