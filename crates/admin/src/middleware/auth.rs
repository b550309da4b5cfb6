//! Authentication extractors for admin.
//!
//! The signed-in admin lives in the session under
//! [`session_keys::CURRENT_ADMIN`]. Every request re-reads the profile so a
//! demoted account loses access without waiting for its session to expire.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use bazaar_core::UserRole;
use bazaar_platform::repositories::ProfileRepository;

use crate::error::AppError;
use crate::models::{CurrentAdmin, session_keys};
use crate::state::AppState;

async fn session_admin(parts: &Parts) -> Option<CurrentAdmin> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
        .await
        .ok()
        .flatten()
}

/// Extractor that requires a signed-in account that still holds the admin role.
///
/// ```rust,ignore
/// async fn dashboard(RequireAdmin(admin): RequireAdmin) -> Result<Json<Dashboard>> { ... }
/// ```
pub struct RequireAdmin(pub CurrentAdmin);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let admin = session_admin(parts)
            .await
            .ok_or_else(|| AppError::Unauthorized("Sign in required".to_owned()))?;

        let profile = ProfileRepository::new(state.backend())
            .get(admin.id)
            .await?;
        if profile.is_none_or(|p| p.role != UserRole::Admin) {
            tracing::warn!(user_id = %admin.id, "Session holder is no longer an admin");
            return Err(AppError::Forbidden("Admin account required".to_owned()));
        }

        Ok(Self(admin))
    }
}

/// Extractor that optionally gets the current admin from the session.
///
/// Never rejects and does not re-check the role.
pub struct OptionalAdmin(pub Option<CurrentAdmin>);

impl<S> FromRequestParts<S> for OptionalAdmin
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(session_admin(parts).await))
    }
}

/// Helper to set the current admin in the session.
///
/// The session id is cycled first so a pre-login id cannot be fixed on the
/// account.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_admin(
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_ADMIN, admin).await
}

/// Helper to clear the current admin from the session (sign out).
///
/// # Errors
///
/// Returns an error if the session cannot be flushed.
pub async fn clear_current_admin(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
