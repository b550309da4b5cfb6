//! Authentication extractors.
//!
//! The signed-in account lives in the session under
//! [`session_keys::CURRENT_USER`]. Every storefront surface is JSON, so a
//! missing or wrong account is answered with an [`AppError`] body rather
//! than a redirect.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use bazaar_core::UserRole;

use crate::error::AppError;
use crate::models::{CurrentUser, session_keys};

async fn current_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// Extractor that requires a signed-in account of any role.
///
/// ```rust,ignore
/// async fn orders(RequireAuth(user): RequireAuth) -> Result<Json<Vec<Order>>> { ... }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts)
            .await
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("Sign in required".to_owned()))
    }
}

/// Extractor that optionally gets the signed-in account.
///
/// Guests get `None`; the request is never rejected.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(parts).await))
    }
}

/// Extractor for the delivery-partner portal.
pub struct RequireCourier(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireCourier
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;
        if user.role != UserRole::DeliveryPartner {
            return Err(AppError::Forbidden(
                "Delivery partner account required".to_owned(),
            ));
        }
        Ok(Self(user))
    }
}

/// Store the signed-in account in the session.
///
/// The session id is cycled first so a pre-login id cannot be fixed on the
/// account.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Clear the signed-in account from the session (sign out).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    Ok(())
}
