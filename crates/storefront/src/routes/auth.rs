//! Auth route handlers.
//!
//! Sign up and sign in return the profile and leave the account in the
//! session; any guest cart and wishlist are merged on the way in.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::models::Profile;

use crate::error::{Result, clear_sentry_user};
use crate::middleware::{OptionalAuth, RequireAuth};
use crate::models::CurrentUser;
use crate::services::account::{self, SignInForm, SignUpForm};
use crate::state::AppState;

/// Who is signed in, if anyone.
#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub signed_in: bool,
    pub user: Option<SessionUser>,
}

/// Public part of [`CurrentUser`].
#[derive(Debug, Serialize)]
pub struct SessionUser {
    pub id: bazaar_core::UserId,
    pub email: bazaar_core::Email,
    pub role: bazaar_core::UserRole,
}

impl From<CurrentUser> for SessionUser {
    fn from(user: CurrentUser) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
        }
    }
}

/// POST /api/auth/sign-up
#[instrument(skip(state, session, form))]
pub async fn sign_up(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignUpForm>,
) -> Result<(StatusCode, Json<Profile>)> {
    let profile = account::sign_up(state.backend(), state.auth(), &session, form).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// POST /api/auth/sign-in
#[instrument(skip(state, session, form))]
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignInForm>,
) -> Result<Json<Profile>> {
    Ok(Json(
        account::sign_in(state.backend(), state.auth(), &session, form).await?,
    ))
}

/// POST /api/auth/sign-out
#[instrument(skip_all)]
pub async fn sign_out(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<StatusCode> {
    account::sign_out(state.auth(), &session, &user).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/session
pub async fn current(OptionalAuth(user): OptionalAuth) -> Json<SessionInfo> {
    Json(SessionInfo {
        signed_in: user.is_some(),
        user: user.map(SessionUser::from),
    })
}
