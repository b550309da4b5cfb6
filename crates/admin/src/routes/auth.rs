//! Admin sign in and sign out.

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::models::Profile;
use bazaar_core::{Email, UserId};

use crate::error::Result;
use crate::middleware::{OptionalAdmin, RequireAdmin};
use crate::services::auth::{self, SignInForm};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct SessionInfo {
    pub signed_in: bool,
    pub admin: Option<SessionAdmin>,
}

/// Public part of the session's admin; the access token stays server side.
#[derive(Debug, Serialize)]
pub struct SessionAdmin {
    pub id: UserId,
    pub email: Email,
    pub name: String,
}

/// POST /api/auth/sign-in
#[instrument(skip(state, session, form))]
pub async fn sign_in(
    State(state): State<AppState>,
    session: Session,
    Json(form): Json<SignInForm>,
) -> Result<Json<Profile>> {
    Ok(Json(
        auth::sign_in(state.backend(), state.auth(), &session, form).await?,
    ))
}

/// POST /api/auth/sign-out
#[instrument(skip_all)]
pub async fn sign_out(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
) -> Result<StatusCode> {
    auth::sign_out(state.auth(), &session, &admin).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/session
pub async fn current(OptionalAdmin(admin): OptionalAdmin) -> Json<SessionInfo> {
    Json(SessionInfo {
        signed_in: admin.is_some(),
        admin: admin.map(|a| SessionAdmin {
            id: a.id,
            email: a.email,
            name: a.name,
        }),
    })
}
