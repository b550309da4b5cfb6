//! Return processing route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::instrument;

use bazaar_core::ReturnId;
use bazaar_core::models::ReturnRequest;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::services::returns::{self, Decision, ReturnFilter};
use crate::state::AppState;

/// GET /api/returns?status=
pub async fn index(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(filter): Query<ReturnFilter>,
) -> Result<Json<Vec<ReturnRequest>>> {
    Ok(Json(returns::list(state.backend(), &filter).await?))
}

/// GET /api/returns/{id}
pub async fn show(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<ReturnId>,
) -> Result<Json<ReturnRequest>> {
    Ok(Json(returns::get(state.backend(), id).await?))
}

/// POST /api/returns/{id}/approve
#[instrument(skip(state, admin, decision), fields(admin_id = %admin.id))]
pub async fn approve(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ReturnId>,
    Json(decision): Json<Decision>,
) -> Result<Json<ReturnRequest>> {
    Ok(Json(returns::approve(state.backend(), id, decision).await?))
}

/// POST /api/returns/{id}/reject
#[instrument(skip(state, admin, decision), fields(admin_id = %admin.id))]
pub async fn reject(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ReturnId>,
    Json(decision): Json<Decision>,
) -> Result<Json<ReturnRequest>> {
    Ok(Json(returns::reject(state.backend(), id, decision).await?))
}

/// POST /api/returns/{id}/pickup
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn pickup(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ReturnId>,
) -> Result<Json<ReturnRequest>> {
    Ok(Json(returns::mark_picked_up(state.backend(), id).await?))
}

/// POST /api/returns/{id}/refund
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn refund(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ReturnId>,
) -> Result<Json<ReturnRequest>> {
    Ok(Json(returns::refund(state.backend(), id).await?))
}
