//! Delivery and courier route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;

use bazaar_core::DeliveryId;
use bazaar_core::models::Delivery;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::services::deliveries::{self, Assignment, CourierSummary, DeliveryFilter, NewDelivery};
use crate::state::AppState;

/// GET /api/deliveries?status=
pub async fn index(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(filter): Query<DeliveryFilter>,
) -> Result<Json<Vec<Delivery>>> {
    Ok(Json(deliveries::list(state.backend(), &filter).await?))
}

/// GET /api/deliveries/{id}
pub async fn show(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<DeliveryId>,
) -> Result<Json<Delivery>> {
    Ok(Json(deliveries::get(state.backend(), id).await?))
}

/// POST /api/deliveries
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(req): Json<NewDelivery>,
) -> Result<(StatusCode, Json<Delivery>)> {
    let delivery = deliveries::create(state.backend(), req.order_id).await?;
    Ok((StatusCode::CREATED, Json(delivery)))
}

/// Assign a courier. The response carries the new QR code.
///
/// POST /api/deliveries/{id}/assign
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn assign(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DeliveryId>,
    Json(req): Json<Assignment>,
) -> Result<Json<Delivery>> {
    let delivery = deliveries::assign(
        state.backend(),
        state.delivery_signer(),
        state.config().delivery_token_ttl,
        id,
        req.courier_id,
    )
    .await?;
    Ok(Json(delivery))
}

/// POST /api/deliveries/{id}/cancel
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<DeliveryId>,
) -> Result<Json<Delivery>> {
    Ok(Json(deliveries::cancel(state.backend(), id).await?))
}

/// GET /api/couriers
pub async fn couriers(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<Vec<CourierSummary>>> {
    Ok(Json(deliveries::couriers(state.backend()).await?))
}
