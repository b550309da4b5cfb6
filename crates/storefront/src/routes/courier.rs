//! Delivery-partner portal route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::DeliveryId;
use bazaar_core::models::{Delivery, LocationFix, LocationSample};

use crate::error::Result;
use crate::middleware::RequireCourier;
use crate::services::courier::{self, HandoffRequest};
use crate::state::AppState;

/// Scanned QR code body.
#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub qr_token: String,
}

/// GET /api/courier/deliveries
pub async fn deliveries(
    State(state): State<AppState>,
    RequireCourier(user): RequireCourier,
) -> Result<Json<Vec<Delivery>>> {
    Ok(Json(courier::assigned(state.backend(), user.id).await?))
}

/// Check a scanned code before showing the handoff screen.
///
/// POST /api/courier/deliveries/{id}/verify
#[instrument(skip(state, user, req), fields(courier_id = %user.id))]
pub async fn verify(
    State(state): State<AppState>,
    RequireCourier(user): RequireCourier,
    Path(id): Path<DeliveryId>,
    Json(req): Json<ScanRequest>,
) -> Result<Json<Delivery>> {
    let delivery = courier::verify(
        state.backend(),
        state.delivery_signer(),
        user.id,
        id,
        &req.qr_token,
        Utc::now(),
    )
    .await?;
    Ok(Json(delivery))
}

/// POST /api/courier/deliveries/{id}/status
#[instrument(skip(state, user, req), fields(courier_id = %user.id))]
pub async fn transition(
    State(state): State<AppState>,
    RequireCourier(user): RequireCourier,
    Path(id): Path<DeliveryId>,
    Json(req): Json<HandoffRequest>,
) -> Result<Json<Delivery>> {
    let delivery = courier::transition(
        state.backend(),
        state.delivery_signer(),
        user.id,
        id,
        &req,
        Utc::now(),
    )
    .await?;
    Ok(Json(delivery))
}

/// POST /api/courier/deliveries/{id}/location
#[instrument(skip(state, user, fix), fields(courier_id = %user.id))]
pub async fn location(
    State(state): State<AppState>,
    RequireCourier(user): RequireCourier,
    Path(id): Path<DeliveryId>,
    Json(fix): Json<LocationFix>,
) -> Result<(StatusCode, Json<LocationSample>)> {
    let sample = courier::record_location(state.backend(), user.id, id, &fix, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(sample)))
}
