//! Order route handlers.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use tracing::instrument;

use bazaar_core::OrderId;
use bazaar_core::models::Order;

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::services::orders::{self, OrderFilter, StatusChange};
use crate::state::AppState;

/// GET /api/orders?status=&limit=
pub async fn index(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Query(filter): Query<OrderFilter>,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(orders::list(state.backend(), &filter).await?))
}

/// GET /api/orders/{id}
pub async fn show(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(orders::get(state.backend(), id).await?))
}

/// POST /api/orders/{id}/status
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn transition(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<OrderId>,
    Json(change): Json<StatusChange>,
) -> Result<Json<Order>> {
    Ok(Json(
        orders::transition(state.backend(), id, change.status).await?,
    ))
}
