//! Order history, returns and tracking route handlers.

use std::convert::Infallible;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::OrderId;
use bazaar_core::models::{Invoice, Order, ReturnRequest};

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::tracking::{self, TrackingEvent, TrackingSnapshot};
use crate::services::{orders, returns};
use crate::state::AppState;

/// Return request body.
#[derive(Debug, Deserialize)]
pub struct ReturnForm {
    pub reason: String,
}

/// GET /api/orders
pub async fn index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(orders::list(state.backend(), user.id).await?))
}

/// GET /api/orders/{id}
pub async fn show(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(orders::get(state.backend(), user.id, id).await?))
}

/// GET /api/orders/{id}/invoice
pub async fn invoice(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Invoice>> {
    Ok(Json(orders::invoice(state.backend(), user.id, id).await?))
}

/// POST /api/orders/{id}/cancel
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn cancel(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(orders::cancel(state.backend(), user.id, id).await?))
}

/// POST /api/orders/{id}/return
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn request_return(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
    Json(form): Json<ReturnForm>,
) -> Result<(StatusCode, Json<ReturnRequest>)> {
    let created = returns::request(state.backend(), user.id, id, &form.reason).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/returns
pub async fn returns_index(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<ReturnRequest>>> {
    Ok(Json(returns::list(state.backend(), user.id).await?))
}

/// GET /api/orders/{id}/tracking
pub async fn tracking(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Json<TrackingSnapshot>> {
    Ok(Json(tracking::snapshot(state.backend(), user.id, id).await?))
}

fn to_sse(event: &TrackingEvent) -> Event {
    let name = match event {
        TrackingEvent::Location(_) => "location",
        TrackingEvent::Status(_) => "status",
    };
    Event::default()
        .event(name)
        .json_data(event)
        .unwrap_or_else(|err| Event::default().event("error").data(err.to_string()))
}

/// Live tracking as Server-Sent Events.
///
/// GET /api/orders/{id}/tracking/stream
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn tracking_stream(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<OrderId>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let snapshot = tracking::snapshot(state.backend(), user.id, id).await?;
    let delivery = snapshot
        .delivery
        .ok_or_else(|| AppError::NotFound("Delivery".to_owned()))?;
    let events = tracking::follow(state.backend_handle(), delivery, tracking::POLL_INTERVAL)
        .map(|event| Ok(to_sse(&event)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
