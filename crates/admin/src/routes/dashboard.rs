//! Dashboard route handler.

use axum::{Json, extract::State};

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::services::dashboard::{self, Dashboard};
use crate::state::AppState;

/// GET /api/dashboard
pub async fn show(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<Dashboard>> {
    let threshold = state.config().low_stock_threshold;
    Ok(Json(dashboard::overview(state.backend(), threshold).await?))
}
