//! Checkout route handlers.
//!
//! The client first asks for a signed quote built from the server-side cart
//! and pays against it, then places the order with the quote token. A quote
//! places at most one order, so placement is safe to retry. An optional
//! `Idempotency-Key` header is logged for correlation.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chrono::Utc;
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::models::Order;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::services::checkout::{self, PlaceOrderRequest, QuoteRequest, QuoteResponse};
use crate::services::shopper::ShopperService;
use crate::state::AppState;

/// Header carrying the client's retry key, logged with the placement.
pub const IDEMPOTENCY_KEY: &str = "idempotency-key";

/// Longest idempotency key accepted.
const MAX_KEY_LEN: usize = 128;

fn idempotency_key(headers: &HeaderMap) -> Result<Option<String>> {
    let Some(value) = headers.get(IDEMPOTENCY_KEY) else {
        return Ok(None);
    };
    let key = value
        .to_str()
        .map_err(|_| AppError::BadRequest("Idempotency-Key must be ASCII".to_owned()))?
        .trim();
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(AppError::BadRequest(format!(
            "Idempotency-Key must be 1 to {MAX_KEY_LEN} characters"
        )));
    }
    Ok(Some(key.to_owned()))
}

/// Price the current cart and sign the result.
///
/// POST /api/checkout/quote
#[instrument(skip(state, session, user), fields(user_id = %user.id))]
pub async fn quote(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
) -> Result<Json<QuoteResponse>> {
    let shopper = ShopperService::new(state.backend(), &session, Some(&user));
    let current = shopper.load().await?;
    if current.cart.is_empty() {
        return Err(AppError::BadRequest("Your cart is empty".to_owned()));
    }
    let request = QuoteRequest::from_state(&current);
    Ok(Json(
        checkout::quote(&state, user.id, &request, Utc::now()).await?,
    ))
}

/// Place an order from a signed quote.
///
/// POST /api/checkout/orders
#[instrument(skip(state, session, user, headers, req), fields(user_id = %user.id))]
pub async fn place(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    let key = idempotency_key(&headers)?;
    let order = checkout::place(&state, &session, &user, key.as_deref(), &req).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_idempotency_key_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(idempotency_key(&headers).unwrap(), None);

        headers.insert(IDEMPOTENCY_KEY, HeaderValue::from_static(" order-7 "));
        assert_eq!(idempotency_key(&headers).unwrap().as_deref(), Some("order-7"));

        headers.insert(IDEMPOTENCY_KEY, HeaderValue::from_static("   "));
        assert!(idempotency_key(&headers).is_err());

        let long = "k".repeat(MAX_KEY_LEN + 1);
        headers.insert(IDEMPOTENCY_KEY, HeaderValue::from_str(&long).unwrap());
        assert!(idempotency_key(&headers).is_err());
    }
}
