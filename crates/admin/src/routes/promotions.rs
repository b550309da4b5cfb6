//! Coupon and card-offer route handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::instrument;

use bazaar_core::models::{CardOffer, Coupon};
use bazaar_core::{CardOfferId, CouponId};

use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::services::promotions::{self, CardOfferForm, CouponForm};
use crate::state::AppState;

// ===== Coupons =====

/// GET /api/coupons
pub async fn coupons(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<Vec<Coupon>>> {
    Ok(Json(promotions::list_coupons(state.backend()).await?))
}

/// POST /api/coupons
#[instrument(skip(state, admin, form), fields(admin_id = %admin.id, code = %form.code))]
pub async fn create_coupon(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(form): Json<CouponForm>,
) -> Result<(StatusCode, Json<Coupon>)> {
    let coupon = promotions::create_coupon(state.backend(), form).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// PUT /api/coupons/{id}
#[instrument(skip(state, admin, form), fields(admin_id = %admin.id))]
pub async fn update_coupon(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CouponId>,
    Json(form): Json<CouponForm>,
) -> Result<Json<Coupon>> {
    Ok(Json(
        promotions::update_coupon(state.backend(), id, form).await?,
    ))
}

/// DELETE /api/coupons/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_coupon(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CouponId>,
) -> Result<StatusCode> {
    promotions::delete_coupon(state.backend(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ===== Card offers =====

/// GET /api/card-offers
pub async fn card_offers(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<Json<Vec<CardOffer>>> {
    Ok(Json(promotions::list_card_offers(state.backend()).await?))
}

/// POST /api/card-offers
#[instrument(skip(state, admin, form), fields(admin_id = %admin.id))]
pub async fn create_card_offer(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Json(form): Json<CardOfferForm>,
) -> Result<(StatusCode, Json<CardOffer>)> {
    let offer = promotions::create_card_offer(state.backend(), form).await?;
    Ok((StatusCode::CREATED, Json(offer)))
}

/// PUT /api/card-offers/{id}
#[instrument(skip(state, admin, form), fields(admin_id = %admin.id))]
pub async fn update_card_offer(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CardOfferId>,
    Json(form): Json<CardOfferForm>,
) -> Result<Json<CardOffer>> {
    Ok(Json(
        promotions::update_card_offer(state.backend(), id, form).await?,
    ))
}

/// DELETE /api/card-offers/{id}
#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn delete_card_offer(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CardOfferId>,
) -> Result<StatusCode> {
    promotions::delete_card_offer(state.backend(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
