//! Account route handlers: profile, wallet, referrals and the address book.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::instrument;

use bazaar_core::AddressId;
use bazaar_core::models::{Address, AddressForm, Profile, Referral};

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::account::{self, ProfileUpdate};
use crate::services::addresses;
use crate::services::wallet::{self, WalletSummary};
use crate::state::AppState;

/// Referral redemption body.
#[derive(Debug, Deserialize)]
pub struct ReferralRequest {
    pub code: String,
}

// =============================================================================
// Profile
// =============================================================================

/// GET /api/account
pub async fn profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Profile>> {
    Ok(Json(account::profile(state.backend(), user.id).await?))
}

/// PUT /api/account
#[instrument(skip(state, user, update), fields(user_id = %user.id))]
pub async fn update_profile(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>> {
    Ok(Json(
        account::update_profile(state.backend(), user.id, &update).await?,
    ))
}

// =============================================================================
// Wallet & Referrals
// =============================================================================

/// GET /api/account/wallet
pub async fn wallet(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<WalletSummary>> {
    Ok(Json(wallet::summary(state.backend(), user.id).await?))
}

/// POST /api/account/referral
#[instrument(skip(state, user, req), fields(user_id = %user.id))]
pub async fn apply_referral(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(req): Json<ReferralRequest>,
) -> Result<(StatusCode, Json<Referral>)> {
    let referral = wallet::apply_referral(state.backend(), user.id, req.code.trim()).await?;
    Ok((StatusCode::CREATED, Json(referral)))
}

// =============================================================================
// Addresses
// =============================================================================

/// GET /api/account/addresses
pub async fn addresses(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Address>>> {
    Ok(Json(addresses::list(state.backend(), user.id).await?))
}

/// POST /api/account/addresses
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn create_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Json(form): Json<AddressForm>,
) -> Result<(StatusCode, Json<Address>)> {
    let address = addresses::create(state.backend(), user.id, &form).await?;
    Ok((StatusCode::CREATED, Json(address)))
}

/// PUT /api/account/addresses/{id}
#[instrument(skip(state, user, form), fields(user_id = %user.id))]
pub async fn update_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
    Json(form): Json<AddressForm>,
) -> Result<Json<Address>> {
    Ok(Json(
        addresses::update(state.backend(), user.id, id, &form).await?,
    ))
}

/// POST /api/account/addresses/{id}/default
pub async fn set_default_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<Json<Address>> {
    Ok(Json(
        addresses::set_default(state.backend(), user.id, id).await?,
    ))
}

/// DELETE /api/account/addresses/{id}
pub async fn delete_address(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Path(id): Path<AddressId>,
) -> Result<StatusCode> {
    addresses::delete(state.backend(), user.id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
