//! Cart and checkout-selection route handlers.
//!
//! Guests and signed-in shoppers use the same endpoints; the shopper
//! service decides whether state lives in the session or on the platform.
//! Every mutation answers with the updated cart.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use bazaar_core::shopper::ShopperAction;
use bazaar_core::{CardOfferId, Money, ProductId};

use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::services::shopper::{CartView, ShopperService};
use crate::state::AppState;

/// Add to cart request body.
#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
}

const fn one() -> u32 {
    1
}

/// Quantity update body. Zero removes the line.
#[derive(Debug, Deserialize)]
pub struct QuantityRequest {
    pub quantity: u32,
}

/// Coupon body.
#[derive(Debug, Deserialize)]
pub struct CouponRequest {
    pub code: String,
}

/// Card offer selection body. `null` clears it.
#[derive(Debug, Deserialize)]
pub struct CardOfferRequest {
    pub card_offer_id: Option<CardOfferId>,
}

/// Wallet toggle body.
#[derive(Debug, Deserialize)]
pub struct WalletRequest {
    pub use_wallet: bool,
}

/// Cart after a coupon was applied.
#[derive(Debug, Serialize)]
pub struct CouponApplied {
    pub cart: CartView,
    /// Discount on the current subtotal.
    pub discount: Money,
}

async fn run(
    state: &AppState,
    session: &Session,
    user: Option<&crate::models::CurrentUser>,
    action: ShopperAction,
) -> Result<Json<CartView>> {
    let shopper = ShopperService::new(state.backend(), session, user);
    let next = shopper.dispatch(action).await?;
    Ok(Json(shopper.cart_view(&next).await?))
}

/// GET /api/cart
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>> {
    let shopper = ShopperService::new(state.backend(), &session, user.as_ref());
    let current = shopper.load().await?;
    Ok(Json(shopper.cart_view(&current).await?))
}

/// POST /api/cart/items
#[instrument(skip(state, session, user))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(req): Json<AddToCartRequest>,
) -> Result<Json<CartView>> {
    let action = ShopperAction::AddToCart {
        product_id: req.product_id,
        quantity: req.quantity,
    };
    run(&state, &session, user.as_ref(), action).await
}

/// PUT /api/cart/items/{product_id}
#[instrument(skip(state, session, user))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(product_id): Path<ProductId>,
    Json(req): Json<QuantityRequest>,
) -> Result<Json<CartView>> {
    let action = ShopperAction::SetQuantity {
        product_id,
        quantity: req.quantity,
    };
    run(&state, &session, user.as_ref(), action).await
}

/// DELETE /api/cart/items/{product_id}
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    let action = ShopperAction::RemoveFromCart { product_id };
    run(&state, &session, user.as_ref(), action).await
}

/// DELETE /api/cart
pub async fn clear(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>> {
    run(&state, &session, user.as_ref(), ShopperAction::ClearCart).await
}

/// Check and select a coupon.
///
/// POST /api/cart/coupon
#[instrument(skip(state, session, user, req))]
pub async fn apply_coupon(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(req): Json<CouponRequest>,
) -> Result<Json<CouponApplied>> {
    let shopper = ShopperService::new(state.backend(), &session, user.as_ref());
    let (next, discount) = shopper.apply_coupon(&req.code).await?;
    Ok(Json(CouponApplied {
        cart: shopper.cart_view(&next).await?,
        discount,
    }))
}

/// DELETE /api/cart/coupon
pub async fn remove_coupon(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<CartView>> {
    run(&state, &session, user.as_ref(), ShopperAction::RemoveCoupon).await
}

/// PUT /api/cart/card-offer
pub async fn select_card_offer(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(req): Json<CardOfferRequest>,
) -> Result<Json<CartView>> {
    let action = ShopperAction::SelectCardOffer {
        card_offer_id: req.card_offer_id,
    };
    run(&state, &session, user.as_ref(), action).await
}

/// PUT /api/cart/wallet
pub async fn use_wallet(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(req): Json<WalletRequest>,
) -> Result<Json<CartView>> {
    let action = ShopperAction::SetUseWallet {
        use_wallet: req.use_wallet,
    };
    run(&state, &session, user.as_ref(), action).await
}
