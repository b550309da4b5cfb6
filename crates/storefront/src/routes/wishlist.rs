//! Wishlist route handlers.

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use tower_sessions::Session;

use bazaar_core::ProductId;
use bazaar_core::models::Product;
use bazaar_core::shopper::ShopperAction;

use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::services::shopper::{CartView, ShopperService};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WishlistRequest {
    pub product_id: ProductId,
}

/// GET /api/wishlist
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> Result<Json<Vec<Product>>> {
    let shopper = ShopperService::new(state.backend(), &session, user.as_ref());
    let current = shopper.load().await?;
    Ok(Json(shopper.wishlist_products(&current).await?))
}

/// POST /api/wishlist
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Json(req): Json<WishlistRequest>,
) -> Result<Json<Vec<Product>>> {
    let shopper = ShopperService::new(state.backend(), &session, user.as_ref());
    let next = shopper
        .dispatch(ShopperAction::AddToWishlist {
            product_id: req.product_id,
        })
        .await?;
    Ok(Json(shopper.wishlist_products(&next).await?))
}

/// DELETE /api/wishlist/{product_id}
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<Vec<Product>>> {
    let shopper = ShopperService::new(state.backend(), &session, user.as_ref());
    let next = shopper
        .dispatch(ShopperAction::RemoveFromWishlist { product_id })
        .await?;
    Ok(Json(shopper.wishlist_products(&next).await?))
}

/// Move a wishlisted product into the cart.
///
/// POST /api/wishlist/{product_id}/move-to-cart
pub async fn move_to_cart(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(product_id): Path<ProductId>,
) -> Result<Json<CartView>> {
    let shopper = ShopperService::new(state.backend(), &session, user.as_ref());
    let next = shopper.move_to_cart(product_id).await?;
    Ok(Json(shopper.cart_view(&next).await?))
}
