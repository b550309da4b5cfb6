//! HTTP route handlers for admin.
//!
//! Every endpoint except sign-in requires an admin session.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Platform reachability
//!
//! # Auth
//! POST /api/auth/sign-in                - Sign in (rate limited)
//! POST /api/auth/sign-out               - Sign out
//! GET  /api/auth/session                - Who is signed in
//!
//! # Dashboard
//! GET  /api/dashboard                   - Counts, revenue, low stock
//!
//! # Catalog
//! GET    /api/products                  - All products, hidden included
//! POST   /api/products                  - Create
//! GET    /api/products/{id}             - Detail
//! PUT    /api/products/{id}             - Update
//! POST   /api/products/{id}/activate    - Show in the storefront
//! POST   /api/products/{id}/deactivate  - Hide from the storefront
//! POST   /api/products/{id}/images      - Upload a photo (multipart)
//! DELETE /api/products/{id}/images      - Remove a photo by URL
//! POST   /api/products/{id}/stock       - Adjust stock
//!
//! # Orders
//! GET  /api/orders?status=&limit=       - List
//! GET  /api/orders/{id}                 - Detail
//! POST /api/orders/{id}/status          - Lifecycle transition
//!
//! # Promotions
//! GET    /api/coupons                   - List
//! POST   /api/coupons                   - Create
//! PUT    /api/coupons/{id}              - Update
//! DELETE /api/coupons/{id}              - Delete
//! GET    /api/card-offers               - List
//! POST   /api/card-offers               - Create
//! PUT    /api/card-offers/{id}          - Update
//! DELETE /api/card-offers/{id}          - Delete
//!
//! # Deliveries
//! GET  /api/deliveries?status=          - List
//! POST /api/deliveries                  - Open a delivery for an order
//! GET  /api/deliveries/{id}             - Detail
//! POST /api/deliveries/{id}/assign      - Assign a courier, mint QR code
//! POST /api/deliveries/{id}/cancel      - Cancel
//! GET  /api/couriers                    - Delivery partners and workload
//!
//! # Returns
//! GET  /api/returns?status=             - List
//! GET  /api/returns/{id}                - Detail
//! POST /api/returns/{id}/approve        - Approve
//! POST /api/returns/{id}/reject         - Reject
//! POST /api/returns/{id}/pickup         - Parcel collected
//! POST /api/returns/{id}/refund         - Refund to wallet
//! ```

pub mod auth;
pub mod dashboard;
pub mod deliveries;
pub mod orders;
pub mod products;
pub mod promotions;
pub mod returns;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};

use crate::middleware::sign_in_rate_limiter;
use crate::services::products::MAX_IMAGE_BYTES;
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/sign-in", post(auth::sign_in))
        .layer(sign_in_rate_limiter())
        .route("/sign-out", post(auth::sign_out))
        .route("/session", get(auth::current))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index).post(products::create))
        .route("/{id}", get(products::show).put(products::update))
        .route("/{id}/activate", post(products::activate))
        .route("/{id}/deactivate", post(products::deactivate))
        .route(
            "/{id}/images",
            post(products::upload_image)
                .delete(products::remove_image)
                // Headroom for the multipart framing around one photo.
                .layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES + 64 * 1024)),
        )
        .route("/{id}/stock", post(products::adjust_stock))
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/status", post(orders::transition))
}

/// Create the coupon routes router.
pub fn coupon_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(promotions::coupons).post(promotions::create_coupon))
        .route(
            "/{id}",
            put(promotions::update_coupon).delete(promotions::delete_coupon),
        )
}

/// Create the card-offer routes router.
pub fn card_offer_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(promotions::card_offers).post(promotions::create_card_offer),
        )
        .route(
            "/{id}",
            put(promotions::update_card_offer).delete(promotions::delete_card_offer),
        )
}

/// Create the delivery routes router.
pub fn delivery_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(deliveries::index).post(deliveries::create))
        .route("/{id}", get(deliveries::show))
        .route("/{id}/assign", post(deliveries::assign))
        .route("/{id}/cancel", post(deliveries::cancel))
}

/// Create the return routes router.
pub fn return_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(returns::index))
        .route("/{id}", get(returns::show))
        .route("/{id}/approve", post(returns::approve))
        .route("/{id}/reject", post(returns::reject))
        .route("/{id}/pickup", post(returns::pickup))
        .route("/{id}/refund", post(returns::refund))
}

/// Create all API routes for admin.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/auth", auth_routes())
        .route("/api/dashboard", get(dashboard::show))
        .nest("/api/products", product_routes())
        .nest("/api/orders", order_routes())
        .nest("/api/coupons", coupon_routes())
        .nest("/api/card-offers", card_offer_routes())
        .nest("/api/deliveries", delivery_routes())
        .route("/api/couriers", get(deliveries::couriers))
        .nest("/api/returns", return_routes())
}
