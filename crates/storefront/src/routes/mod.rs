//! HTTP route handlers for storefront.
//!
//! Every endpoint speaks JSON; errors are `{"error": "..."}`.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Platform reachability
//!
//! # Auth (rate limited)
//! POST /api/auth/sign-up                - Create account, merge guest state
//! POST /api/auth/sign-in                - Sign in, merge guest state
//! POST /api/auth/sign-out               - Sign out
//! GET  /api/auth/session                - Who is signed in
//!
//! # Catalog
//! GET  /api/products                    - Filtered, sorted listing
//! GET  /api/products/categories         - Category names
//! GET  /api/products/{id}               - Detail, related, reviews
//! GET  /api/products/{id}/reviews       - Reviews and rating summary
//! POST /api/products/{id}/reviews       - Review a product (multipart)
//!
//! # Cart & wishlist (guests included)
//! GET    /api/cart                      - Cart view
//! DELETE /api/cart                      - Empty the cart
//! POST   /api/cart/items                - Add a product
//! PUT    /api/cart/items/{product_id}   - Set quantity
//! DELETE /api/cart/items/{product_id}   - Remove a line
//! POST   /api/cart/coupon               - Apply a coupon
//! DELETE /api/cart/coupon               - Remove the coupon
//! PUT    /api/cart/card-offer           - Select a card offer
//! PUT    /api/cart/wallet               - Toggle wallet coins
//! GET    /api/wishlist                  - Wishlist products
//! POST   /api/wishlist                  - Add a product
//! DELETE /api/wishlist/{product_id}     - Remove a product
//! POST   /api/wishlist/{product_id}/move-to-cart
//!
//! # Checkout (requires auth, rate limited)
//! POST /api/checkout/quote              - Signed price quote for the cart
//! POST /api/checkout/orders             - Place an order (Idempotency-Key)
//!
//! # Orders & returns (requires auth)
//! GET  /api/orders                      - Order history
//! GET  /api/orders/{id}                 - Order detail
//! GET  /api/orders/{id}/invoice         - Invoice summary
//! POST /api/orders/{id}/cancel          - Cancel
//! POST /api/orders/{id}/return          - Request a return
//! GET  /api/orders/{id}/tracking        - Tracking snapshot
//! GET  /api/orders/{id}/tracking/stream - Live tracking (SSE)
//! GET  /api/returns                     - Return requests
//!
//! # Account (requires auth)
//! GET  /api/account                     - Profile
//! PUT  /api/account                     - Update name and phone
//! GET  /api/account/wallet              - Balance, ledger, referrals
//! POST /api/account/referral            - Redeem a referral code
//! GET  /api/account/addresses           - Address book
//! POST /api/account/addresses           - Add an address
//! PUT  /api/account/addresses/{id}      - Edit an address
//! DELETE /api/account/addresses/{id}    - Delete an address
//! POST /api/account/addresses/{id}/default
//!
//! # Delivery partners (requires courier role)
//! GET  /api/courier/deliveries                 - Assigned deliveries
//! POST /api/courier/deliveries/{id}/verify     - Check a scanned QR code
//! POST /api/courier/deliveries/{id}/status     - Status change with QR code
//! POST /api/courier/deliveries/{id}/location   - Location fix
//! ```

pub mod account;
pub mod auth;
pub mod cart;
pub mod checkout;
pub mod courier;
pub mod orders;
pub mod products;
pub mod wishlist;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::middleware::{auth_rate_limiter, checkout_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/sign-up", post(auth::sign_up))
        .route("/sign-in", post(auth::sign_in))
        .layer(auth_rate_limiter())
        .route("/sign-out", post(auth::sign_out))
        .route("/session", get(auth::current))
}

/// Create the product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/categories", get(products::categories))
        .route("/{id}", get(products::show))
        .route(
            "/{id}/reviews",
            get(products::reviews).post(products::create_review),
        )
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route(
            "/items/{product_id}",
            put(cart::update).delete(cart::remove),
        )
        .route(
            "/coupon",
            post(cart::apply_coupon).delete(cart::remove_coupon),
        )
        .route("/card-offer", put(cart::select_card_offer))
        .route("/wallet", put(cart::use_wallet))
}

/// Create the wishlist routes router.
pub fn wishlist_routes() -> Router<AppState> {
    use axum::routing::delete;

    Router::new()
        .route("/", get(wishlist::show).post(wishlist::add))
        .route("/{product_id}", delete(wishlist::remove))
        .route("/{product_id}/move-to-cart", post(wishlist::move_to_cart))
}

/// Create the checkout routes router.
pub fn checkout_routes() -> Router<AppState> {
    Router::new()
        .route("/quote", post(checkout::quote))
        .route("/orders", post(checkout::place))
        .layer(checkout_rate_limiter())
}

/// Create the order routes router.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(orders::index))
        .route("/{id}", get(orders::show))
        .route("/{id}/invoice", get(orders::invoice))
        .route("/{id}/cancel", post(orders::cancel))
        .route("/{id}/return", post(orders::request_return))
        .route("/{id}/tracking", get(orders::tracking))
        .route("/{id}/tracking/stream", get(orders::tracking_stream))
}

/// Create the account routes router.
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(account::profile).put(account::update_profile))
        .route("/wallet", get(account::wallet))
        .route("/referral", post(account::apply_referral))
        .route(
            "/addresses",
            get(account::addresses).post(account::create_address),
        )
        .route(
            "/addresses/{id}",
            put(account::update_address).delete(account::delete_address),
        )
        .route("/addresses/{id}/default", post(account::set_default_address))
}

/// Create the delivery-partner routes router.
pub fn courier_routes() -> Router<AppState> {
    Router::new()
        .route("/deliveries", get(courier::deliveries))
        .route("/deliveries/{id}/verify", post(courier::verify))
        .route("/deliveries/{id}/status", post(courier::transition))
        .route("/deliveries/{id}/location", post(courier::location))
}

/// Create all API routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/api/auth", auth_routes())
        .nest("/api/products", product_routes())
        .nest("/api/cart", cart_routes())
        .nest("/api/wishlist", wishlist_routes())
        .nest("/api/checkout", checkout_routes())
        .nest("/api/orders", order_routes())
        .route("/api/returns", get(orders::returns_index))
        .nest("/api/account", account_routes())
        .nest("/api/courier", courier_routes())
}
