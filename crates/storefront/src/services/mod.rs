//! Business logic services for storefront.
//!
//! Handlers stay thin: they extract the session and account, then call one
//! of these. Services borrow the platform [`Backend`](bazaar_platform::Backend)
//! and speak in domain types from `bazaar-core`.
//!
//! # Services
//!
//! - `catalog` - cached product listing, detail, categories
//! - `shopper` - cart, wishlist and checkout selections through the reducer
//! - `account` - sign up, sign in, profile, guest merge
//! - `addresses` - saved shipping addresses
//! - `checkout` - signed quotes and the placement saga
//! - `orders` - history, cancellation, invoices
//! - `returns` - return requests
//! - `wallet` - balance, ledger, referrals
//! - `reviews` - product reviews and rating summaries
//! - `tracking` - customer-side delivery tracking
//! - `courier` - delivery-partner handoff and location ingest

pub mod account;
pub mod addresses;
pub mod catalog;
pub mod checkout;
pub mod courier;
pub mod orders;
pub mod returns;
pub mod reviews;
pub mod shopper;
pub mod tracking;
pub mod wallet;
