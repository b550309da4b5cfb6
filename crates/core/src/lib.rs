//! Bazaar Core - shared domain library.
//!
//! This crate provides the types and rules used across all Bazaar components:
//! - `platform` - Backend client for the hosted data platform
//! - `storefront` - Customer shop and delivery-partner portal
//! - `admin` - Back office
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. Pricing, coupon validation, status
//! transitions and token signing all live here so both binaries enforce the
//! same rules.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, contact details and statuses
//! - [`models`] - Domain records (products, orders, deliveries, ...)
//! - [`pricing`] - Checkout price composition
//! - [`quote`] - Signed pricing quotes
//! - [`token`] - HMAC-signed expiring tokens
//! - [`shopper`] - Session state reducer and guest merge planning

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod models;
pub mod pricing;
pub mod quote;
pub mod shopper;
pub mod token;
pub mod types;

pub use types::*;
