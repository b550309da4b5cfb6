//! Conversions from raw platform rows to domain types.
//!
//! Rows written by older clients or by hand in the dashboard can miss
//! columns. Products get placeholders for anything missing; orders are
//! stricter because their amounts are what the customer paid.

mod coupons;
mod orders;
mod products;

pub use coupons::{card_offer_from_row, card_offer_to_row, coupon_from_row, coupon_to_row};
pub use orders::{order_from_rows, order_to_rows};
pub use products::{PLACEHOLDER_IMAGE, product_from_row, product_to_row};

use thiserror::Error;

/// A row that cannot be turned into a domain value.
#[derive(Debug, Error)]
#[error("invalid {table} row {id}: {reason}")]
pub struct ConversionError {
    pub table: &'static str,
    pub id: String,
    pub reason: String,
}
