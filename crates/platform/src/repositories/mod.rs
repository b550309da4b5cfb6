//! Typed access to platform tables.
//!
//! Each repository borrows a [`Backend`] and speaks domain types. Shared
//! counters (stock, coupon usage, wallet balance) are updated with
//! compare-and-set: the update filters on the value that was read, and an
//! empty result means another writer got there first, so the read is
//! repeated up to [`CAS_ATTEMPTS`] times.
//!
//! # Tables
//!
//! - `products`, `coupons`, `card_offers` - catalog and promotions
//! - `orders`, `order_items` - placed orders and their item snapshots
//! - `profiles`, `wallet_transactions`, `referrals` - accounts and coins
//! - `addresses`, `cart_items`, `wishlist`, `reviews`, `returns`
//! - `deliveries`, `delivery_location_tracking` - courier handoff
//! - `checkout_sagas`, `merge_requests` - idempotency records

pub mod addresses;
pub mod card_offers;
pub mod cart;
pub mod coupons;
pub mod deliveries;
pub mod locations;
pub mod merges;
pub mod orders;
pub mod products;
pub mod profiles;
pub mod referrals;
pub mod returns;
pub mod reviews;
pub mod sagas;
pub mod wallet;
pub mod wishlist;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use bazaar_core::models::WalletError;
use bazaar_core::{Money, ProductId};

use crate::backend::Row;
use crate::conversions::ConversionError;
use crate::error::BackendError;

pub use addresses::AddressRepository;
pub use card_offers::CardOfferRepository;
pub use cart::CartRepository;
pub use coupons::CouponRepository;
pub use deliveries::DeliveryRepository;
pub use locations::LocationRepository;
pub use merges::{MergeRepository, MergeState};
pub use orders::OrderRepository;
pub use products::ProductRepository;
pub use profiles::ProfileRepository;
pub use referrals::ReferralRepository;
pub use returns::ReturnRepository;
pub use reviews::ReviewRepository;
pub use sagas::{SagaRecord, SagaRepository, SagaStart, SagaStep};
pub use wallet::WalletRepository;
pub use wishlist::WishlistRepository;

/// How many times a compare-and-set update is attempted.
pub const CAS_ATTEMPTS: u32 = 5;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// The platform call failed.
    #[error("platform error: {0}")]
    Backend(BackendError),

    /// Data in the platform is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation or a concurrent change to the same row.
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// Compare-and-set kept losing to other writers.
    #[error("too much contention on {0}")]
    Contention(&'static str),

    #[error("only {available} left of product {product_id}, {requested} requested")]
    InsufficientStock {
        product_id: ProductId,
        available: u32,
        requested: u32,
    },

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error("coupon {code} has reached its usage limit")]
    UsageLimitReached { code: String },
}

impl From<BackendError> for RepositoryError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Conflict { message, .. } => Self::Conflict(message),
            other => Self::Backend(other),
        }
    }
}

impl From<ConversionError> for RepositoryError {
    fn from(err: ConversionError) -> Self {
        Self::DataCorruption(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::DataCorruption(err.to_string())
    }
}

/// Serialize a value into a row.
pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Row, RepositoryError> {
    match serde_json::to_value(value)? {
        Value::Object(row) => Ok(row),
        other => Err(RepositoryError::DataCorruption(format!(
            "expected an object, got {other}"
        ))),
    }
}

pub(crate) fn decode<T: DeserializeOwned>(row: Row) -> Result<T, RepositoryError> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

pub(crate) fn decode_all<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, RepositoryError> {
    rows.into_iter().map(decode).collect()
}

/// First decoded row, if any.
pub(crate) fn decode_first<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Option<T>, RepositoryError> {
    rows.into_iter().next().map(decode).transpose()
}

/// Build a patch from column/value pairs.
pub(crate) fn patch<const N: usize>(fields: [(&str, Value); N]) -> Row {
    fields
        .into_iter()
        .map(|(column, value)| (column.to_owned(), value))
        .collect()
}

/// Decimal columns are compared as text so the filter matches what was read.
pub(crate) fn money_value(amount: Money) -> Value {
    Value::String(amount.amount().to_string())
}
