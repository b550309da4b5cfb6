//! Checkout price composition.
//!
//! [`compose`] turns a list of priced lines plus an optional coupon, card
//! offer and wallet balance into a [`PriceBreakdown`]. It is pure: callers
//! load current prices and offers, and the result is what the customer is
//! charged.
//!
//! ```text
//! subtotal  = Σ unit_price × quantity
//! shipping  = 0 if subtotal > free_shipping_threshold else shipping_fee
//! tax       = round2(subtotal × tax_rate)
//! coupon    = coupon rule on subtotal
//! card      = card offer rule on (subtotal − coupon)
//! wallet    = min(balance, round2(wallet_cap × (subtotal + shipping + tax − coupon − card)))
//! total     = max(0, subtotal + shipping + tax − coupon − card − wallet)
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::coupon::{CardOffer, CardOfferRejection, Coupon, CouponRejection};
use crate::types::Money;

/// Store-wide pricing knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Flat shipping fee charged at or below the threshold.
    pub shipping_fee: Money,
    /// Subtotals strictly above this ship free.
    pub free_shipping_threshold: Money,
    /// Tax as a fraction of the subtotal (0.18 = 18%).
    pub tax_rate: Decimal,
    /// Cash on delivery is unavailable when the total reaches this amount.
    pub cod_limit: Money,
    /// Share of the pre-wallet total that wallet coins may cover (0.5 = 50%).
    pub wallet_cap: Decimal,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            shipping_fee: Money::from_rupees(25),
            free_shipping_threshold: Money::from_rupees(500),
            tax_rate: Decimal::new(18, 2),
            cod_limit: Money::from_rupees(5000),
            wallet_cap: Decimal::new(5, 1),
        }
    }
}

impl PricingPolicy {
    /// Shipping fee for a subtotal.
    #[must_use]
    pub fn shipping_for(&self, subtotal: Money) -> Money {
        if subtotal > self.free_shipping_threshold {
            Money::ZERO
        } else {
            self.shipping_fee
        }
    }

    /// Tax for a subtotal.
    #[must_use]
    pub fn tax_for(&self, subtotal: Money) -> Money {
        subtotal.times_rate(self.tax_rate)
    }

    /// Whether cash on delivery may be offered for a total.
    #[must_use]
    pub fn cod_available(&self, total: Money) -> bool {
        total < self.cod_limit
    }
}

/// A line as priced for checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricedLine {
    pub unit_price: Money,
    pub quantity: u32,
}

/// Everything [`compose`] needs.
#[derive(Debug, Clone, Copy)]
pub struct PricingInput<'a> {
    pub lines: &'a [PricedLine],
    pub coupon: Option<&'a Coupon>,
    pub card_offer: Option<&'a CardOffer>,
    pub wallet_balance: Money,
    pub use_wallet: bool,
    pub now: DateTime<Utc>,
}

/// Errors from price composition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    #[error("price cannot be negative")]
    NegativePrice,
    #[error(transparent)]
    Coupon(#[from] CouponRejection),
    #[error(transparent)]
    CardOffer(#[from] CardOfferRejection),
}

/// The composed price of a checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PriceBreakdown {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub coupon_discount: Money,
    pub card_discount: Money,
    pub wallet_used: Money,
    pub total: Money,
    pub cod_available: bool,
}

impl PriceBreakdown {
    /// Total before wallet coins are applied.
    #[must_use]
    pub fn pre_wallet_total(&self) -> Money {
        (self.subtotal + self.shipping + self.tax - self.coupon_discount - self.card_discount)
            .non_negative()
    }
}

/// Sum of the lines.
///
/// # Errors
///
/// Returns [`PricingError`] for an empty list, a zero quantity or a negative price.
pub fn subtotal(lines: &[PricedLine]) -> Result<Money, PricingError> {
    if lines.is_empty() {
        return Err(PricingError::EmptyCart);
    }
    lines
        .iter()
        .map(|line| {
            if line.quantity == 0 {
                Err(PricingError::InvalidQuantity)
            } else if line.unit_price.is_negative() {
                Err(PricingError::NegativePrice)
            } else {
                Ok(line.unit_price * line.quantity)
            }
        })
        .sum::<Result<Money, _>>()
}

/// Compose the full price breakdown.
///
/// # Errors
///
/// Returns [`PricingError`] if the lines are invalid or the coupon/card offer
/// does not apply.
pub fn compose(policy: &PricingPolicy, input: &PricingInput<'_>) -> Result<PriceBreakdown, PricingError> {
    let subtotal = subtotal(input.lines)?;
    let shipping = policy.shipping_for(subtotal);
    let tax = policy.tax_for(subtotal);

    let coupon_discount = match input.coupon {
        Some(coupon) => {
            coupon.check(subtotal, input.now)?;
            coupon.discount(subtotal)
        }
        None => Money::ZERO,
    };

    let after_coupon = subtotal.saturating_sub(coupon_discount);
    let card_discount = match input.card_offer {
        Some(offer) => {
            offer.check(after_coupon)?;
            offer.discount(after_coupon)
        }
        None => Money::ZERO,
    };

    let mut breakdown = PriceBreakdown {
        subtotal,
        shipping,
        tax,
        coupon_discount,
        card_discount,
        ..PriceBreakdown::default()
    };

    let pre_wallet = breakdown.pre_wallet_total();
    breakdown.wallet_used = if input.use_wallet && !input.wallet_balance.is_zero() {
        input
            .wallet_balance
            .non_negative()
            .min(pre_wallet.times_rate(policy.wallet_cap))
    } else {
        Money::ZERO
    };

    breakdown.total = pre_wallet.saturating_sub(breakdown.wallet_used);
    breakdown.cod_available = policy.cod_available(breakdown.total);
    Ok(breakdown)
}
