//! Coupons, card offers and the discount rule they share.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CardOfferId, CouponId, Money};

/// Whether a discount is a percentage of the base amount or a flat amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    Percent,
    Flat,
}

/// A discount amount with an optional cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountRule {
    pub kind: DiscountKind,
    /// Percent (0-100) for [`DiscountKind::Percent`], rupees for [`DiscountKind::Flat`].
    pub value: Decimal,
    /// Upper bound on the discount, if any.
    pub max_discount: Option<Money>,
}

impl DiscountRule {
    /// Discount this rule gives on `base`. Never more than `base`.
    #[must_use]
    pub fn discount_on(&self, base: Money) -> Money {
        let raw = match self.kind {
            DiscountKind::Percent => base.percent(self.value),
            DiscountKind::Flat => Money::new(self.value),
        }
        .non_negative();

        let capped = match self.max_discount {
            Some(cap) if raw > cap => cap,
            _ => raw,
        };
        capped.min(base)
    }

    /// `true` if the value makes sense for the kind.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let value_ok = match self.kind {
            DiscountKind::Percent => {
                self.value > Decimal::ZERO && self.value <= Decimal::ONE_HUNDRED
            }
            DiscountKind::Flat => self.value > Decimal::ZERO,
        };
        value_ok && self.max_discount.is_none_or(|cap| !cap.is_negative())
    }
}

/// Why a coupon cannot be applied. `Display` is the customer-facing reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CouponRejection {
    #[error("Invalid coupon code")]
    NotFound,
    #[error("This coupon is no longer active")]
    Inactive,
    #[error("This coupon is not valid yet")]
    NotYetValid { valid_from: DateTime<Utc> },
    #[error("This coupon has expired")]
    Expired { valid_until: DateTime<Utc> },
    #[error("Minimum purchase of {minimum} required for this coupon")]
    BelowMinimumPurchase { minimum: Money },
    #[error("This coupon has reached its usage limit")]
    UsageLimitReached,
}

/// A promotional coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    /// Stored upper-case; lookups are case-insensitive.
    pub code: String,
    pub description: String,
    pub rule: DiscountRule,
    pub min_purchase: Money,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub usage_limit: Option<u32>,
    pub usage_count: u32,
    pub is_active: bool,
}

impl Coupon {
    /// Normalize a code as typed by a customer.
    #[must_use]
    pub fn normalize_code(code: &str) -> String {
        code.trim().to_uppercase()
    }

    /// Check whether the coupon applies to a cart with this subtotal at `now`.
    ///
    /// Checks run in a fixed order so the customer sees the most relevant
    /// reason: active flag, validity window, minimum purchase, usage cap.
    ///
    /// # Errors
    ///
    /// Returns the first [`CouponRejection`] that applies.
    pub fn check(&self, subtotal: Money, now: DateTime<Utc>) -> Result<(), CouponRejection> {
        if !self.is_active {
            return Err(CouponRejection::Inactive);
        }
        if let Some(valid_from) = self.valid_from
            && now < valid_from
        {
            return Err(CouponRejection::NotYetValid { valid_from });
        }
        if let Some(valid_until) = self.valid_until
            && now > valid_until
        {
            return Err(CouponRejection::Expired { valid_until });
        }
        if subtotal < self.min_purchase {
            return Err(CouponRejection::BelowMinimumPurchase {
                minimum: self.min_purchase,
            });
        }
        if self.usage_limit.is_some_and(|limit| self.usage_count >= limit) {
            return Err(CouponRejection::UsageLimitReached);
        }
        Ok(())
    }

    /// Discount on the given subtotal. Does not re-run [`Coupon::check`].
    #[must_use]
    pub fn discount(&self, subtotal: Money) -> Money {
        self.rule.discount_on(subtotal)
    }
}

/// Which cards a card offer applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Credit,
    Debit,
    #[default]
    Any,
}

/// Why a card offer cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum CardOfferRejection {
    #[error("Card offer not found")]
    NotFound,
    #[error("This card offer is no longer active")]
    Inactive,
    #[error("Minimum order of {minimum} required for this card offer")]
    BelowMinimumAmount { minimum: Money },
}

/// A bank or card specific discount, distinct from a coupon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardOffer {
    pub id: CardOfferId,
    pub bank_name: String,
    pub card_type: CardType,
    pub description: String,
    pub rule: DiscountRule,
    pub min_amount: Money,
    pub is_active: bool,
}

impl CardOffer {
    /// Check whether the offer applies to `amount`.
    ///
    /// # Errors
    ///
    /// Returns [`CardOfferRejection`] if inactive or below the minimum.
    pub fn check(&self, amount: Money) -> Result<(), CardOfferRejection> {
        if !self.is_active {
            return Err(CardOfferRejection::Inactive);
        }
        if amount < self.min_amount {
            return Err(CardOfferRejection::BelowMinimumAmount {
                minimum: self.min_amount,
            });
        }
        Ok(())
    }

    /// Discount on `amount`.
    #[must_use]
    pub fn discount(&self, amount: Money) -> Money {
        self.rule.discount_on(amount)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use chrono::Duration;

    use super::*;

    pub(crate) fn coupon(code: &str, kind: DiscountKind, value: i64) -> Coupon {
        Coupon {
            id: CouponId::random(),
            code: code.to_string(),
            description: String::new(),
            rule: DiscountRule {
                kind,
                value: Decimal::from(value),
                max_discount: None,
            },
            min_purchase: Money::ZERO,
            valid_from: None,
            valid_until: None,
            usage_limit: None,
            usage_count: 0,
            is_active: true,
        }
    }

    #[test]
    fn test_percent_discount_with_cap() {
        let mut c = coupon("SAVE10", DiscountKind::Percent, 10);
        assert_eq!(c.discount(Money::from_rupees(400)), Money::from_rupees(40));
        c.rule.max_discount = Some(Money::from_rupees(25));
        assert_eq!(c.discount(Money::from_rupees(400)), Money::from_rupees(25));
    }

    #[test]
    fn test_flat_discount_never_exceeds_base() {
        let c = coupon("FLAT500", DiscountKind::Flat, 500);
        assert_eq!(c.discount(Money::from_rupees(300)), Money::from_rupees(300));
    }

    #[test]
    fn test_rejects_inactive() {
        let mut c = coupon("X", DiscountKind::Flat, 10);
        c.is_active = false;
        assert_eq!(
            c.check(Money::from_rupees(100), Utc::now()),
            Err(CouponRejection::Inactive)
        );
    }

    #[test]
    fn test_rejects_before_valid_from() {
        let now = Utc::now();
        let mut c = coupon("X", DiscountKind::Flat, 10);
        c.valid_from = Some(now + Duration::days(1));
        let err = c.check(Money::from_rupees(100), now).unwrap_err();
        assert!(matches!(err, CouponRejection::NotYetValid { .. }));
        assert_eq!(err.to_string(), "This coupon is not valid yet");
    }

    #[test]
    fn test_rejects_after_valid_until() {
        let now = Utc::now();
        let mut c = coupon("X", DiscountKind::Flat, 10);
        c.valid_until = Some(now - Duration::seconds(1));
        let err = c.check(Money::from_rupees(100), now).unwrap_err();
        assert_eq!(err.to_string(), "This coupon has expired");
    }

    #[test]
    fn test_rejects_below_minimum() {
        let mut c = coupon("X", DiscountKind::Flat, 10);
        c.min_purchase = Money::from_rupees(999);
        let err = c.check(Money::from_rupees(998), Utc::now()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Minimum purchase of ₹999.00 required for this coupon"
        );
        assert!(c.check(Money::from_rupees(999), Utc::now()).is_ok());
    }

    #[test]
    fn test_rejects_when_usage_count_reaches_limit() {
        let mut c = coupon("X", DiscountKind::Flat, 10);
        c.usage_limit = Some(3);
        c.usage_count = 2;
        assert!(c.check(Money::from_rupees(100), Utc::now()).is_ok());
        c.usage_count = 3;
        assert_eq!(
            c.check(Money::from_rupees(100), Utc::now()),
            Err(CouponRejection::UsageLimitReached)
        );
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(Coupon::normalize_code("  save10 "), "SAVE10");
    }

    #[test]
    fn test_rule_validity() {
        let mut rule = DiscountRule {
            kind: DiscountKind::Percent,
            value: Decimal::from(120),
            max_discount: None,
        };
        assert!(!rule.is_valid());
        rule.value = Decimal::from(15);
        assert!(rule.is_valid());
    }

    #[test]
    fn test_card_offer_minimum() {
        let offer = CardOffer {
            id: CardOfferId::random(),
            bank_name: "HDFC".to_string(),
            card_type: CardType::Credit,
            description: String::new(),
            rule: DiscountRule {
                kind: DiscountKind::Percent,
                value: Decimal::from(5),
                max_discount: Some(Money::from_rupees(100)),
            },
            min_amount: Money::from_rupees(1000),
            is_active: true,
        };
        assert!(matches!(
            offer.check(Money::from_rupees(500)),
            Err(CardOfferRejection::BelowMinimumAmount { .. })
        ));
        assert_eq!(offer.discount(Money::from_rupees(4000)), Money::from_rupees(100));
    }
}
