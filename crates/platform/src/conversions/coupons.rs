//! Coupon and card offer rows.

use bazaar_core::Money;
use bazaar_core::models::{CardOffer, Coupon, DiscountRule};

use crate::rows::{CardOfferRow, CouponRow};

#[must_use]
pub fn coupon_from_row(row: CouponRow) -> Coupon {
    Coupon {
        id: row.id,
        code: Coupon::normalize_code(&row.code),
        description: row.description.unwrap_or_default(),
        rule: DiscountRule {
            kind: row.discount_type,
            value: row.discount_value,
            max_discount: row.max_discount,
        },
        min_purchase: row.min_purchase.unwrap_or(Money::ZERO),
        valid_from: row.valid_from,
        valid_until: row.valid_until,
        usage_limit: row.usage_limit,
        usage_count: row.usage_count,
        is_active: row.is_active,
    }
}

#[must_use]
pub fn coupon_to_row(coupon: &Coupon) -> CouponRow {
    CouponRow {
        id: coupon.id,
        code: Coupon::normalize_code(&coupon.code),
        description: Some(coupon.description.clone()),
        discount_type: coupon.rule.kind,
        discount_value: coupon.rule.value,
        max_discount: coupon.rule.max_discount,
        min_purchase: Some(coupon.min_purchase),
        valid_from: coupon.valid_from,
        valid_until: coupon.valid_until,
        usage_limit: coupon.usage_limit,
        usage_count: coupon.usage_count,
        is_active: coupon.is_active,
    }
}

#[must_use]
pub fn card_offer_from_row(row: CardOfferRow) -> CardOffer {
    CardOffer {
        id: row.id,
        bank_name: row.bank_name,
        card_type: row.card_type,
        description: row.description.unwrap_or_default(),
        rule: DiscountRule {
            kind: row.discount_type,
            value: row.discount_value,
            max_discount: row.max_discount,
        },
        min_amount: row.min_amount.unwrap_or(Money::ZERO),
        is_active: row.is_active,
    }
}

#[must_use]
pub fn card_offer_to_row(offer: &CardOffer) -> CardOfferRow {
    CardOfferRow {
        id: offer.id,
        bank_name: offer.bank_name.clone(),
        card_type: offer.card_type,
        description: Some(offer.description.clone()),
        discount_type: offer.rule.kind,
        discount_value: offer.rule.value,
        max_discount: offer.rule.max_discount,
        min_amount: Some(offer.min_amount),
        is_active: offer.is_active,
    }
}
