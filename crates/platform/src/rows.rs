//! Raw row shapes for tables whose columns differ from the domain types.
//!
//! Tables whose rows match a `bazaar_core` type one to one (addresses,
//! deliveries, location samples, returns, reviews, wallet transactions,
//! referrals, profiles) are decoded straight into that type.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bazaar_core::models::{CardType, DiscountKind};
use bazaar_core::{
    CardOfferId, CartItemId, CouponId, Money, OrderId, OrderItemId, ProductId, UserId,
    WishlistItemId,
};

/// `products` row. Every column but `id` may be missing or null.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRow {
    pub id: ProductId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub original_price: Option<Decimal>,
    #[serde(default)]
    pub stock: Option<i64>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// `orders` row: the price breakdown is flattened into columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRow {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: String,
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    #[serde(default)]
    pub coupon_discount: Money,
    #[serde(default)]
    pub card_discount: Money,
    #[serde(default)]
    pub wallet_used: Money,
    pub total: Money,
    #[serde(default)]
    pub cod_available: bool,
    pub shipping_address: serde_json::Value,
    pub payment_method: String,
    pub payment_status: String,
    #[serde(default)]
    pub coupon_code: Option<String>,
    #[serde(default)]
    pub card_offer_id: Option<CardOfferId>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// `order_items` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemRow {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    #[serde(default)]
    pub product_name: Option<String>,
    pub price: Money,
    pub quantity: i64,
    #[serde(default)]
    pub image: Option<String>,
}

/// `coupons` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponRow {
    pub id: CouponId,
    pub code: String,
    #[serde(default)]
    pub description: Option<String>,
    pub discount_type: DiscountKind,
    pub discount_value: Decimal,
    #[serde(default)]
    pub max_discount: Option<Money>,
    #[serde(default)]
    pub min_purchase: Option<Money>,
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub usage_limit: Option<u32>,
    #[serde(default)]
    pub usage_count: u32,
    #[serde(default = "yes")]
    pub is_active: bool,
}

/// `card_offers` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardOfferRow {
    pub id: CardOfferId,
    pub bank_name: String,
    #[serde(default)]
    pub card_type: CardType,
    #[serde(default)]
    pub description: Option<String>,
    pub discount_type: DiscountKind,
    pub discount_value: Decimal,
    #[serde(default)]
    pub max_discount: Option<Money>,
    #[serde(default)]
    pub min_amount: Option<Money>,
    #[serde(default = "yes")]
    pub is_active: bool,
}

const fn yes() -> bool {
    true
}

/// `cart_items` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemRow {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
}

/// `wishlist` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistRow {
    pub id: WishlistItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
}
