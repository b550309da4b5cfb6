//! Cart and wishlist lines.

use serde::{Deserialize, Serialize};

use crate::types::{CartItemId, ProductId, WishlistItemId};

/// Most units of one product a single cart line may hold.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// One product line in a cart.
///
/// Guest carts keep these in the session with `id: None`; signed-in carts
/// carry the `cart_items` row id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<CartItemId>,
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartItem {
    /// A new line that has not been stored remotely yet.
    #[must_use]
    pub fn new(product_id: ProductId, quantity: u32) -> Self {
        Self {
            id: None,
            product_id,
            quantity: clamp_quantity(quantity),
        }
    }
}

/// Clamp a requested quantity to `1..=MAX_LINE_QUANTITY`.
#[must_use]
pub fn clamp_quantity(quantity: u32) -> u32 {
    quantity.clamp(1, MAX_LINE_QUANTITY)
}

/// A saved-for-later product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<WishlistItemId>,
    pub product_id: ProductId,
}

impl WishlistItem {
    #[must_use]
    pub const fn new(product_id: ProductId) -> Self {
        Self {
            id: None,
            product_id,
        }
    }
}
