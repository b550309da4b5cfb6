//! Per-session shopper state.
//!
//! Cart, wishlist and checkout selections change only through
//! [`ShopperState::apply`] with a typed [`ShopperAction`]. The storefront keeps
//! one of these per session; signed-in shoppers mirror it to the platform.
//!
//! Guest-to-account merging is planned here as well: [`plan_merge`] turns a
//! guest cart and wishlist plus the account's stored rows into one batch of
//! writes.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::models::cart::{CartItem, MAX_LINE_QUANTITY, WishlistItem, clamp_quantity};
use crate::models::coupon::Coupon;
use crate::types::{CardOfferId, CartItemId, ProductId, UserId};

/// Everything that can happen to a shopper's session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShopperAction {
    SignedIn { user_id: UserId },
    SignedOut,
    CartLoaded { items: Vec<CartItem> },
    WishlistLoaded { items: Vec<WishlistItem> },
    AddToCart { product_id: ProductId, quantity: u32 },
    /// Zero removes the line.
    SetQuantity { product_id: ProductId, quantity: u32 },
    RemoveFromCart { product_id: ProductId },
    ClearCart,
    AddToWishlist { product_id: ProductId },
    RemoveFromWishlist { product_id: ProductId },
    ApplyCoupon { code: String },
    RemoveCoupon,
    SelectCardOffer { card_offer_id: Option<CardOfferId> },
    SetUseWallet { use_wallet: bool },
}

/// A shopper's cart, wishlist and checkout choices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ShopperState {
    pub user_id: Option<UserId>,
    pub cart: Vec<CartItem>,
    pub wishlist: Vec<WishlistItem>,
    pub coupon_code: Option<String>,
    pub card_offer_id: Option<CardOfferId>,
    pub use_wallet: bool,
}

impl ShopperState {
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }

    #[must_use]
    pub fn cart_line(&self, product_id: ProductId) -> Option<&CartItem> {
        self.cart.iter().find(|i| i.product_id == product_id)
    }

    #[must_use]
    pub fn cart_count(&self) -> u32 {
        self.cart.iter().map(|i| i.quantity).sum()
    }

    #[must_use]
    pub fn in_wishlist(&self, product_id: ProductId) -> bool {
        self.wishlist.iter().any(|w| w.product_id == product_id)
    }

    /// Apply one action.
    pub fn apply(&mut self, action: ShopperAction) {
        match action {
            ShopperAction::SignedIn { user_id } => self.user_id = Some(user_id),
            ShopperAction::SignedOut => *self = Self::default(),
            ShopperAction::CartLoaded { items } => self.cart = items,
            ShopperAction::WishlistLoaded { items } => self.wishlist = items,
            ShopperAction::AddToCart {
                product_id,
                quantity,
            } => {
                if let Some(line) = self.cart.iter_mut().find(|i| i.product_id == product_id) {
                    line.quantity = clamp_quantity(line.quantity.saturating_add(quantity));
                } else {
                    self.cart.push(CartItem::new(product_id, quantity));
                }
            }
            ShopperAction::SetQuantity {
                product_id,
                quantity: 0,
            }
            | ShopperAction::RemoveFromCart { product_id } => {
                self.cart.retain(|i| i.product_id != product_id);
            }
            ShopperAction::SetQuantity {
                product_id,
                quantity,
            } => {
                if let Some(line) = self.cart.iter_mut().find(|i| i.product_id == product_id) {
                    line.quantity = clamp_quantity(quantity);
                }
            }
            ShopperAction::ClearCart => {
                self.cart.clear();
                self.coupon_code = None;
                self.card_offer_id = None;
                self.use_wallet = false;
            }
            ShopperAction::AddToWishlist { product_id } => {
                if !self.in_wishlist(product_id) {
                    self.wishlist.push(WishlistItem::new(product_id));
                }
            }
            ShopperAction::RemoveFromWishlist { product_id } => {
                self.wishlist.retain(|w| w.product_id != product_id);
            }
            ShopperAction::ApplyCoupon { code } => {
                let code = Coupon::normalize_code(&code);
                self.coupon_code = (!code.is_empty()).then_some(code);
            }
            ShopperAction::RemoveCoupon => self.coupon_code = None,
            ShopperAction::SelectCardOffer { card_offer_id } => self.card_offer_id = card_offer_id,
            ShopperAction::SetUseWallet { use_wallet } => self.use_wallet = use_wallet,
        }
    }
}

/// Writes needed to fold a guest session into an account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MergePlan {
    /// Existing account cart rows and the absolute quantity each ends at.
    pub quantity_updates: Vec<(CartItemId, u32)>,
    /// Guest lines for products the account cart does not have.
    pub cart_inserts: Vec<CartItem>,
    /// Guest wishlist products missing from the account wishlist.
    pub wishlist_inserts: Vec<ProductId>,
}

impl MergePlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quantity_updates.is_empty()
            && self.cart_inserts.is_empty()
            && self.wishlist_inserts.is_empty()
    }
}

/// Plan a guest-to-account merge.
///
/// Quantities for a product present in both carts are summed (capped at
/// [`MAX_LINE_QUANTITY`]). Wishlist entries are only added when missing.
#[must_use]
pub fn plan_merge(
    account_cart: &[CartItem],
    account_wishlist: &[WishlistItem],
    guest_cart: &[CartItem],
    guest_wishlist: &[WishlistItem],
) -> MergePlan {
    // Guest carts may hold the same product twice after an old client wrote them.
    let mut guest: BTreeMap<ProductId, u32> = BTreeMap::new();
    for item in guest_cart.iter().filter(|i| i.quantity > 0) {
        let qty = guest.entry(item.product_id).or_default();
        *qty = qty.saturating_add(item.quantity);
    }

    let mut plan = MergePlan::default();
    for (product_id, quantity) in guest {
        match account_cart.iter().find(|i| i.product_id == product_id) {
            Some(CartItem { id: Some(id), quantity: existing, .. }) => {
                let merged = existing.saturating_add(quantity).min(MAX_LINE_QUANTITY);
                if merged != *existing {
                    plan.quantity_updates.push((*id, merged));
                }
            }
            Some(_) | None => plan.cart_inserts.push(CartItem::new(product_id, quantity)),
        }
    }

    let mut seen: HashSet<ProductId> = account_wishlist.iter().map(|w| w.product_id).collect();
    plan.wishlist_inserts = guest_wishlist
        .iter()
        .map(|w| w.product_id)
        .filter(|p| seen.insert(*p))
        .collect();

    plan
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stored(product_id: ProductId, quantity: u32) -> CartItem {
        CartItem {
            id: Some(CartItemId::random()),
            product_id,
            quantity,
        }
    }

    #[test]
    fn test_add_to_cart_accumulates() {
        let p = ProductId::random();
        let mut state = ShopperState::default();
        state.apply(ShopperAction::AddToCart { product_id: p, quantity: 2 });
        state.apply(ShopperAction::AddToCart { product_id: p, quantity: 3 });
        assert_eq!(state.cart.len(), 1);
        assert_eq!(state.cart_count(), 5);
    }

    #[test]
    fn test_set_quantity_zero_removes() {
        let p = ProductId::random();
        let mut state = ShopperState::default();
        state.apply(ShopperAction::AddToCart { product_id: p, quantity: 2 });
        state.apply(ShopperAction::SetQuantity { product_id: p, quantity: 0 });
        assert!(state.cart.is_empty());
    }

    #[test]
    fn test_wishlist_no_duplicates() {
        let p = ProductId::random();
        let mut state = ShopperState::default();
        state.apply(ShopperAction::AddToWishlist { product_id: p });
        state.apply(ShopperAction::AddToWishlist { product_id: p });
        assert_eq!(state.wishlist.len(), 1);
        state.apply(ShopperAction::RemoveFromWishlist { product_id: p });
        assert!(!state.in_wishlist(p));
    }

    #[test]
    fn test_coupon_normalized_and_cleared_with_cart() {
        let mut state = ShopperState::default();
        state.apply(ShopperAction::ApplyCoupon { code: " save10 ".to_string() });
        assert_eq!(state.coupon_code.as_deref(), Some("SAVE10"));
        state.apply(ShopperAction::SetUseWallet { use_wallet: true });
        state.apply(ShopperAction::ClearCart);
        assert_eq!(state.coupon_code, None);
        assert!(!state.use_wallet);
    }

    #[test]
    fn test_sign_out_resets() {
        let mut state = ShopperState::default();
        state.apply(ShopperAction::SignedIn { user_id: UserId::random() });
        state.apply(ShopperAction::AddToCart { product_id: ProductId::random(), quantity: 1 });
        state.apply(ShopperAction::SignedOut);
        assert_eq!(state, ShopperState::default());
    }

    #[test]
    fn test_merge_sums_quantities() {
        let shared = ProductId::random();
        let guest_only = ProductId::random();
        let account = vec![stored(shared, 2)];
        let guest = vec![CartItem::new(shared, 3), CartItem::new(guest_only, 1)];

        let plan = plan_merge(&account, &[], &guest, &[]);
        assert_eq!(plan.quantity_updates, vec![(account[0].id.unwrap(), 5)]);
        assert_eq!(plan.cart_inserts.len(), 1);
        assert_eq!(plan.cart_inserts[0].product_id, guest_only);
    }

    #[test]
    fn test_merge_combines_duplicate_guest_lines() {
        let p = ProductId::random();
        let guest = vec![CartItem::new(p, 1), CartItem::new(p, 2)];
        let plan = plan_merge(&[], &[], &guest, &[]);
        assert_eq!(plan.cart_inserts, vec![CartItem::new(p, 3)]);
    }

    #[test]
    fn test_merge_wishlist_adds_only_missing() {
        let have = ProductId::random();
        let new = ProductId::random();
        let account = vec![WishlistItem::new(have)];
        let guest = vec![WishlistItem::new(have), WishlistItem::new(new), WishlistItem::new(new)];
        let plan = plan_merge(&[], &account, &[], &guest);
        assert_eq!(plan.wishlist_inserts, vec![new]);
    }

    #[test]
    fn test_empty_guest_state_plans_nothing() {
        let account = vec![stored(ProductId::random(), 4)];
        assert!(plan_merge(&account, &[], &[], &[]).is_empty());
    }
}
