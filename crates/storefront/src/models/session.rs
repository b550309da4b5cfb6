//! Session-related types.
//!
//! Types stored in the session for authentication and guest shopping state.

use serde::{Deserialize, Serialize};

use bazaar_core::{CardOfferId, Email, UserId, UserRole};

/// Session-stored account identity.
#[derive(Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: Email,
    pub role: UserRole,
    /// Platform access token, used to sign out.
    pub access_token: String,
}

impl std::fmt::Debug for CurrentUser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CurrentUser")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Checkout choices made before a quote is requested.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSelection {
    pub coupon_code: Option<String>,
    pub card_offer_id: Option<CardOfferId>,
    pub use_wallet: bool,
}

/// Session keys.
pub mod keys {
    /// The signed-in account.
    pub const CURRENT_USER: &str = "current_user";

    /// Cart lines added while signed out.
    pub const GUEST_CART: &str = "guest_cart";

    /// Wishlist entries added while signed out.
    pub const GUEST_WISHLIST: &str = "guest_wishlist";

    /// Coupon, card offer and wallet choices.
    pub const CHECKOUT_SELECTION: &str = "checkout_selection";

    /// Id of a guest merge that has started but not finished.
    pub const MERGE_ID: &str = "merge_id";
}
