//! Domain records shared by the storefront and admin.

pub mod address;
pub mod cart;
pub mod coupon;
pub mod delivery;
pub mod order;
pub mod product;
pub mod profile;
pub mod returns;
pub mod review;
pub mod wallet;

pub use address::{Address, AddressError, AddressForm, ShippingAddress};
pub use cart::{CartItem, MAX_LINE_QUANTITY, WishlistItem};
pub use coupon::{
    CardOffer, CardOfferRejection, CardType, Coupon, CouponRejection, DiscountKind, DiscountRule,
};
pub use delivery::{Delivery, LocationError, LocationFix, LocationSample, LocationTrail};
pub use order::{Invoice, InvoiceLine, Order, OrderItem};
pub use product::{Product, ProductDraft, ProductError, ProductFilter, ProductSort};
pub use profile::{Profile, Referral, ReferralError};
pub use returns::{ReturnReasonError, ReturnRequest};
pub use review::{Rating, RatingSummary, Review, ReviewError};
pub use wallet::{TransactionKind, TransactionReason, WalletError, WalletTransaction};
