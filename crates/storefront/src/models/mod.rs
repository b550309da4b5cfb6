//! Storefront-only models.
//!
//! Domain records live in `bazaar_core::models`; this module holds what the
//! storefront keeps in its own session store.

pub mod session;

pub use session::{CheckoutSelection, CurrentUser, keys as session_keys};
