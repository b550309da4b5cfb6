//! Admin-only models.
//!
//! Domain records live in `bazaar_core::models`.

pub mod session;

pub use session::{CurrentAdmin, keys as session_keys};
