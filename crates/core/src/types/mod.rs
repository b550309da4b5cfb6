//! Core types for Bazaar.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod contact;
pub mod id;
pub mod money;
pub mod payment;
pub mod status;

pub use contact::{ContactError, Email, Phone, Pincode};
pub use id::*;
pub use money::Money;
pub use payment::{PaymentMethod, PaymentTagError};
pub use status::*;
