//! Payment method tags stored on orders.
//!
//! The order row keeps a single text column for the payment method. Online
//! payments embed the gateway transaction id in that tag (`online:<txn>`).

use core::fmt;

use serde::{Deserialize, Serialize};

/// How the customer pays for an order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PaymentMethod {
    /// Cash on delivery.
    CashOnDelivery,
    /// Paid through the gateway; carries the gateway transaction id.
    Online {
        /// Transaction id returned by the gateway's checkout callback.
        transaction_id: String,
    },
}

/// A payment tag that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentTagError {
    /// Unknown tag prefix.
    #[error("unknown payment method: {0}")]
    Unknown(String),
    /// `online:` with nothing after it.
    #[error("online payment is missing its transaction id")]
    MissingTransactionId,
}

impl PaymentMethod {
    const COD_TAG: &'static str = "cod";
    const ONLINE_PREFIX: &'static str = "online:";

    /// Parse the stored tag.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentTagError`] for unknown tags or an empty transaction id.
    pub fn parse(tag: &str) -> Result<Self, PaymentTagError> {
        if tag == Self::COD_TAG {
            return Ok(Self::CashOnDelivery);
        }
        match tag.strip_prefix(Self::ONLINE_PREFIX) {
            Some(txn) if !txn.trim().is_empty() => Ok(Self::Online {
                transaction_id: txn.trim().to_owned(),
            }),
            Some(_) => Err(PaymentTagError::MissingTransactionId),
            None => Err(PaymentTagError::Unknown(tag.to_owned())),
        }
    }

    /// `true` for cash on delivery.
    #[must_use]
    pub const fn is_cod(&self) -> bool {
        matches!(self, Self::CashOnDelivery)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CashOnDelivery => f.write_str(Self::COD_TAG),
            Self::Online { transaction_id } => {
                write!(f, "{}{transaction_id}", Self::ONLINE_PREFIX)
            }
        }
    }
}

impl Serialize for PaymentMethod {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PaymentMethod {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Self::parse(&tag).map_err(serde::de::Error::custom)
    }
}
