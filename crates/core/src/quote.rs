//! Server-issued pricing quotes.
//!
//! The storefront prices a cart, signs the result and hands the token to the
//! client. Payment and order placement accept only the signed quote, so the
//! amounts charged are always the ones the server computed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::pricing::PriceBreakdown;
use crate::token::{Expiring, Signer, TokenError};
use crate::types::{CardOfferId, Money, ProductId, QuoteId, UserId};

/// How long a quote stays valid.
pub const QUOTE_TTL: Duration = Duration::minutes(15);

/// A priced cart line as it was when quoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteLine {
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub image: Option<String>,
}

/// Everything needed to place an order at a fixed price.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub user_id: UserId,
    pub lines: Vec<QuoteLine>,
    pub coupon_code: Option<String>,
    pub card_offer_id: Option<CardOfferId>,
    pub use_wallet: bool,
    pub breakdown: PriceBreakdown,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Expiring for Quote {
    fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}

impl Quote {
    /// Amount the payment gateway should collect, in paise.
    #[must_use]
    pub fn amount_minor_units(&self) -> Option<i64> {
        self.breakdown.total.to_minor_units()
    }

    /// Sign this quote.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError`] if the quote cannot be encoded.
    pub fn seal(&self, signer: &Signer) -> Result<SignedQuote, TokenError> {
        Ok(SignedQuote {
            token: signer.sign(self)?,
            quote: self.clone(),
        })
    }
}

/// A quote together with its token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedQuote {
    pub quote: Quote,
    pub token: String,
}
