//! Wallet coin ledger.
//!
//! One coin is one rupee. The balance lives on the profile row; every change
//! also appends a [`WalletTransaction`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Money, OrderId, UserId, WalletTransactionId};

/// Coins credited to each side of a referral.
pub const REFERRAL_REWARD: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Credit,
    Debit,
}

/// What a ledger entry was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionReason {
    ReferralBonus,
    ReferralReward,
    OrderPayment,
    OrderCancelled,
    ReturnRefund,
    Adjustment,
}

impl TransactionReason {
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::ReferralBonus => "Bonus for joining with a referral code",
            Self::ReferralReward => "Reward for referring a friend",
            Self::OrderPayment => "Used at checkout",
            Self::OrderCancelled => "Refund for cancelled order",
            Self::ReturnRefund => "Refund for returned order",
            Self::Adjustment => "Manual adjustment",
        }
    }
}

/// One ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: WalletTransactionId,
    pub user_id: UserId,
    pub kind: TransactionKind,
    pub amount: Money,
    pub reason: TransactionReason,
    pub description: String,
    pub order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    /// New ledger entry with the default description for `reason`.
    #[must_use]
    pub fn new(
        user_id: UserId,
        kind: TransactionKind,
        amount: Money,
        reason: TransactionReason,
        order_id: Option<OrderId>,
    ) -> Self {
        Self {
            id: WalletTransactionId::random(),
            user_id,
            kind,
            amount,
            reason,
            description: reason.describe().to_owned(),
            order_id,
            created_at: Utc::now(),
        }
    }

    /// Signed effect on the balance.
    #[must_use]
    pub fn signed_amount(&self) -> Money {
        match self.kind {
            TransactionKind::Credit => self.amount,
            TransactionKind::Debit => Money::ZERO - self.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("insufficient wallet balance: have {available}, need {requested}")]
    Insufficient { available: Money, requested: Money },
    #[error("wallet amounts must be positive")]
    NonPositive,
}

/// Balance after applying `kind` of `amount`.
///
/// # Errors
///
/// Returns [`WalletError`] for non-positive amounts or an overdraft.
pub fn apply(balance: Money, kind: TransactionKind, amount: Money) -> Result<Money, WalletError> {
    if amount.is_negative() || amount.is_zero() {
        return Err(WalletError::NonPositive);
    }
    match kind {
        TransactionKind::Credit => Ok(balance + amount),
        TransactionKind::Debit if amount > balance => Err(WalletError::Insufficient {
            available: balance,
            requested: amount,
        }),
        TransactionKind::Debit => Ok(balance - amount),
    }
}
