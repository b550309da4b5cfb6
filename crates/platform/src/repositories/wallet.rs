//! Wallet ledger.
//!
//! The balance lives on the profile; each change here also appends a
//! `wallet_transactions` row. The balance update goes first so a failed
//! ledger insert never leaves an entry for coins that did not move.

use tracing::{instrument, warn};

use bazaar_core::models::{TransactionKind, TransactionReason, WalletTransaction};
use bazaar_core::{Money, OrderId, UserId};

use super::{ProfileRepository, RepositoryError, decode_all, encode};
use crate::backend::Backend;
use crate::query::{Query, Table};

pub struct WalletRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> WalletRepository<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Add coins.
    ///
    /// # Errors
    ///
    /// See [`ProfileRepository::adjust_wallet`].
    pub async fn credit(
        &self,
        user_id: UserId,
        amount: Money,
        reason: TransactionReason,
        order_id: Option<OrderId>,
    ) -> Result<Money, RepositoryError> {
        self.record(user_id, TransactionKind::Credit, amount, reason, order_id)
            .await
    }

    /// Spend coins.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Wallet` if the balance is too low.
    pub async fn debit(
        &self,
        user_id: UserId,
        amount: Money,
        reason: TransactionReason,
        order_id: Option<OrderId>,
    ) -> Result<Money, RepositoryError> {
        self.record(user_id, TransactionKind::Debit, amount, reason, order_id)
            .await
    }

    /// Ledger entries for a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn history(&self, user_id: UserId) -> Result<Vec<WalletTransaction>, RepositoryError> {
        let query = Query::new()
            .eq("user_id", user_id.to_string())
            .order_desc("created_at");
        decode_all(self.backend.select(Table::WalletTransactions, &query).await?)
    }

    #[instrument(skip(self))]
    async fn record(
        &self,
        user_id: UserId,
        kind: TransactionKind,
        amount: Money,
        reason: TransactionReason,
        order_id: Option<OrderId>,
    ) -> Result<Money, RepositoryError> {
        let balance = ProfileRepository::new(self.backend)
            .adjust_wallet(user_id, kind, amount)
            .await?;

        let entry = WalletTransaction::new(user_id, kind, amount, reason, order_id);
        if let Err(e) = self
            .backend
            .insert(Table::WalletTransactions, vec![encode(&entry)?])
            .await
        {
            // The coins moved; a missing ledger line is reconciled by hand.
            warn!(error = %e, user_id = %user_id, "Failed to write wallet ledger entry");
        }
        Ok(balance)
    }
}
