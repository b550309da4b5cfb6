//! Checkout saga records.
//!
//! One row per idempotency key. The unique key on `idempotency_key` is what
//! turns a double-submitted placement into a lookup of the first attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use bazaar_core::{OrderId, UserId};

use super::{RepositoryError, decode_first, encode, patch};
use crate::backend::Backend;
use crate::query::{Filter, Query, Table};

/// How far a placement got.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStep {
    Started,
    AddressResolved,
    OrderCreated,
    StockReserved,
    CouponRecorded,
    WalletDebited,
    Completed,
    Compensated,
}

impl SagaStep {
    /// `true` once the saga will not move again.
    #[must_use]
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Completed | Self::Compensated)
    }
}

/// A `checkout_sagas` row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaRecord {
    pub id: Uuid,
    pub idempotency_key: String,
    pub user_id: UserId,
    pub step: SagaStep,
    pub order_id: Option<OrderId>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of claiming an idempotency key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaStart {
    /// This caller owns the key and should run the saga.
    New(SagaRecord),
    /// The key was claimed before; here is what happened to it.
    Existing(SagaRecord),
}

pub struct SagaRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> SagaRepository<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Claim `key` for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the key belongs to another user.
    #[instrument(skip(self))]
    pub async fn begin(&self, key: &str, user_id: UserId) -> Result<SagaStart, RepositoryError> {
        let now = Utc::now();
        let record = SagaRecord {
            id: Uuid::new_v4(),
            idempotency_key: key.to_owned(),
            user_id,
            step: SagaStep::Started,
            order_id: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        match self
            .backend
            .insert(Table::CheckoutSagas, vec![encode(&record)?])
            .await
        {
            Ok(_) => Ok(SagaStart::New(record)),
            Err(e) if e.is_conflict() => {
                let existing = self.get(key).await?.ok_or(RepositoryError::NotFound)?;
                if existing.user_id != user_id {
                    return Err(RepositoryError::Conflict(
                        "idempotency key already used".to_owned(),
                    ));
                }
                Ok(SagaStart::Existing(existing))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn get(&self, key: &str) -> Result<Option<SagaRecord>, RepositoryError> {
        let query = Query::new().eq("idempotency_key", key).limit(1);
        decode_first(self.backend.select(Table::CheckoutSagas, &query).await?)
    }

    /// Record progress.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the saga row is gone.
    pub async fn advance(
        &self,
        key: &str,
        step: SagaStep,
        order_id: Option<OrderId>,
        error: Option<&str>,
    ) -> Result<SagaRecord, RepositoryError> {
        let mut changes = patch([
            ("step", json!(step)),
            ("updated_at", json!(Utc::now())),
        ]);
        if let Some(order_id) = order_id {
            changes.insert("order_id".to_owned(), json!(order_id.to_string()));
        }
        if let Some(error) = error {
            changes.insert("error".to_owned(), json!(error));
        }
        let updated = self
            .backend
            .update(Table::CheckoutSagas, &[Filter::eq("idempotency_key", key)], changes)
            .await?;
        decode_first(updated)?.ok_or(RepositoryError::NotFound)
    }
}
