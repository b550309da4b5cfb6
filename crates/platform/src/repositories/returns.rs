//! Return request repository.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::instrument;

use bazaar_core::models::ReturnRequest;
use bazaar_core::{Money, OrderId, ReturnId, ReturnStatus, UserId};

use super::{RepositoryError, decode_all, decode_first, encode, money_value, patch};
use crate::backend::Backend;
use crate::query::{Filter, Query, Table};

pub struct ReturnRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> ReturnRepository<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn create(&self, request: &ReturnRequest) -> Result<ReturnRequest, RepositoryError> {
        let stored = self.backend.insert(Table::Returns, vec![encode(request)?]).await?;
        decode_first(stored)?
            .ok_or_else(|| RepositoryError::DataCorruption("insert returned no row".to_owned()))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn get(&self, id: ReturnId) -> Result<Option<ReturnRequest>, RepositoryError> {
        let query = Query::new().eq("id", id.to_string()).limit(1);
        decode_first(self.backend.select(Table::Returns, &query).await?)
    }

    /// Open (not rejected) request for an order, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn open_for_order(&self, order_id: OrderId) -> Result<Option<ReturnRequest>, RepositoryError> {
        let query = Query::new()
            .eq("order_id", order_id.to_string())
            .filter(Filter::neq("status", ReturnStatus::Rejected.to_string()))
            .limit(1);
        decode_first(self.backend.select(Table::Returns, &query).await?)
    }

    /// A customer's return requests, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<ReturnRequest>, RepositoryError> {
        let query = Query::new()
            .eq("user_id", user_id.to_string())
            .order_desc("created_at");
        decode_all(self.backend.select(Table::Returns, &query).await?)
    }

    /// Requests for the back office, optionally narrowed to one status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn list(&self, status: Option<ReturnStatus>) -> Result<Vec<ReturnRequest>, RepositoryError> {
        let mut query = Query::new().order_desc("created_at");
        if let Some(status) = status {
            query = query.eq("status", status.to_string());
        }
        decode_all(self.backend.select(Table::Returns, &query).await?)
    }

    /// Move a request from `from` to `to`, guarded on the current status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the status is no longer `from`.
    #[instrument(skip(self, note))]
    pub async fn set_status(
        &self,
        id: ReturnId,
        from: ReturnStatus,
        to: ReturnStatus,
        note: Option<&str>,
        refund_amount: Option<Money>,
        now: DateTime<Utc>,
    ) -> Result<ReturnRequest, RepositoryError> {
        let filters = [
            Filter::eq("id", id.to_string()),
            Filter::eq("status", from.to_string()),
        ];
        let mut changes = patch([
            ("status", json!(to.to_string())),
            ("updated_at", json!(now)),
        ]);
        if let Some(note) = note {
            changes.insert("admin_note".to_owned(), json!(note));
        }
        if let Some(amount) = refund_amount {
            changes.insert("refund_amount".to_owned(), money_value(amount));
        }
        let updated = self.backend.update(Table::Returns, &filters, changes).await?;
        match decode_first(updated)? {
            Some(request) => Ok(request),
            None if self.get(id).await?.is_some() => Err(RepositoryError::Conflict(format!(
                "return {id} is no longer {from}"
            ))),
            None => Err(RepositoryError::NotFound),
        }
    }
}
