//! Order repository.
//!
//! Orders are inserted once with their item snapshot and afterwards only
//! change status. Status updates are compare-and-set on the previous status
//! so two admins (or an admin and the courier flow) cannot both move the same
//! order from one state.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::instrument;

use bazaar_core::models::Order;
use bazaar_core::{OrderId, OrderStatus, PaymentStatus, UserId};

use super::{RepositoryError, decode_all, decode_first, encode, patch};
use crate::backend::{Backend, Row};
use crate::conversions::{order_from_rows, order_to_rows};
use crate::query::{Filter, Query, Table};
use crate::rows::{OrderItemRow, OrderRow};

/// Repository for orders and their items.
pub struct OrderRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Insert an order and its item rows.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the id is taken, or
    /// `RepositoryError::Backend` if either insert fails. When the item insert
    /// fails the order row already exists; callers compensate by cancelling it.
    #[instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn create(&self, order: &Order) -> Result<Order, RepositoryError> {
        let (row, items) = order_to_rows(order)?;
        self.backend.insert(Table::Orders, vec![encode(&row)?]).await?;

        let item_rows = items.iter().map(encode).collect::<Result<Vec<Row>, _>>()?;
        if !item_rows.is_empty() {
            self.backend.insert(Table::OrderItems, item_rows).await?;
        }

        self.get(order.id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the stored row is invalid.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let query = Query::new().eq("id", id.to_string()).limit(1);
        let Some(row) = decode_first::<OrderRow>(self.backend.select(Table::Orders, &query).await?)?
        else {
            return Ok(None);
        };
        let mut items = self.items_for(&[row.id]).await?;
        let items = items.remove(&row.id).unwrap_or_default();
        Ok(Some(order_from_rows(row, items)?))
    }

    /// A customer's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>, RepositoryError> {
        let query = Query::new()
            .eq("user_id", user_id.to_string())
            .order_desc("created_at");
        self.load(query).await
    }

    /// Orders for the back office, optionally narrowed to one status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        limit: Option<usize>,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut query = Query::new().order_desc("created_at");
        if let Some(status) = status {
            query = query.eq("status", status.to_string());
        }
        if let Some(limit) = limit {
            query = query.limit(limit);
        }
        self.load(query).await
    }

    /// Move an order from `from` to `to`.
    ///
    /// The caller validates the transition; this only makes sure nobody else
    /// moved the order in the meantime.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown order and
    /// `RepositoryError::Conflict` if its status is no longer `from`.
    #[instrument(skip(self))]
    pub async fn set_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        let filters = [
            Filter::eq("id", id.to_string()),
            Filter::eq("status", from.to_string()),
        ];
        let changes = patch([
            ("status", json!(to.to_string())),
            ("updated_at", json!(now)),
        ]);
        self.guarded_update(id, &filters, changes, from).await
    }

    /// Record the payment outcome.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown order.
    pub async fn set_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        let changes = patch([
            ("payment_status", json!(status.to_string())),
            ("updated_at", json!(now)),
        ]);
        let updated = self
            .backend
            .update(Table::Orders, &[Filter::eq("id", id.to_string())], changes)
            .await?;
        if updated.is_empty() {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Cancel an order whose placement failed part way.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` for an unknown order.
    #[instrument(skip(self))]
    pub async fn mark_failed(&self, id: OrderId, now: DateTime<Utc>) -> Result<(), RepositoryError> {
        let changes = patch([
            ("status", json!(OrderStatus::Cancelled.to_string())),
            ("payment_status", json!(PaymentStatus::Failed.to_string())),
            ("updated_at", json!(now)),
        ]);
        let updated = self
            .backend
            .update(Table::Orders, &[Filter::eq("id", id.to_string())], changes)
            .await?;
        if updated.is_empty() {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Order count per status, for the dashboard.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn count_by_status(&self) -> Result<HashMap<OrderStatus, usize>, RepositoryError> {
        let rows: Vec<OrderRow> =
            decode_all(self.backend.select(Table::Orders, &Query::new()).await?)?;
        let mut counts = HashMap::new();
        for row in rows {
            let status: OrderStatus = row
                .status
                .parse()
                .map_err(RepositoryError::DataCorruption)?;
            *counts.entry(status).or_insert(0) += 1;
        }
        Ok(counts)
    }

    async fn guarded_update(
        &self,
        id: OrderId,
        filters: &[Filter],
        changes: Row,
        expected: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let updated = self.backend.update(Table::Orders, filters, changes).await?;
        if updated.is_empty() {
            return match self.get(id).await? {
                None => Err(RepositoryError::NotFound),
                Some(order) => Err(RepositoryError::Conflict(format!(
                    "order {} is {}, not {expected}",
                    order.reference(),
                    order.status
                ))),
            };
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn load(&self, query: Query) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = decode_all(self.backend.select(Table::Orders, &query).await?)?;
        let ids: Vec<OrderId> = rows.iter().map(|r| r.id).collect();
        let mut items = self.items_for(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                Ok(order_from_rows(row, lines)?)
            })
            .collect()
    }

    async fn items_for(
        &self,
        ids: &[OrderId],
    ) -> Result<HashMap<OrderId, Vec<OrderItemRow>>, RepositoryError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let query = Query::new().filter(Filter::is_in(
            "order_id",
            ids.iter().map(ToString::to_string),
        ));
        let rows: Vec<OrderItemRow> =
            decode_all(self.backend.select(Table::OrderItems, &query).await?)?;
        let mut grouped: HashMap<OrderId, Vec<OrderItemRow>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row);
        }
        Ok(grouped)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use bazaar_core::models::{OrderItem, ShippingAddress};
    use bazaar_core::pricing::PriceBreakdown;
    use bazaar_core::{Money, PaymentMethod, Phone, Pincode, ProductId};

    use super::*;
    use crate::memory::MemoryBackend;

    pub(crate) fn order(user_id: UserId, status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::random(),
            user_id,
            items: vec![OrderItem {
                id: None,
                product_id: ProductId::random(),
                name: "Cardamom".to_string(),
                unit_price: Money::from_rupees(200),
                quantity: 2,
                image: None,
            }],
            pricing: PriceBreakdown {
                subtotal: Money::from_rupees(400),
                shipping: Money::from_rupees(25),
                tax: Money::from_rupees(72),
                total: Money::from_rupees(497),
                cod_available: true,
                ..PriceBreakdown::default()
            },
            status,
            shipping_address: ShippingAddress {
                full_name: "Asha Rao".to_string(),
                phone: Phone::parse("9845012345").unwrap(),
                line1: "12 MG Road".to_string(),
                line2: None,
                city: "Bengaluru".to_string(),
                state: "Karnataka".to_string(),
                pincode: Pincode::parse("560001").unwrap(),
            },
            payment_method: PaymentMethod::CashOnDelivery,
            payment_status: PaymentStatus::Pending,
            coupon_code: None,
            card_offer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_list_for_user() {
        let backend = MemoryBackend::new();
        let repo = OrderRepository::new(&backend);
        let user = UserId::random();
        repo.create(&order(user, OrderStatus::Pending)).await.unwrap();
        repo.create(&order(UserId::random(), OrderStatus::Pending))
            .await
            .unwrap();

        let mine = repo.list_for_user(user).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].items.len(), 1);
        assert_eq!(mine[0].pricing.total, Money::from_rupees(497));
    }

    #[tokio::test]
    async fn test_set_status_is_guarded() {
        let backend = MemoryBackend::new();
        let repo = OrderRepository::new(&backend);
        let placed = repo
            .create(&order(UserId::random(), OrderStatus::Pending))
            .await
            .unwrap();

        let confirmed = repo
            .set_status(placed.id, OrderStatus::Pending, OrderStatus::Confirmed, Utc::now())
            .await
            .unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);

        let stale = repo
            .set_status(placed.id, OrderStatus::Pending, OrderStatus::Cancelled, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(stale, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_mark_failed() {
        let backend = MemoryBackend::new();
        let repo = OrderRepository::new(&backend);
        let placed = repo
            .create(&order(UserId::random(), OrderStatus::Pending))
            .await
            .unwrap();
        repo.mark_failed(placed.id, Utc::now()).await.unwrap();
        let failed = repo.get(placed.id).await.unwrap().unwrap();
        assert_eq!(failed.status, OrderStatus::Cancelled);
        assert_eq!(failed.payment_status, PaymentStatus::Failed);
    }
}
