//! Delivery repository.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::instrument;

use bazaar_core::models::Delivery;
use bazaar_core::{DeliveryId, DeliveryStatus, OrderId, UserId};

use super::{RepositoryError, decode_all, decode_first, encode, patch};
use crate::backend::Backend;
use crate::query::{Filter, Query, Table};

pub struct DeliveryRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> DeliveryRepository<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Open a pending delivery for an order. One per order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the order already has one.
    #[instrument(skip(self))]
    pub async fn create(&self, order_id: OrderId) -> Result<Delivery, RepositoryError> {
        let delivery = Delivery {
            id: DeliveryId::random(),
            order_id,
            courier_id: None,
            qr_token: None,
            status: DeliveryStatus::Pending,
            assigned_at: None,
            picked_up_at: None,
            delivered_at: None,
            failure_reason: None,
            created_at: Utc::now(),
        };
        let stored = self.backend.insert(Table::Deliveries, vec![encode(&delivery)?]).await?;
        decode_first(stored)?
            .ok_or_else(|| RepositoryError::DataCorruption("insert returned no row".to_owned()))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn get(&self, id: DeliveryId) -> Result<Option<Delivery>, RepositoryError> {
        let query = Query::new().eq("id", id.to_string()).limit(1);
        decode_first(self.backend.select(Table::Deliveries, &query).await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn for_order(&self, order_id: OrderId) -> Result<Option<Delivery>, RepositoryError> {
        let query = Query::new().eq("order_id", order_id.to_string()).limit(1);
        decode_first(self.backend.select(Table::Deliveries, &query).await?)
    }

    /// Jobs assigned to a courier, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn list_for_courier(&self, courier_id: UserId) -> Result<Vec<Delivery>, RepositoryError> {
        let query = Query::new()
            .eq("courier_id", courier_id.to_string())
            .order_desc("created_at");
        decode_all(self.backend.select(Table::Deliveries, &query).await?)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn list(&self, status: Option<DeliveryStatus>) -> Result<Vec<Delivery>, RepositoryError> {
        let mut query = Query::new().order_desc("created_at");
        if let Some(status) = status {
            query = query.eq("status", status.to_string());
        }
        decode_all(self.backend.select(Table::Deliveries, &query).await?)
    }

    /// Give a delivery to a courier along with its handoff token.
    ///
    /// Allowed while the parcel has not been picked up; reassigning replaces
    /// the courier and the token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the delivery has moved past `assigned`.
    #[instrument(skip(self, qr_token))]
    pub async fn assign(
        &self,
        id: DeliveryId,
        courier_id: UserId,
        qr_token: &str,
        now: DateTime<Utc>,
    ) -> Result<Delivery, RepositoryError> {
        let filters = [
            Filter::eq("id", id.to_string()),
            Filter::is_in(
                "status",
                [DeliveryStatus::Pending, DeliveryStatus::Assigned].map(|s| s.to_string()),
            ),
        ];
        let changes = patch([
            ("courier_id", json!(courier_id.to_string())),
            ("qr_token", json!(qr_token)),
            ("status", json!(DeliveryStatus::Assigned.to_string())),
            ("assigned_at", json!(now)),
        ]);
        let updated = self.backend.update(Table::Deliveries, &filters, changes).await?;
        match decode_first(updated)? {
            Some(delivery) => Ok(delivery),
            None if self.get(id).await?.is_some() => Err(RepositoryError::Conflict(
                "delivery is already under way".to_owned(),
            )),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Persist a delivery the caller already advanced, guarded on its old status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the stored status is no longer `from`.
    #[instrument(skip(self, delivery), fields(delivery_id = %delivery.id, to = %delivery.status))]
    pub async fn save_transition(
        &self,
        delivery: &Delivery,
        from: DeliveryStatus,
    ) -> Result<Delivery, RepositoryError> {
        let filters = [
            Filter::eq("id", delivery.id.to_string()),
            Filter::eq("status", from.to_string()),
        ];
        let mut changes = encode(delivery)?;
        changes.remove("id");
        changes.remove("created_at");
        let updated = self.backend.update(Table::Deliveries, &filters, changes).await?;
        match decode_first(updated)? {
            Some(saved) => Ok(saved),
            None if self.get(delivery.id).await?.is_some() => Err(RepositoryError::Conflict(
                format!("delivery is no longer {from}"),
            )),
            None => Err(RepositoryError::NotFound),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    #[tokio::test]
    async fn test_one_delivery_per_order() {
        let backend = MemoryBackend::new();
        let repo = DeliveryRepository::new(&backend);
        let order = OrderId::random();
        repo.create(order).await.unwrap();
        assert!(matches!(
            repo.create(order).await.unwrap_err(),
            RepositoryError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_assign_then_guarded_transition() {
        let backend = MemoryBackend::new();
        let repo = DeliveryRepository::new(&backend);
        let created = repo.create(OrderId::random()).await.unwrap();
        let courier = UserId::random();

        let mut assigned = repo.assign(created.id, courier, "tok", Utc::now()).await.unwrap();
        assert!(assigned.is_assigned_to(courier));
        assert_eq!(assigned.status, DeliveryStatus::Assigned);

        assigned.advance(DeliveryStatus::PickedUp, Utc::now()).unwrap();
        let picked = repo
            .save_transition(&assigned, DeliveryStatus::Assigned)
            .await
            .unwrap();
        assert!(picked.picked_up_at.is_some());

        // Saving the same move again finds the status already changed.
        let err = repo
            .save_transition(&assigned, DeliveryStatus::Assigned)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));

        let err = repo
            .assign(created.id, UserId::random(), "tok2", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }
}
