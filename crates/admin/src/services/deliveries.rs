//! Deliveries and courier assignment.
//!
//! Assigning a courier mints the handoff code: a [`DeliveryCapability`]
//! signed with the key the storefront's courier portal verifies against.
//! The code is stored on the delivery, so reassigning replaces it and the
//! old one stops matching.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use bazaar_core::models::{Delivery, Profile};
use bazaar_core::token::{DeliveryCapability, Signer};
use bazaar_core::{DeliveryId, DeliveryStatus, Lifecycle, OrderId, OrderStatus, UserId, UserRole};
use bazaar_platform::repositories::{DeliveryRepository, OrderRepository, ProfileRepository};
use bazaar_platform::{Backend, RepositoryError};

use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
pub struct DeliveryFilter {
    pub status: Option<DeliveryStatus>,
}

#[derive(Debug, Deserialize)]
pub struct NewDelivery {
    pub order_id: OrderId,
}

#[derive(Debug, Deserialize)]
pub struct Assignment {
    pub courier_id: UserId,
}

/// A delivery partner with their workload.
#[derive(Debug, Clone, Serialize)]
pub struct CourierSummary {
    #[serde(flatten)]
    pub profile: Profile,
    /// Deliveries assigned and not yet finished.
    pub active_deliveries: usize,
}

/// # Errors
///
/// Returns `AppError` if the platform read fails.
pub async fn list(backend: &dyn Backend, filter: &DeliveryFilter) -> Result<Vec<Delivery>, AppError> {
    Ok(DeliveryRepository::new(backend).list(filter.status).await?)
}

/// # Errors
///
/// Returns `AppError::NotFound` for an unknown delivery.
pub async fn get(backend: &dyn Backend, id: DeliveryId) -> Result<Delivery, AppError> {
    DeliveryRepository::new(backend)
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Delivery".to_owned()))
}

/// Open the delivery for an order that is ready to go out.
///
/// A confirmed order moves to processing on the way.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the order is not confirmed or
/// processing and `AppError::Conflict` if it already has a delivery.
#[instrument(skip(backend))]
pub async fn create(backend: &dyn Backend, order_id: OrderId) -> Result<Delivery, AppError> {
    let orders = OrderRepository::new(backend);
    let order = orders
        .get(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_owned()))?;
    if !matches!(order.status, OrderStatus::Confirmed | OrderStatus::Processing) {
        return Err(AppError::BadRequest(format!(
            "Only confirmed or processing orders can be dispatched, this one is {}",
            order.status
        )));
    }

    let deliveries = DeliveryRepository::new(backend);
    if deliveries.for_order(order_id).await?.is_some() {
        return Err(already_exists());
    }
    let delivery = deliveries.create(order_id).await.map_err(|e| match e {
        RepositoryError::Conflict(_) => already_exists(),
        other => other.into(),
    })?;

    if order.status == OrderStatus::Confirmed {
        let next = order.status.transition_to(OrderStatus::Processing)?;
        orders
            .set_status(order_id, order.status, next, Utc::now())
            .await?;
    }

    info!(delivery_id = %delivery.id, %order_id, "Delivery created");
    Ok(delivery)
}

fn already_exists() -> AppError {
    AppError::Conflict("This order already has a delivery".to_owned())
}

/// Sign a handoff code for `delivery_id` valid until `now + ttl`.
///
/// # Errors
///
/// Returns `AppError::Token` if signing fails.
pub fn mint_token(
    signer: &Signer,
    delivery_id: DeliveryId,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<String, AppError> {
    Ok(signer.sign(&DeliveryCapability {
        delivery_id,
        expires_at: now + ttl,
    })?)
}

/// Give a pending or assigned delivery to a courier with a fresh code.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if the account is not a delivery partner
/// and `AppError::Repository` (conflict) once the parcel has been picked up.
#[instrument(skip(backend, signer))]
pub async fn assign(
    backend: &dyn Backend,
    signer: &Signer,
    ttl: Duration,
    id: DeliveryId,
    courier_id: UserId,
) -> Result<Delivery, AppError> {
    let courier = ProfileRepository::new(backend).get(courier_id).await?;
    if courier.is_none_or(|p| p.role != UserRole::DeliveryPartner) {
        return Err(AppError::BadRequest(
            "Deliveries can only be assigned to delivery partners".to_owned(),
        ));
    }

    let delivery = get(backend, id).await?;
    if !matches!(delivery.status, DeliveryStatus::Pending | DeliveryStatus::Assigned) {
        return Err(AppError::Conflict(format!(
            "Delivery is already {}",
            delivery.status
        )));
    }

    let now = Utc::now();
    let token = mint_token(signer, id, now, ttl)?;
    let assigned = DeliveryRepository::new(backend)
        .assign(id, courier_id, &token, now)
        .await?;
    info!(delivery_id = %id, %courier_id, expires_in_hours = ttl.num_hours(), "Courier assigned");
    Ok(assigned)
}

/// Cancel a delivery before it goes in transit.
///
/// # Errors
///
/// Returns `AppError::Transition` once the parcel is in transit or done.
#[instrument(skip(backend))]
pub async fn cancel(backend: &dyn Backend, id: DeliveryId) -> Result<Delivery, AppError> {
    let mut delivery = get(backend, id).await?;
    let from = delivery.status;
    delivery.advance(DeliveryStatus::Cancelled, Utc::now())?;
    let saved = DeliveryRepository::new(backend)
        .save_transition(&delivery, from)
        .await?;
    info!(delivery_id = %id, %from, "Delivery cancelled");
    Ok(saved)
}

/// Every delivery partner and how many open jobs they hold.
///
/// # Errors
///
/// Returns `AppError` if the platform read fails.
pub async fn couriers(backend: &dyn Backend) -> Result<Vec<CourierSummary>, AppError> {
    let profiles = ProfileRepository::new(backend)
        .list_by_role(UserRole::DeliveryPartner)
        .await?;
    let deliveries = DeliveryRepository::new(backend);
    let mut summaries = Vec::with_capacity(profiles.len());
    for profile in profiles {
        let active_deliveries = deliveries
            .list_for_courier(profile.id)
            .await?
            .iter()
            .filter(|d| !d.status.is_terminal())
            .count();
        summaries.push(CourierSummary {
            profile,
            active_deliveries,
        });
    }
    Ok(summaries)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_platform::MemoryBackend;

    use super::*;
    use crate::services::fixtures::{draft, seed_order, seed_product, seed_profile};

    const TTL_HOURS: i64 = 48;

    fn signer() -> Signer {
        Signer::new("delivery-token-key-for-tests-only-01")
    }

    async fn confirmed_order(backend: &MemoryBackend) -> OrderId {
        let customer = seed_profile(backend, UserRole::Customer).await;
        let product = seed_product(backend, draft("Mustard seeds", 60, 9)).await;
        seed_order(backend, customer.id, &product, 1, OrderStatus::Confirmed)
            .await
            .id
    }

    #[tokio::test]
    async fn test_create_moves_order_to_processing() {
        let backend = MemoryBackend::new();
        let order_id = confirmed_order(&backend).await;

        let delivery = create(&backend, order_id).await.unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Pending);
        let order = OrderRepository::new(&backend).get(order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Processing);

        let err = create(&backend, order_id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_pending_order_not_dispatched() {
        let backend = MemoryBackend::new();
        let customer = seed_profile(&backend, UserRole::Customer).await;
        let product = seed_product(&backend, draft("Fennel", 40, 9)).await;
        let order = seed_order(&backend, customer.id, &product, 1, OrderStatus::Pending).await;

        let err = create(&backend, order.id).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_assign_mints_verifiable_token() {
        let backend = MemoryBackend::new();
        let order_id = confirmed_order(&backend).await;
        let courier = seed_profile(&backend, UserRole::DeliveryPartner).await;
        let delivery = create(&backend, order_id).await.unwrap();

        let assigned = assign(
            &backend,
            &signer(),
            Duration::hours(TTL_HOURS),
            delivery.id,
            courier.id,
        )
        .await
        .unwrap();
        assert_eq!(assigned.status, DeliveryStatus::Assigned);
        assert!(assigned.is_assigned_to(courier.id));

        let token = assigned.qr_token.unwrap();
        let claims: DeliveryCapability = signer().verify(&token, Utc::now()).unwrap();
        assert_eq!(claims.delivery_id, delivery.id);
        assert!(claims.expires_at > Utc::now() + Duration::hours(TTL_HOURS - 1));
    }

    #[tokio::test]
    async fn test_reassignment_replaces_token() {
        let backend = MemoryBackend::new();
        let order_id = confirmed_order(&backend).await;
        let first = seed_profile(&backend, UserRole::DeliveryPartner).await;
        let second = seed_profile(&backend, UserRole::DeliveryPartner).await;
        let delivery = create(&backend, order_id).await.unwrap();
        let ttl = Duration::hours(TTL_HOURS);

        let a = assign(&backend, &signer(), ttl, delivery.id, first.id).await.unwrap();
        let b = assign(&backend, &signer(), ttl, delivery.id, second.id).await.unwrap();
        assert_ne!(a.qr_token, b.qr_token);
        assert!(b.is_assigned_to(second.id));

        let summaries = couriers(&backend).await.unwrap();
        let load = |id: UserId| {
            summaries
                .iter()
                .find(|s| s.profile.id == id)
                .unwrap()
                .active_deliveries
        };
        assert_eq!(load(first.id), 0);
        assert_eq!(load(second.id), 1);
    }

    #[tokio::test]
    async fn test_customer_cannot_be_assigned() {
        let backend = MemoryBackend::new();
        let order_id = confirmed_order(&backend).await;
        let customer = seed_profile(&backend, UserRole::Customer).await;
        let delivery = create(&backend, order_id).await.unwrap();

        let err = assign(
            &backend,
            &signer(),
            Duration::hours(TTL_HOURS),
            delivery.id,
            customer.id,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_picked_up_delivery_keeps_its_courier() {
        let backend = MemoryBackend::new();
        let order_id = confirmed_order(&backend).await;
        let courier = seed_profile(&backend, UserRole::DeliveryPartner).await;
        let delivery = create(&backend, order_id).await.unwrap();
        let ttl = Duration::hours(TTL_HOURS);
        let mut assigned = assign(&backend, &signer(), ttl, delivery.id, courier.id)
            .await
            .unwrap();
        assigned.advance(DeliveryStatus::PickedUp, Utc::now()).unwrap();
        DeliveryRepository::new(&backend)
            .save_transition(&assigned, DeliveryStatus::Assigned)
            .await
            .unwrap();

        let err = assign(&backend, &signer(), ttl, delivery.id, courier.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        let cancelled = cancel(&backend, delivery.id).await.unwrap();
        assert_eq!(cancelled.status, DeliveryStatus::Cancelled);
    }
}
