//! Delivery-partner handoff and location ingest.
//!
//! Every status change needs the QR code printed on the parcel. The code is
//! a signed [`DeliveryCapability`]; it is checked for signature, expiry,
//! delivery and courier before anything is written. Location fixes are
//! accepted only from the assigned courier while the parcel is in transit.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use bazaar_core::models::{Delivery, LocationError, LocationFix, LocationSample};
use bazaar_core::token::{DeliveryCapability, Signer, TokenError};
use bazaar_core::{
    DeliveryId, DeliveryStatus, OrderStatus, PaymentMethod, PaymentStatus,
    TransitionError, UserId,
};
use bazaar_platform::repositories::{DeliveryRepository, LocationRepository, OrderRepository};
use bazaar_platform::{Backend, RepositoryError};

use crate::error::AppError;

/// Why a courier action was refused.
#[derive(Debug, Error)]
pub enum HandoffError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Invalid delivery code: {0}")]
    Token(#[from] TokenError),

    #[error("This delivery is not assigned to you")]
    NotAssigned,

    #[error("This code belongs to a different delivery")]
    WrongDelivery,

    #[error("{0}")]
    Transition(#[from] TransitionError),

    #[error("Location updates are only accepted in transit (delivery is {0})")]
    NotInTransit(DeliveryStatus),

    #[error("Invalid location: {0}")]
    Location(#[from] LocationError),
}

/// A status change submitted from the courier portal.
#[derive(Debug, Clone, Deserialize)]
pub struct HandoffRequest {
    /// Text read from the parcel's QR code, or typed in by hand.
    pub qr_token: String,
    pub status: DeliveryStatus,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

/// Order statuses a delivery walks the order through, in order.
const ORDER_PATH: [OrderStatus; 5] = [
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
];

/// Deliveries assigned to the courier, newest first.
///
/// # Errors
///
/// Returns `AppError` if the platform read fails.
pub async fn assigned(backend: &dyn Backend, courier_id: UserId) -> Result<Vec<Delivery>, AppError> {
    Ok(DeliveryRepository::new(backend)
        .list_for_courier(courier_id)
        .await?)
}

async fn load_assigned(
    backend: &dyn Backend,
    courier_id: UserId,
    delivery_id: DeliveryId,
) -> Result<Delivery, HandoffError> {
    let delivery = DeliveryRepository::new(backend)
        .get(delivery_id)
        .await?
        .ok_or(RepositoryError::NotFound)?;
    if !delivery.is_assigned_to(courier_id) {
        return Err(HandoffError::NotAssigned);
    }
    Ok(delivery)
}

/// Check a scanned code against a delivery assigned to `courier_id`.
///
/// A code from an earlier assignment no longer matches the stored one and
/// is refused even while its signature is still valid.
///
/// # Errors
///
/// Returns [`HandoffError`] if the delivery is someone else's or the code
/// is forged, expired, or issued for another delivery.
#[instrument(skip(backend, signer, scanned))]
pub async fn verify(
    backend: &dyn Backend,
    signer: &Signer,
    courier_id: UserId,
    delivery_id: DeliveryId,
    scanned: &str,
    now: DateTime<Utc>,
) -> Result<Delivery, HandoffError> {
    let delivery = load_assigned(backend, courier_id, delivery_id).await?;
    let scanned = scanned.trim();
    let capability: DeliveryCapability = signer.verify(scanned, now)?;
    if capability.delivery_id != delivery.id || delivery.qr_token.as_deref() != Some(scanned) {
        return Err(HandoffError::WrongDelivery);
    }
    Ok(delivery)
}

/// Move the order along the normal path up to `target`, one step at a time.
async fn sync_order(backend: &dyn Backend, delivery: &Delivery, target: OrderStatus, now: DateTime<Utc>) {
    let orders = OrderRepository::new(backend);
    let order = match orders.get(delivery.order_id).await {
        Ok(Some(order)) => order,
        Ok(None) => {
            warn!(order_id = %delivery.order_id, "Delivery has no order");
            return;
        }
        Err(err) => {
            warn!(order_id = %delivery.order_id, error = %err, "Order status not synced");
            return;
        }
    };

    let (Some(start), Some(end)) = (
        ORDER_PATH.iter().position(|s| *s == order.status),
        ORDER_PATH.iter().position(|s| *s == target),
    ) else {
        warn!(order_id = %order.id, status = %order.status, %target, "Order is off the delivery path");
        return;
    };

    for pair in ORDER_PATH.get(start..=end).unwrap_or_default().windows(2) {
        if let &[from, to] = pair
            && let Err(err) = orders.set_status(order.id, from, to, now).await
        {
            warn!(order_id = %order.id, %from, %to, error = %err, "Order status not synced");
            return;
        }
    }

    if target == OrderStatus::Delivered
        && order.payment_method == PaymentMethod::CashOnDelivery
        && order.payment_status == PaymentStatus::Pending
        && let Err(err) = orders.set_payment_status(order.id, PaymentStatus::Paid, now).await
    {
        warn!(order_id = %order.id, error = %err, "Cash payment not recorded");
    }
}

/// Apply a courier status change after checking the parcel's code.
///
/// Picking up or moving the parcel ships the order; delivering it marks the
/// order delivered. Order updates are best effort once the delivery itself
/// has been saved.
///
/// # Errors
///
/// Returns `AppError::Forbidden` for statuses only the back office sets and
/// [`HandoffError`] when the code or the transition is refused.
#[instrument(skip(backend, signer, request), fields(to = %request.status))]
pub async fn transition(
    backend: &dyn Backend,
    signer: &Signer,
    courier_id: UserId,
    delivery_id: DeliveryId,
    request: &HandoffRequest,
    now: DateTime<Utc>,
) -> Result<Delivery, AppError> {
    if matches!(
        request.status,
        DeliveryStatus::Pending | DeliveryStatus::Assigned | DeliveryStatus::Cancelled
    ) {
        return Err(AppError::Forbidden(format!(
            "Couriers cannot set a delivery to {}",
            request.status
        )));
    }

    let mut delivery = verify(backend, signer, courier_id, delivery_id, &request.qr_token, now).await?;
    let from = delivery.status;
    delivery
        .advance(request.status, now)
        .map_err(HandoffError::from)?;
    if request.status == DeliveryStatus::Failed {
        delivery.failure_reason = request
            .failure_reason
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_owned);
    }

    let saved = DeliveryRepository::new(backend)
        .save_transition(&delivery, from)
        .await
        .map_err(HandoffError::from)?;

    if let Some(target) = saved.status.implied_order_status() {
        sync_order(backend, &saved, target, now).await;
    }

    info!(%delivery_id, %from, to = %saved.status, "Delivery status changed");
    Ok(saved)
}

/// Store one location fix from the assigned courier.
///
/// # Errors
///
/// Returns [`HandoffError`] for invalid coordinates, another courier's
/// delivery, or a delivery that is not in transit.
#[instrument(skip(backend, fix))]
pub async fn record_location(
    backend: &dyn Backend,
    courier_id: UserId,
    delivery_id: DeliveryId,
    fix: &LocationFix,
    now: DateTime<Utc>,
) -> Result<LocationSample, HandoffError> {
    fix.validate()?;
    let delivery = load_assigned(backend, courier_id, delivery_id).await?;
    if !delivery.status.accepts_location() {
        return Err(HandoffError::NotInTransit(delivery.status));
    }
    let sample = LocationSample::from_fix(delivery_id, courier_id, fix, now);
    Ok(LocationRepository::new(backend).insert(&sample).await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use bazaar_core::UserRole;
    use bazaar_platform::MemoryBackend;

    use super::*;
    use crate::services::fixtures::{draft, seed_order, seed_product, seed_profile};

    const SECRET: &str = "courier-test-secret";

    struct Setup {
        backend: MemoryBackend,
        signer: Signer,
        courier: UserId,
        delivery: Delivery,
        token: String,
    }

    async fn setup(order_status: OrderStatus) -> Setup {
        let backend = MemoryBackend::new();
        let customer = seed_profile(&backend, UserRole::Customer).await;
        let courier = seed_profile(&backend, UserRole::DeliveryPartner).await.id;
        let product = seed_product(&backend, draft("Rice", 600, 5)).await;
        let order = seed_order(&backend, customer.id, &product, 1, order_status).await;

        let signer = Signer::new(SECRET);
        let repo = DeliveryRepository::new(&backend);
        let delivery = repo.create(order.id).await.unwrap();
        let token = signer
            .sign(&DeliveryCapability {
                delivery_id: delivery.id,
                expires_at: Utc::now() + Duration::hours(48),
            })
            .unwrap();
        let delivery = repo.assign(delivery.id, courier, &token, Utc::now()).await.unwrap();
        Setup {
            backend,
            signer,
            courier,
            delivery,
            token,
        }
    }

    fn request(token: &str, status: DeliveryStatus) -> HandoffRequest {
        HandoffRequest {
            qr_token: token.to_owned(),
            status,
            failure_reason: None,
        }
    }

    fn fix() -> LocationFix {
        LocationFix {
            latitude: 19.07,
            longitude: 72.87,
            accuracy: Some(8.0),
            speed: Some(3.5),
            heading: None,
            battery_level: Some(64.0),
        }
    }

    async fn order_status(s: &Setup) -> OrderStatus {
        OrderRepository::new(&s.backend)
            .get(s.delivery.order_id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn test_full_handoff_moves_order() {
        let s = setup(OrderStatus::Confirmed).await;
        let now = Utc::now();

        for (next, expected) in [
            (DeliveryStatus::PickedUp, OrderStatus::Shipped),
            (DeliveryStatus::InTransit, OrderStatus::Shipped),
            (DeliveryStatus::Delivered, OrderStatus::Delivered),
        ] {
            let saved = transition(&s.backend, &s.signer, s.courier, s.delivery.id, &request(&s.token, next), now)
                .await
                .unwrap();
            assert_eq!(saved.status, next);
            assert_eq!(order_status(&s).await, expected);
        }
        let done = DeliveryRepository::new(&s.backend).get(s.delivery.id).await.unwrap().unwrap();
        assert!(done.picked_up_at.is_some());
        assert!(done.delivered_at.is_some());

        let order = OrderRepository::new(&s.backend)
            .get(s.delivery.order_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_pending_order_walks_forward_one_step_at_a_time() {
        let s = setup(OrderStatus::Pending).await;
        transition(
            &s.backend,
            &s.signer,
            s.courier,
            s.delivery.id,
            &request(&s.token, DeliveryStatus::PickedUp),
            Utc::now(),
        )
        .await
        .unwrap();
        assert_eq!(order_status(&s).await, OrderStatus::Shipped);
    }

    #[tokio::test]
    async fn test_other_courier_refused() {
        let s = setup(OrderStatus::Confirmed).await;
        let err = verify(&s.backend, &s.signer, UserId::random(), s.delivery.id, &s.token, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::NotAssigned));
    }

    #[tokio::test]
    async fn test_forged_expired_and_foreign_codes_refused() {
        let s = setup(OrderStatus::Confirmed).await;

        let forged = Signer::new("not-the-secret")
            .sign(&DeliveryCapability {
                delivery_id: s.delivery.id,
                expires_at: Utc::now() + Duration::hours(1),
            })
            .unwrap();
        let err = verify(&s.backend, &s.signer, s.courier, s.delivery.id, &forged, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::Token(TokenError::BadSignature)));

        let later = Utc::now() + Duration::hours(49);
        let err = verify(&s.backend, &s.signer, s.courier, s.delivery.id, &s.token, later)
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::Token(TokenError::Expired(_))));

        let other = s
            .signer
            .sign(&DeliveryCapability {
                delivery_id: DeliveryId::random(),
                expires_at: Utc::now() + Duration::hours(1),
            })
            .unwrap();
        let err = verify(&s.backend, &s.signer, s.courier, s.delivery.id, &other, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::WrongDelivery));
    }

    #[tokio::test]
    async fn test_courier_cannot_cancel() {
        let s = setup(OrderStatus::Confirmed).await;
        let err = transition(
            &s.backend,
            &s.signer,
            s.courier,
            s.delivery.id,
            &request(&s.token, DeliveryStatus::Cancelled),
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_skipping_a_step_is_refused() {
        let s = setup(OrderStatus::Confirmed).await;
        let err = transition(
            &s.backend,
            &s.signer,
            s.courier,
            s.delivery.id,
            &request(&s.token, DeliveryStatus::Delivered),
            Utc::now(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::Handoff(HandoffError::Transition(_))));
        assert_eq!(order_status(&s).await, OrderStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_location_only_while_in_transit() {
        let s = setup(OrderStatus::Confirmed).await;
        let err = record_location(&s.backend, s.courier, s.delivery.id, &fix(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::NotInTransit(DeliveryStatus::Assigned)));

        for next in [DeliveryStatus::PickedUp, DeliveryStatus::InTransit] {
            transition(&s.backend, &s.signer, s.courier, s.delivery.id, &request(&s.token, next), Utc::now())
                .await
                .unwrap();
        }
        record_location(&s.backend, s.courier, s.delivery.id, &fix(), Utc::now())
            .await
            .unwrap();
        let err = record_location(&s.backend, UserId::random(), s.delivery.id, &fix(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::NotAssigned));

        transition(
            &s.backend,
            &s.signer,
            s.courier,
            s.delivery.id,
            &request(&s.token, DeliveryStatus::Delivered),
            Utc::now(),
        )
        .await
        .unwrap();
        let err = record_location(&s.backend, s.courier, s.delivery.id, &fix(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::NotInTransit(DeliveryStatus::Delivered)));
        assert_eq!(
            LocationRepository::new(&s.backend).recent(s.delivery.id).await.unwrap().len(),
            1
        );
    }

    #[tokio::test]
    async fn test_bad_coordinates_refused() {
        let s = setup(OrderStatus::Confirmed).await;
        let mut bad = fix();
        bad.latitude = 123.0;
        let err = record_location(&s.backend, s.courier, s.delivery.id, &bad, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, HandoffError::Location(LocationError::Latitude)));
    }

    #[tokio::test]
    async fn test_failed_delivery_keeps_reason() {
        let s = setup(OrderStatus::Confirmed).await;
        for next in [DeliveryStatus::PickedUp, DeliveryStatus::InTransit] {
            transition(&s.backend, &s.signer, s.courier, s.delivery.id, &request(&s.token, next), Utc::now())
                .await
                .unwrap();
        }
        let mut failed = request(&s.token, DeliveryStatus::Failed);
        failed.failure_reason = Some(" Customer not home ".to_owned());
        let saved = transition(&s.backend, &s.signer, s.courier, s.delivery.id, &failed, Utc::now())
            .await
            .unwrap();
        assert_eq!(saved.failure_reason.as_deref(), Some("Customer not home"));
        assert_eq!(assigned(&s.backend, s.courier).await.unwrap().len(), 1);
    }
}
