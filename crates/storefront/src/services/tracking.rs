//! Customer-side delivery tracking.
//!
//! A tracker merges two sources into one [`LocationTrail`]: a slow poll of
//! the platform and the realtime feed for `delivery_location_tracking`.
//! Either may repeat or reorder samples; the trail sorts that out and only
//! new samples are emitted.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use bazaar_core::models::{Delivery, LocationSample, LocationTrail};
use bazaar_core::{DeliveryId, DeliveryStatus, Lifecycle, OrderId, OrderStatus, UserId};
use bazaar_platform::repositories::{DeliveryRepository, LocationRepository};
use bazaar_platform::{Backend, ChangeFeed, Filter, RepositoryError, Table};

use crate::error::AppError;
use crate::services::orders;

/// How often the tracker re-reads the platform.
pub const POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Tracking page state for one order.
#[derive(Debug, Clone, Serialize)]
pub struct TrackingSnapshot {
    pub order_id: OrderId,
    pub order_status: OrderStatus,
    /// `None` until the back office creates the delivery.
    pub delivery: Option<Delivery>,
    pub trail: LocationTrail,
}

/// One update pushed to a following customer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TrackingEvent {
    Location(LocationSample),
    Status(DeliveryStatus),
}

// The handoff code is for the courier only.
fn customer_view(mut delivery: Delivery) -> Delivery {
    delivery.qr_token = None;
    delivery
}

/// Current tracking state of one of the customer's orders.
///
/// # Errors
///
/// Returns `AppError::NotFound` if the order is not the customer's.
#[instrument(skip(backend))]
pub async fn snapshot(
    backend: &dyn Backend,
    user_id: UserId,
    order_id: OrderId,
) -> Result<TrackingSnapshot, AppError> {
    let order = orders::get(backend, user_id, order_id).await?;
    let delivery = DeliveryRepository::new(backend).for_order(order_id).await?;
    let mut trail = LocationTrail::new();
    if let Some(delivery) = &delivery {
        trail.extend(LocationRepository::new(backend).recent(delivery.id).await?);
    }
    Ok(TrackingSnapshot {
        order_id,
        order_status: order.status,
        delivery: delivery.map(customer_view),
        trail,
    })
}

enum Step {
    Poll,
    Change(Option<Option<LocationSample>>),
}

async fn next_change(feed: &mut Option<ChangeFeed>) -> Option<Option<LocationSample>> {
    match feed.as_mut() {
        Some(feed) => feed.next().await.map(|event| {
            event
                .record
                .and_then(|row| serde_json::from_value(Value::Object(row)).ok())
        }),
        None => std::future::pending().await,
    }
}

async fn poll(
    backend: &dyn Backend,
    delivery_id: DeliveryId,
) -> Result<(Option<Delivery>, Vec<LocationSample>), RepositoryError> {
    let delivery = DeliveryRepository::new(backend).get(delivery_id).await?;
    let samples = LocationRepository::new(backend).recent(delivery_id).await?;
    Ok((delivery, samples))
}

/// Follow a delivery until it finishes or the consumer drops the stream.
///
/// The first poll runs immediately, so the stream opens with the samples
/// already recorded. Losing the realtime feed degrades to polling only.
pub fn follow(
    backend: Arc<dyn Backend>,
    delivery: Delivery,
    interval: Duration,
) -> impl Stream<Item = TrackingEvent> + Send {
    async_stream::stream! {
        let delivery_id = delivery.id;
        let mut status = delivery.status;
        let mut trail = LocationTrail::new();

        let mut feed = match backend
            .subscribe(
                Table::DeliveryLocationTracking,
                Some(Filter::eq("delivery_id", delivery_id.to_string())),
            )
            .await
        {
            Ok(feed) => Some(feed),
            Err(err) => {
                warn!(%delivery_id, error = %err, "Realtime feed unavailable, polling only");
                None
            }
        };
        let mut ticker = tokio::time::interval(interval);

        while !status.is_terminal() {
            let step = tokio::select! {
                _ = ticker.tick() => Step::Poll,
                change = next_change(&mut feed) => Step::Change(change),
            };

            match step {
                Step::Poll => match poll(backend.as_ref(), delivery_id).await {
                    Ok((current, samples)) => {
                        for sample in samples {
                            if trail.push(sample.clone()) {
                                yield TrackingEvent::Location(sample);
                            }
                        }
                        if let Some(current) = current
                            && current.status != status
                        {
                            status = current.status;
                            yield TrackingEvent::Status(status);
                        }
                    }
                    Err(err) => warn!(%delivery_id, error = %err, "Tracking poll failed"),
                },
                Step::Change(Some(Some(sample))) => {
                    if trail.push(sample.clone()) {
                        yield TrackingEvent::Location(sample);
                    }
                }
                Step::Change(Some(None)) => {}
                Step::Change(None) => {
                    debug!(%delivery_id, "Realtime feed closed");
                    feed = None;
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::UserRole;
    use bazaar_core::models::LocationFix;
    use bazaar_platform::MemoryBackend;
    use chrono::Utc;

    use super::*;
    use crate::services::fixtures::{draft, seed_order, seed_product, seed_profile};

    const WAIT: Duration = Duration::from_secs(2);

    fn fix(latitude: f64) -> LocationFix {
        LocationFix {
            latitude,
            longitude: 77.59,
            accuracy: Some(4.0),
            speed: None,
            heading: None,
            battery_level: None,
        }
    }

    async fn in_transit(backend: &MemoryBackend, order_id: OrderId, courier: UserId) -> Delivery {
        let repo = DeliveryRepository::new(backend);
        let delivery = repo.create(order_id).await.unwrap();
        let mut delivery = repo.assign(delivery.id, courier, "qr", Utc::now()).await.unwrap();
        for next in [DeliveryStatus::PickedUp, DeliveryStatus::InTransit] {
            let from = delivery.status;
            delivery.advance(next, Utc::now()).unwrap();
            delivery = repo.save_transition(&delivery, from).await.unwrap();
        }
        delivery
    }

    async fn record(backend: &MemoryBackend, delivery: &Delivery, latitude: f64) -> LocationSample {
        let sample = LocationSample::from_fix(
            delivery.id,
            delivery.courier_id.unwrap(),
            &fix(latitude),
            Utc::now(),
        );
        LocationRepository::new(backend).insert(&sample).await.unwrap()
    }

    #[tokio::test]
    async fn test_snapshot_hides_handoff_code() {
        let backend = MemoryBackend::new();
        let profile = seed_profile(&backend, UserRole::Customer).await;
        let product = seed_product(&backend, draft("Tea", 200, 3)).await;
        let order = seed_order(&backend, profile.id, &product, 1, OrderStatus::Shipped).await;
        let delivery = in_transit(&backend, order.id, UserId::random()).await;
        record(&backend, &delivery, 12.9).await;

        let snap = snapshot(&backend, profile.id, order.id).await.unwrap();
        let shown = snap.delivery.unwrap();
        assert_eq!(shown.status, DeliveryStatus::InTransit);
        assert!(shown.qr_token.is_none());
        assert_eq!(snap.trail.len(), 1);

        let err = snapshot(&backend, UserId::random(), order.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_follow_merges_poll_and_feed_without_repeats() {
        let backend = Arc::new(MemoryBackend::new());
        let delivery = in_transit(&backend, OrderId::random(), UserId::random()).await;
        let first = record(&backend, &delivery, 12.90).await;

        let stream = follow(backend.clone(), delivery.clone(), Duration::from_secs(3600));
        let mut stream = Box::pin(stream);

        let opened = tokio::time::timeout(WAIT, stream.next()).await.unwrap().unwrap();
        assert!(matches!(opened, TrackingEvent::Location(s) if s.id == first.id));

        let second = record(&backend, &delivery, 12.91).await;
        let pushed = tokio::time::timeout(WAIT, stream.next()).await.unwrap().unwrap();
        assert!(matches!(pushed, TrackingEvent::Location(s) if s.id == second.id));
    }

    #[tokio::test]
    async fn test_follow_ends_on_delivery() {
        let backend = Arc::new(MemoryBackend::new());
        let delivery = in_transit(&backend, OrderId::random(), UserId::random()).await;

        let stream = follow(backend.clone(), delivery.clone(), Duration::from_millis(20));

        let mut done = delivery.clone();
        done.advance(DeliveryStatus::Delivered, Utc::now()).unwrap();
        DeliveryRepository::new(backend.as_ref())
            .save_transition(&done, DeliveryStatus::InTransit)
            .await
            .unwrap();

        let events: Vec<_> = tokio::time::timeout(WAIT, stream.collect::<Vec<_>>())
            .await
            .unwrap();
        assert!(matches!(
            events.last(),
            Some(TrackingEvent::Status(DeliveryStatus::Delivered))
        ));
    }
}
