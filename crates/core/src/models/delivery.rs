//! Deliveries, courier location samples and the customer-side trail.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    DeliveryId, DeliveryStatus, Lifecycle, LocationSampleId, OrderId, TransitionError, UserId,
};

/// A delivery job for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: DeliveryId,
    pub order_id: OrderId,
    pub courier_id: Option<UserId>,
    /// Signed handoff token printed as a QR code on the parcel.
    pub qr_token: Option<String>,
    pub status: DeliveryStatus,
    pub assigned_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Delivery {
    /// `true` if `courier` is the assigned courier.
    #[must_use]
    pub fn is_assigned_to(&self, courier: UserId) -> bool {
        self.courier_id == Some(courier)
    }

    /// Apply a status change and stamp the matching timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the lifecycle forbids the move.
    pub fn advance(&mut self, next: DeliveryStatus, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.status = self.status.transition_to(next)?;
        match next {
            DeliveryStatus::Assigned => self.assigned_at = Some(now),
            DeliveryStatus::PickedUp => self.picked_up_at = Some(now),
            DeliveryStatus::Delivered => self.delivered_at = Some(now),
            _ => {}
        }
        Ok(())
    }
}

/// Why a location fix was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    #[error("latitude must be between -90 and 90")]
    Latitude,
    #[error("longitude must be between -180 and 180")]
    Longitude,
    #[error("accuracy must be a non-negative number")]
    Accuracy,
    #[error("battery level must be between 0 and 100")]
    Battery,
}

/// A geolocation reading as reported by the courier's device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub battery_level: Option<f64>,
}

impl LocationFix {
    /// Check coordinate ranges.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError`] for out-of-range or non-finite values.
    pub fn validate(&self) -> Result<(), LocationError> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(LocationError::Latitude);
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(LocationError::Longitude);
        }
        if self.accuracy.is_some_and(|a| !a.is_finite() || a < 0.0) {
            return Err(LocationError::Accuracy);
        }
        if self
            .battery_level
            .is_some_and(|b| !(0.0..=100.0).contains(&b))
        {
            return Err(LocationError::Battery);
        }
        Ok(())
    }
}

/// A stored location sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub id: LocationSampleId,
    pub delivery_id: DeliveryId,
    pub courier_id: UserId,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy: Option<f64>,
    pub speed: Option<f64>,
    pub heading: Option<f64>,
    pub battery_level: Option<f64>,
    pub recorded_at: DateTime<Utc>,
}

impl LocationSample {
    /// Build a sample from a validated fix.
    #[must_use]
    pub fn from_fix(
        delivery_id: DeliveryId,
        courier_id: UserId,
        fix: &LocationFix,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LocationSampleId::random(),
            delivery_id,
            courier_id,
            latitude: fix.latitude,
            longitude: fix.longitude,
            accuracy: fix.accuracy,
            speed: fix.speed,
            heading: fix.heading,
            battery_level: fix.battery_level,
            recorded_at,
        }
    }
}

/// Samples kept per tracker.
pub const TRAIL_CAPACITY: usize = 50;

/// The most recent location samples of a delivery, oldest first.
///
/// Fed from both polling and the realtime feed, so the same sample can
/// arrive twice and out of order. Samples are unique by id, sorted by
/// `recorded_at`, and only the newest [`TRAIL_CAPACITY`] are kept.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LocationTrail {
    samples: VecDeque<LocationSample>,
}

impl LocationTrail {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a sample. Returns `false` if it was already present or is
    /// older than everything in a full trail.
    pub fn push(&mut self, sample: LocationSample) -> bool {
        if self.samples.iter().any(|s| s.id == sample.id) {
            return false;
        }
        if self.samples.len() >= TRAIL_CAPACITY
            && self
                .samples
                .front()
                .is_some_and(|oldest| sample.recorded_at < oldest.recorded_at)
        {
            return false;
        }
        let at = self
            .samples
            .partition_point(|s| s.recorded_at <= sample.recorded_at);
        self.samples.insert(at, sample);
        while self.samples.len() > TRAIL_CAPACITY {
            self.samples.pop_front();
        }
        true
    }

    /// Insert many samples; returns how many were new.
    pub fn extend<I: IntoIterator<Item = LocationSample>>(&mut self, samples: I) -> usize {
        samples.into_iter().filter_map(|s| self.push(s).then_some(())).count()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&LocationSample> {
        self.samples.back()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LocationSample> {
        self.samples.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn sample(delivery: DeliveryId, at: DateTime<Utc>) -> LocationSample {
        let fix = LocationFix {
            latitude: 12.97,
            longitude: 77.59,
            accuracy: Some(5.0),
            speed: None,
            heading: None,
            battery_level: Some(80.0),
        };
        LocationSample::from_fix(delivery, UserId::random(), &fix, at)
    }

    fn delivery() -> Delivery {
        Delivery {
            id: DeliveryId::random(),
            order_id: OrderId::random(),
            courier_id: None,
            qr_token: None,
            status: DeliveryStatus::Pending,
            assigned_at: None,
            picked_up_at: None,
            delivered_at: None,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_trail_dedupes_by_id() {
        let mut trail = LocationTrail::new();
        let s = sample(DeliveryId::random(), Utc::now());
        assert!(trail.push(s.clone()));
        assert!(!trail.push(s));
        assert_eq!(trail.len(), 1);
    }

    #[test]
    fn test_trail_orders_by_recorded_at() {
        let delivery = DeliveryId::random();
        let now = Utc::now();
        let mut trail = LocationTrail::new();
        trail.push(sample(delivery, now));
        trail.push(sample(delivery, now - Duration::seconds(30)));
        trail.push(sample(delivery, now - Duration::seconds(10)));
        let times: Vec<_> = trail.iter().map(|s| s.recorded_at).collect();
        let mut sorted = times.clone();
        sorted.sort();
        assert_eq!(times, sorted);
        assert_eq!(trail.latest().unwrap().recorded_at, now);
    }

    #[test]
    fn test_trail_capped() {
        let delivery = DeliveryId::random();
        let start = Utc::now();
        let mut trail = LocationTrail::new();
        let added = trail.extend((0..60).map(|i| sample(delivery, start + Duration::seconds(i))));
        assert_eq!(added, 60);
        assert_eq!(trail.len(), TRAIL_CAPACITY);
        assert_eq!(
            trail.iter().next().unwrap().recorded_at,
            start + Duration::seconds(10)
        );
        // Older than everything in a full trail.
        assert!(!trail.push(sample(delivery, start)));
    }

    #[test]
    fn test_fix_validation() {
        let mut fix = LocationFix {
            latitude: 91.0,
            longitude: 0.0,
            accuracy: None,
            speed: None,
            heading: None,
            battery_level: None,
        };
        assert_eq!(fix.validate(), Err(LocationError::Latitude));
        fix.latitude = 12.0;
        fix.battery_level = Some(140.0);
        assert_eq!(fix.validate(), Err(LocationError::Battery));
        fix.battery_level = Some(40.0);
        assert!(fix.validate().is_ok());
    }

    #[test]
    fn test_delivery_advance_stamps_time() {
        let mut d = delivery();
        let now = Utc::now();
        d.advance(DeliveryStatus::Assigned, now).unwrap();
        assert_eq!(d.assigned_at, Some(now));
        d.advance(DeliveryStatus::PickedUp, now).unwrap();
        assert_eq!(d.picked_up_at, Some(now));
        assert!(d.advance(DeliveryStatus::Delivered, now).is_err());
    }
}
