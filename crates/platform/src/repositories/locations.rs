//! Courier location samples (`delivery_location_tracking`).

use bazaar_core::models::delivery::TRAIL_CAPACITY;
use bazaar_core::DeliveryId;
use bazaar_core::models::LocationSample;

use super::{RepositoryError, decode_all, decode_first, encode};
use crate::backend::Backend;
use crate::query::{Query, Table};

pub struct LocationRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> LocationRepository<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Store one sample.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn insert(&self, sample: &LocationSample) -> Result<LocationSample, RepositoryError> {
        let stored = self
            .backend
            .insert(Table::DeliveryLocationTracking, vec![encode(sample)?])
            .await?;
        decode_first(stored)?
            .ok_or_else(|| RepositoryError::DataCorruption("insert returned no row".to_owned()))
    }

    /// The latest samples for a delivery, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn recent(&self, delivery_id: DeliveryId) -> Result<Vec<LocationSample>, RepositoryError> {
        let query = Query::new()
            .eq("delivery_id", delivery_id.to_string())
            .order_desc("recorded_at")
            .limit(TRAIL_CAPACITY);
        let mut samples: Vec<LocationSample> =
            decode_all(self.backend.select(Table::DeliveryLocationTracking, &query).await?)?;
        samples.reverse();
        Ok(samples)
    }
}
