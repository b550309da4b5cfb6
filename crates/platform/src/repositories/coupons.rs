//! Coupon repository, including the usage counter.

use serde_json::json;
use tracing::{debug, instrument};

use bazaar_core::CouponId;
use bazaar_core::models::Coupon;

use super::{CAS_ATTEMPTS, RepositoryError, decode_all, decode_first, encode, patch};
use crate::backend::Backend;
use crate::conversions::{coupon_from_row, coupon_to_row};
use crate::query::{Filter, Query, Table};
use crate::rows::CouponRow;

/// Repository for coupons.
pub struct CouponRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> CouponRepository<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Look up a coupon by code, ignoring case and surrounding whitespace.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        let query = Query::new()
            .eq("code", Coupon::normalize_code(code))
            .limit(1);
        let row: Option<CouponRow> = decode_first(self.backend.select(Table::Coupons, &query).await?)?;
        Ok(row.map(coupon_from_row))
    }

    pub async fn get(&self, id: CouponId) -> Result<Option<Coupon>, RepositoryError> {
        let row = self.get_row(id).await?;
        Ok(row.map(coupon_from_row))
    }

    /// All coupons, by code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn list(&self) -> Result<Vec<Coupon>, RepositoryError> {
        let query = Query::new().order_asc("code");
        let rows: Vec<CouponRow> = decode_all(self.backend.select(Table::Coupons, &query).await?)?;
        Ok(rows.into_iter().map(coupon_from_row).collect())
    }

    /// Insert a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the code is already used.
    #[instrument(skip(self, coupon), fields(code = %coupon.code))]
    pub async fn create(&self, coupon: &Coupon) -> Result<Coupon, RepositoryError> {
        let stored = self
            .backend
            .insert(Table::Coupons, vec![encode(&coupon_to_row(coupon))?])
            .await?;
        let row: CouponRow = decode_first(stored)?
            .ok_or_else(|| RepositoryError::DataCorruption("insert returned no row".to_owned()))?;
        Ok(coupon_from_row(row))
    }

    /// Update everything except the usage counter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn update(&self, coupon: &Coupon) -> Result<Coupon, RepositoryError> {
        let mut row = encode(&coupon_to_row(coupon))?;
        row.remove("id");
        row.remove("usage_count");
        let updated = self
            .backend
            .update(Table::Coupons, &[Filter::eq("id", coupon.id.to_string())], row)
            .await?;
        let row: CouponRow = decode_first(updated)?.ok_or(RepositoryError::NotFound)?;
        Ok(coupon_from_row(row))
    }

    /// Delete a coupon. Orders keep the code they were placed with.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the coupon does not exist.
    pub async fn delete(&self, id: CouponId) -> Result<(), RepositoryError> {
        let deleted = self
            .backend
            .delete(Table::Coupons, &[Filter::eq("id", id.to_string())])
            .await?;
        if deleted.is_empty() {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Count one use of a coupon.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::UsageLimitReached` if the limit was hit in
    /// the meantime, `RepositoryError::Contention` if the counter keeps
    /// changing underneath.
    #[instrument(skip(self))]
    pub async fn record_usage(&self, id: CouponId) -> Result<Coupon, RepositoryError> {
        self.update_usage(id, |row| {
            if row.usage_limit.is_some_and(|limit| row.usage_count >= limit) {
                return Err(RepositoryError::UsageLimitReached {
                    code: row.code.clone(),
                });
            }
            Ok(row.usage_count.saturating_add(1))
        })
        .await
    }

    /// Give back one use, as when a placement is compensated.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Contention` if the counter keeps changing.
    #[instrument(skip(self))]
    pub async fn release_usage(&self, id: CouponId) -> Result<Coupon, RepositoryError> {
        self.update_usage(id, |row| Ok(row.usage_count.saturating_sub(1)))
            .await
    }

    async fn update_usage<F>(&self, id: CouponId, next: F) -> Result<Coupon, RepositoryError>
    where
        F: Fn(&CouponRow) -> Result<u32, RepositoryError> + Send + Sync,
    {
        for attempt in 1..=CAS_ATTEMPTS {
            let row = self.get_row(id).await?.ok_or(RepositoryError::NotFound)?;
            let target = next(&row)?;
            let filters = [
                Filter::eq("id", id.to_string()),
                Filter::eq("usage_count", row.usage_count),
            ];
            let updated = self
                .backend
                .update(Table::Coupons, &filters, patch([("usage_count", json!(target))]))
                .await?;
            if let Some(row) = decode_first::<CouponRow>(updated)? {
                return Ok(coupon_from_row(row));
            }
            debug!(coupon_id = %id, attempt, "Coupon usage changed underneath; retrying");
        }
        Err(RepositoryError::Contention("coupons.usage_count"))
    }

    async fn get_row(&self, id: CouponId) -> Result<Option<CouponRow>, RepositoryError> {
        let query = Query::new().eq("id", id.to_string()).limit(1);
        decode_first(self.backend.select(Table::Coupons, &query).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use bazaar_core::Money;
    use bazaar_core::models::{DiscountKind, DiscountRule};

    use super::*;
    use crate::memory::MemoryBackend;

    fn coupon(code: &str, limit: Option<u32>) -> Coupon {
        Coupon {
            id: CouponId::random(),
            code: code.to_string(),
            description: String::new(),
            rule: DiscountRule {
                kind: DiscountKind::Percent,
                value: Decimal::from(10),
                max_discount: None,
            },
            min_purchase: Money::ZERO,
            valid_from: None,
            valid_until: None,
            usage_limit: limit,
            usage_count: 0,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_find_by_code_is_case_insensitive() {
        let backend = MemoryBackend::new();
        let repo = CouponRepository::new(&backend);
        repo.create(&coupon("save10", None)).await.unwrap();
        let found = repo.find_by_code(" Save10 ").await.unwrap().unwrap();
        assert_eq!(found.code, "SAVE10");
    }

    #[tokio::test]
    async fn test_duplicate_code_conflicts() {
        let backend = MemoryBackend::new();
        let repo = CouponRepository::new(&backend);
        repo.create(&coupon("WELCOME", None)).await.unwrap();
        let err = repo.create(&coupon("welcome", None)).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_usage_limit_enforced() {
        let backend = MemoryBackend::new();
        let repo = CouponRepository::new(&backend);
        let created = repo.create(&coupon("ONCE", Some(1))).await.unwrap();

        assert_eq!(repo.record_usage(created.id).await.unwrap().usage_count, 1);
        let err = repo.record_usage(created.id).await.unwrap_err();
        assert!(matches!(err, RepositoryError::UsageLimitReached { .. }));

        assert_eq!(repo.release_usage(created.id).await.unwrap().usage_count, 0);
    }
}
