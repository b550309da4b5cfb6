//! Product repository: catalog reads, admin writes and stock counters.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, instrument};

use bazaar_core::ProductId;
use bazaar_core::models::{Product, ProductDraft};

use super::{CAS_ATTEMPTS, RepositoryError, decode, decode_all, decode_first, encode, patch};
use crate::backend::{Backend, Row};
use crate::conversions::{product_from_row, product_to_row};
use crate::query::{Filter, Query, Table};
use crate::rows::ProductRow;

/// Repository for product rows.
pub struct ProductRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// All products, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    #[instrument(skip(self))]
    pub async fn list(&self, active_only: bool) -> Result<Vec<Product>, RepositoryError> {
        let mut query = Query::new().order_desc("created_at");
        if active_only {
            query = query.eq("is_active", true);
        }
        let rows: Vec<ProductRow> = decode_all(self.backend.select(Table::Products, &query).await?)?;
        Ok(rows.into_iter().map(product_from_row).collect())
    }

    /// Get a product by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn get(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.get_row(id).await?.map(product_from_row))
    }

    /// Products for the given ids, in no particular order. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn get_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = Query::new().filter(Filter::is_in("id", ids.iter().map(ToString::to_string)));
        let rows: Vec<ProductRow> = decode_all(self.backend.select(Table::Products, &query).await?)?;
        Ok(rows.into_iter().map(product_from_row).collect())
    }

    /// Products with stock at or below `threshold`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn low_stock(&self, threshold: u32) -> Result<Vec<Product>, RepositoryError> {
        let query = Query::new()
            .filter(Filter::lte("stock", threshold))
            .eq("is_active", true)
            .order_asc("stock");
        let rows: Vec<ProductRow> = decode_all(self.backend.select(Table::Products, &query).await?)?;
        Ok(rows.into_iter().map(product_from_row).collect())
    }

    /// Insert a validated draft.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create(&self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let row = encode(&product_to_row(ProductId::random(), draft, Utc::now()))?;
        let stored = self.backend.insert(Table::Products, vec![row]).await?;
        let row: ProductRow = decode_first(stored)?
            .ok_or_else(|| RepositoryError::DataCorruption("insert returned no row".to_owned()))?;
        Ok(product_from_row(row))
    }

    /// Replace the editable fields of a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no product has this id.
    #[instrument(skip(self, draft))]
    pub async fn update(&self, id: ProductId, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let mut row = encode(&product_to_row(id, draft, Utc::now()))?;
        row.remove("id");
        row.remove("created_at");
        self.patch_one(id, row).await
    }

    /// Show or hide a product in the storefront.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no product has this id.
    pub async fn set_active(&self, id: ProductId, active: bool) -> Result<Product, RepositoryError> {
        self.patch_one(id, patch([("is_active", json!(active))])).await
    }

    /// Gallery URLs as stored, without the placeholder a product with no
    /// photos is shown with. `None` for an unknown product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn stored_images(&self, id: ProductId) -> Result<Option<Vec<String>>, RepositoryError> {
        Ok(self
            .get_row(id)
            .await?
            .map(|row| row.images.unwrap_or_default()))
    }

    /// Replace the image list.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no product has this id.
    pub async fn set_images(&self, id: ProductId, images: &[String]) -> Result<Product, RepositoryError> {
        self.patch_one(id, patch([("images", json!(images))])).await
    }

    /// Take `quantity` units out of stock.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InsufficientStock` if fewer units are left,
    /// `RepositoryError::Contention` if the counter keeps changing underneath.
    #[instrument(skip(self))]
    pub async fn reserve_stock(&self, id: ProductId, quantity: u32) -> Result<Product, RepositoryError> {
        self.update_stock(id, |stock| {
            stock
                .checked_sub(quantity)
                .ok_or(RepositoryError::InsufficientStock {
                    product_id: id,
                    available: stock,
                    requested: quantity,
                })
        })
        .await
    }

    /// Put `quantity` units back.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Contention` if the counter keeps changing.
    #[instrument(skip(self))]
    pub async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<Product, RepositoryError> {
        self.update_stock(id, |stock| Ok(stock.saturating_add(quantity))).await
    }

    /// Admin stock correction by a signed delta.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::InsufficientStock` if the result would be negative.
    pub async fn adjust_stock(&self, id: ProductId, delta: i64) -> Result<Product, RepositoryError> {
        self.update_stock(id, |stock| {
            let next = i64::from(stock) + delta;
            u32::try_from(next).map_err(|_| RepositoryError::InsufficientStock {
                product_id: id,
                available: stock,
                requested: u32::try_from(delta.unsigned_abs()).unwrap_or(u32::MAX),
            })
        })
        .await
    }

    async fn update_stock<F>(&self, id: ProductId, next: F) -> Result<Product, RepositoryError>
    where
        F: Fn(u32) -> Result<u32, RepositoryError> + Send + Sync,
    {
        for attempt in 1..=CAS_ATTEMPTS {
            let row = self.get_row(id).await?.ok_or(RepositoryError::NotFound)?;
            let current = row.stock.map_or(0, |s| u32::try_from(s.max(0)).unwrap_or(u32::MAX));
            let target = next(current)?;

            let guard = row
                .stock
                .map_or_else(|| Filter::is_null("stock"), |s| Filter::eq("stock", s));
            let filters = [Filter::eq("id", id.to_string()), guard];
            let updated = self
                .backend
                .update(Table::Products, &filters, patch([("stock", json!(target))]))
                .await?;

            if let Some(row) = decode_first::<ProductRow>(updated)? {
                return Ok(product_from_row(row));
            }
            debug!(product_id = %id, attempt, "Stock changed underneath; retrying");
        }
        Err(RepositoryError::Contention("products.stock"))
    }

    async fn get_row(&self, id: ProductId) -> Result<Option<ProductRow>, RepositoryError> {
        let query = Query::new().eq("id", id.to_string()).limit(1);
        decode_first(self.backend.select(Table::Products, &query).await?)
    }

    async fn patch_one(&self, id: ProductId, patch: Row) -> Result<Product, RepositoryError> {
        let updated = self
            .backend
            .update(Table::Products, &[Filter::eq("id", id.to_string())], patch)
            .await?;
        let row = updated.into_iter().next().ok_or(RepositoryError::NotFound)?;
        Ok(product_from_row(decode(row)?))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::Money;

    use super::*;
    use crate::memory::MemoryBackend;

    fn draft(name: &str, stock: u32) -> ProductDraft {
        ProductDraft {
            name: name.to_string(),
            description: String::new(),
            category: "Spices".to_string(),
            price: Money::from_rupees(120),
            original_price: None,
            stock,
            images: vec![],
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_reserve_and_release_stock() {
        let backend = MemoryBackend::new();
        let repo = ProductRepository::new(&backend);
        let product = repo.create(&draft("Turmeric", 5)).await.unwrap();

        let after = repo.reserve_stock(product.id, 3).await.unwrap();
        assert_eq!(after.stock, 2);

        let err = repo.reserve_stock(product.id, 3).await.unwrap_err();
        assert!(matches!(
            err,
            RepositoryError::InsufficientStock { available: 2, requested: 3, .. }
        ));

        let restored = repo.release_stock(product.id, 3).await.unwrap();
        assert_eq!(restored.stock, 5);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_oversell() {
        let backend = MemoryBackend::new();
        let product = ProductRepository::new(&backend)
            .create(&draft("Saffron", 3))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..6 {
            let backend = backend.clone();
            handles.push(tokio::spawn(async move {
                ProductRepository::new(&backend).reserve_stock(product.id, 1).await
            }));
        }
        let mut reserved = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                reserved += 1;
            }
        }
        assert!(reserved <= 3);

        let left = ProductRepository::new(&backend).get(product.id).await.unwrap().unwrap();
        assert_eq!(left.stock, 3 - reserved);
    }

    #[tokio::test]
    async fn test_list_active_only() {
        let backend = MemoryBackend::new();
        let repo = ProductRepository::new(&backend);
        let visible = repo.create(&draft("Cumin", 1)).await.unwrap();
        let hidden = repo.create(&draft("Clove", 1)).await.unwrap();
        repo.set_active(hidden.id, false).await.unwrap();

        let listed = repo.list(true).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, visible.id);
        assert_eq!(repo.list(false).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_adjust_stock_rejects_negative() {
        let backend = MemoryBackend::new();
        let repo = ProductRepository::new(&backend);
        let product = repo.create(&draft("Pepper", 2)).await.unwrap();
        assert_eq!(repo.adjust_stock(product.id, 8).await.unwrap().stock, 10);
        assert!(repo.adjust_stock(product.id, -11).await.is_err());
    }
}
