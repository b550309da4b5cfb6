//! Signed-in wishlist rows.

use bazaar_core::models::WishlistItem;
use bazaar_core::{ProductId, UserId, WishlistItemId};

use super::{RepositoryError, decode_all, encode};
use crate::backend::{Backend, Row};
use crate::query::{Filter, Query, Table};
use crate::rows::WishlistRow;

pub struct WishlistRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> WishlistRepository<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<WishlistItem>, RepositoryError> {
        let query = Query::new().eq("user_id", user_id.to_string());
        let rows: Vec<WishlistRow> = decode_all(self.backend.select(Table::Wishlist, &query).await?)?;
        Ok(rows
            .into_iter()
            .map(|row| WishlistItem {
                id: Some(row.id),
                product_id: row.product_id,
            })
            .collect())
    }

    /// Save products. Ones already on the list are left alone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn add_many(&self, user_id: UserId, products: &[ProductId]) -> Result<(), RepositoryError> {
        let existing: Vec<ProductId> = self
            .list(user_id)
            .await?
            .into_iter()
            .map(|item| item.product_id)
            .collect();
        let rows = products
            .iter()
            .filter(|p| !existing.contains(p))
            .map(|&product_id| {
                encode(&WishlistRow {
                    id: WishlistItemId::random(),
                    user_id,
                    product_id,
                })
            })
            .collect::<Result<Vec<Row>, _>>()?;
        if rows.is_empty() {
            return Ok(());
        }
        match self.backend.insert(Table::Wishlist, rows).await {
            Ok(_) => Ok(()),
            // Raced with another tab adding the same product.
            Err(e) if e.is_conflict() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn add(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        self.add_many(user_id, &[product_id]).await
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let filters = [
            Filter::eq("user_id", user_id.to_string()),
            Filter::eq("product_id", product_id.to_string()),
        ];
        self.backend.delete(Table::Wishlist, &filters).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;

    #[tokio::test]
    async fn test_add_is_idempotent() {
        let backend = MemoryBackend::new();
        let wishlist = WishlistRepository::new(&backend);
        let user = UserId::random();
        let product = ProductId::random();

        wishlist.add(user, product).await.unwrap();
        wishlist.add_many(user, &[product, ProductId::random()]).await.unwrap();
        assert_eq!(wishlist.list(user).await.unwrap().len(), 2);

        wishlist.remove(user, product).await.unwrap();
        assert_eq!(wishlist.list(user).await.unwrap().len(), 1);
    }
}
