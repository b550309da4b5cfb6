//! Product reviews.

use bazaar_core::models::Review;
use bazaar_core::{ProductId, UserId};

use super::{RepositoryError, decode_all, decode_first, encode};
use crate::backend::Backend;
use crate::query::{Query, Table};

pub struct ReviewRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> ReviewRepository<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Reviews of a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn list_for_product(&self, product_id: ProductId) -> Result<Vec<Review>, RepositoryError> {
        let query = Query::new()
            .eq("product_id", product_id.to_string())
            .order_desc("created_at");
        decode_all(self.backend.select(Table::Reviews, &query).await?)
    }

    /// The review a user left on a product, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn find(&self, user_id: UserId, product_id: ProductId) -> Result<Option<Review>, RepositoryError> {
        let query = Query::new()
            .eq("user_id", user_id.to_string())
            .eq("product_id", product_id.to_string())
            .limit(1);
        decode_first(self.backend.select(Table::Reviews, &query).await?)
    }

    /// Insert a review.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already reviewed the product.
    pub async fn create(&self, review: &Review) -> Result<Review, RepositoryError> {
        let stored = self.backend.insert(Table::Reviews, vec![encode(review)?]).await?;
        decode_first(stored)?
            .ok_or_else(|| RepositoryError::DataCorruption("insert returned no row".to_owned()))
    }
}
