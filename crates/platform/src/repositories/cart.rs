//! Signed-in cart lines (`cart_items`).

use serde_json::json;
use tracing::instrument;

use bazaar_core::models::cart::clamp_quantity;
use bazaar_core::models::CartItem;
use bazaar_core::shopper::MergePlan;
use bazaar_core::{CartItemId, ProductId, UserId};

use super::{RepositoryError, decode_all, decode_first, encode, patch};
use crate::backend::{Backend, Row};
use crate::query::{Filter, Query, Table};
use crate::rows::CartItemRow;

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: Some(row.id),
            product_id: row.product_id,
            quantity: clamp_quantity(row.quantity),
        }
    }
}

pub struct CartRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> CartRepository<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// A user's cart lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<CartItem>, RepositoryError> {
        let query = Query::new().eq("user_id", user_id.to_string());
        let rows: Vec<CartItemRow> = decode_all(self.backend.select(Table::CartItems, &query).await?)?;
        Ok(rows.into_iter().map(CartItem::from).collect())
    }

    /// Add units of a product, summing with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    #[instrument(skip(self))]
    pub async fn add(&self, user_id: UserId, product_id: ProductId, quantity: u32) -> Result<CartItem, RepositoryError> {
        if let Some(existing) = self.line(user_id, product_id).await? {
            let total = clamp_quantity(existing.quantity.saturating_add(quantity));
            return self.set_quantity(user_id, existing.id, total).await;
        }
        let row = CartItemRow {
            id: CartItemId::random(),
            user_id,
            product_id,
            quantity: clamp_quantity(quantity),
        };
        let stored = self.backend.insert(Table::CartItems, vec![encode(&row)?]).await?;
        let row: CartItemRow = decode_first(stored)?
            .ok_or_else(|| RepositoryError::DataCorruption("insert returned no row".to_owned()))?;
        Ok(row.into())
    }

    /// Set a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the line is not this user's.
    pub async fn set_quantity(&self, user_id: UserId, id: CartItemId, quantity: u32) -> Result<CartItem, RepositoryError> {
        let filters = [
            Filter::eq("id", id.to_string()),
            Filter::eq("user_id", user_id.to_string()),
        ];
        let updated = self
            .backend
            .update(
                Table::CartItems,
                &filters,
                patch([("quantity", json!(clamp_quantity(quantity)))]),
            )
            .await?;
        let row: CartItemRow = decode_first(updated)?.ok_or(RepositoryError::NotFound)?;
        Ok(row.into())
    }

    /// Remove the line for a product, if present.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn remove(&self, user_id: UserId, product_id: ProductId) -> Result<(), RepositoryError> {
        let filters = [
            Filter::eq("user_id", user_id.to_string()),
            Filter::eq("product_id", product_id.to_string()),
        ];
        self.backend.delete(Table::CartItems, &filters).await?;
        Ok(())
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn clear(&self, user_id: UserId) -> Result<(), RepositoryError> {
        self.backend
            .delete(Table::CartItems, &[Filter::eq("user_id", user_id.to_string())])
            .await?;
        Ok(())
    }

    /// Write the cart half of a guest merge.
    ///
    /// Every quantity in the plan is absolute, and an insert whose line
    /// already exists sets that line instead, so applying the same plan
    /// again leaves the cart unchanged.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn apply_merge(&self, user_id: UserId, plan: &MergePlan) -> Result<(), RepositoryError> {
        for (id, quantity) in &plan.quantity_updates {
            self.set_quantity(user_id, *id, *quantity).await?;
        }
        let mut fresh = Vec::new();
        for item in &plan.cart_inserts {
            match self.line(user_id, item.product_id).await? {
                Some(line) => {
                    self.set_quantity(user_id, line.id, item.quantity).await?;
                }
                None => fresh.push(item),
            }
        }
        if fresh.is_empty() {
            return Ok(());
        }
        let rows = fresh
            .into_iter()
            .map(|item| {
                encode(&CartItemRow {
                    id: CartItemId::random(),
                    user_id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                })
            })
            .collect::<Result<Vec<Row>, _>>()?;
        self.backend.insert(Table::CartItems, rows).await?;
        Ok(())
    }

    async fn line(&self, user_id: UserId, product_id: ProductId) -> Result<Option<CartItemRow>, RepositoryError> {
        let query = Query::new()
            .eq("user_id", user_id.to_string())
            .eq("product_id", product_id.to_string())
            .limit(1);
        decode_first(self.backend.select(Table::CartItems, &query).await?)
    }
}
