//! Card offer repository.

use bazaar_core::CardOfferId;
use bazaar_core::models::CardOffer;

use super::{RepositoryError, decode_all, decode_first, encode};
use crate::backend::Backend;
use crate::conversions::{card_offer_from_row, card_offer_to_row};
use crate::query::{Filter, Query, Table};
use crate::rows::CardOfferRow;

pub struct CardOfferRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> CardOfferRepository<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Offers shown at checkout.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn list_active(&self) -> Result<Vec<CardOffer>, RepositoryError> {
        let query = Query::new().eq("is_active", true).order_asc("bank_name");
        self.load(&query).await
    }

    /// Every offer, for the back office.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn list(&self) -> Result<Vec<CardOffer>, RepositoryError> {
        self.load(&Query::new().order_asc("bank_name")).await
    }

    pub async fn get(&self, id: CardOfferId) -> Result<Option<CardOffer>, RepositoryError> {
        let query = Query::new().eq("id", id.to_string()).limit(1);
        let row: Option<CardOfferRow> =
            decode_first(self.backend.select(Table::CardOffers, &query).await?)?;
        Ok(row.map(card_offer_from_row))
    }

    pub async fn create(&self, offer: &CardOffer) -> Result<CardOffer, RepositoryError> {
        let stored = self
            .backend
            .insert(Table::CardOffers, vec![encode(&card_offer_to_row(offer))?])
            .await?;
        let row: CardOfferRow = decode_first(stored)?
            .ok_or_else(|| RepositoryError::DataCorruption("insert returned no row".to_owned()))?;
        Ok(card_offer_from_row(row))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the offer does not exist.
    pub async fn update(&self, offer: &CardOffer) -> Result<CardOffer, RepositoryError> {
        let mut row = encode(&card_offer_to_row(offer))?;
        row.remove("id");
        let updated = self
            .backend
            .update(Table::CardOffers, &[Filter::eq("id", offer.id.to_string())], row)
            .await?;
        let row: CardOfferRow = decode_first(updated)?.ok_or(RepositoryError::NotFound)?;
        Ok(card_offer_from_row(row))
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the offer does not exist.
    pub async fn delete(&self, id: CardOfferId) -> Result<(), RepositoryError> {
        let deleted = self
            .backend
            .delete(Table::CardOffers, &[Filter::eq("id", id.to_string())])
            .await?;
        if deleted.is_empty() {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn load(&self, query: &Query) -> Result<Vec<CardOffer>, RepositoryError> {
        let rows: Vec<CardOfferRow> = decode_all(self.backend.select(Table::CardOffers, query).await?)?;
        Ok(rows.into_iter().map(card_offer_from_row).collect())
    }
}
