//! Address book repository.

use chrono::Utc;
use serde_json::json;
use tracing::instrument;

use bazaar_core::models::{Address, ShippingAddress};
use bazaar_core::{AddressId, UserId};

use super::{RepositoryError, decode_all, decode_first, encode, patch};
use crate::backend::Backend;
use crate::query::{Filter, Query, Table};

pub struct AddressRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> AddressRepository<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// A user's addresses, default first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Address>, RepositoryError> {
        let query = Query::new()
            .eq("user_id", user_id.to_string())
            .order_asc("created_at");
        let mut addresses: Vec<Address> =
            decode_all(self.backend.select(Table::Addresses, &query).await?)?;
        addresses.sort_by_key(|a| !a.is_default);
        Ok(addresses)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn get(&self, user_id: UserId, id: AddressId) -> Result<Option<Address>, RepositoryError> {
        let query = Query::new()
            .eq("id", id.to_string())
            .eq("user_id", user_id.to_string())
            .limit(1);
        decode_first(self.backend.select(Table::Addresses, &query).await?)
    }

    /// Save a new address. The first address a user saves becomes the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    #[instrument(skip(self, address))]
    pub async fn create(
        &self,
        user_id: UserId,
        address: &ShippingAddress,
        make_default: bool,
    ) -> Result<Address, RepositoryError> {
        let is_default = make_default || self.list(user_id).await?.is_empty();
        if is_default {
            self.clear_default(user_id).await?;
        }
        let record = Address {
            id: AddressId::random(),
            user_id,
            full_name: address.full_name.clone(),
            phone: address.phone.clone(),
            line1: address.line1.clone(),
            line2: address.line2.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            pincode: address.pincode.clone(),
            is_default,
            created_at: Utc::now(),
        };
        let stored = self.backend.insert(Table::Addresses, vec![encode(&record)?]).await?;
        decode_first(stored)?
            .ok_or_else(|| RepositoryError::DataCorruption("insert returned no row".to_owned()))
    }

    /// Replace the fields of an address.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not this user's.
    pub async fn update(
        &self,
        user_id: UserId,
        id: AddressId,
        address: &ShippingAddress,
    ) -> Result<Address, RepositoryError> {
        let changes = encode(address)?;
        let updated = self
            .backend
            .update(Table::Addresses, &Self::owned(user_id, id), changes)
            .await?;
        decode_first(updated)?.ok_or(RepositoryError::NotFound)
    }

    /// Make one address the default.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not this user's.
    pub async fn set_default(&self, user_id: UserId, id: AddressId) -> Result<Address, RepositoryError> {
        if self.get(user_id, id).await?.is_none() {
            return Err(RepositoryError::NotFound);
        }
        self.clear_default(user_id).await?;
        let updated = self
            .backend
            .update(
                Table::Addresses,
                &Self::owned(user_id, id),
                patch([("is_default", json!(true))]),
            )
            .await?;
        decode_first(updated)?.ok_or(RepositoryError::NotFound)
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the address is not this user's.
    pub async fn delete(&self, user_id: UserId, id: AddressId) -> Result<(), RepositoryError> {
        let deleted = self
            .backend
            .delete(Table::Addresses, &Self::owned(user_id, id))
            .await?;
        if deleted.is_empty() {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    /// Find a saved address identical to `address`, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn find_matching(
        &self,
        user_id: UserId,
        address: &ShippingAddress,
    ) -> Result<Option<Address>, RepositoryError> {
        Ok(self
            .list(user_id)
            .await?
            .into_iter()
            .find(|saved| saved.snapshot() == *address))
    }

    async fn clear_default(&self, user_id: UserId) -> Result<(), RepositoryError> {
        let filters = [
            Filter::eq("user_id", user_id.to_string()),
            Filter::eq("is_default", true),
        ];
        self.backend
            .update(Table::Addresses, &filters, patch([("is_default", json!(false))]))
            .await?;
        Ok(())
    }

    fn owned(user_id: UserId, id: AddressId) -> [Filter; 2] {
        [
            Filter::eq("id", id.to_string()),
            Filter::eq("user_id", user_id.to_string()),
        ]
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{Phone, Pincode};

    use super::*;
    use crate::memory::MemoryBackend;

    fn shipping(line1: &str) -> ShippingAddress {
        ShippingAddress {
            full_name: "Ravi Kumar".to_string(),
            phone: Phone::parse("9876543210").unwrap(),
            line1: line1.to_string(),
            line2: None,
            city: "Chennai".to_string(),
            state: "Tamil Nadu".to_string(),
            pincode: Pincode::parse("600001").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_single_default() {
        let backend = MemoryBackend::new();
        let repo = AddressRepository::new(&backend);
        let user = UserId::random();

        let first = repo.create(user, &shipping("1 Anna Salai"), false).await.unwrap();
        assert!(first.is_default);
        let second = repo.create(user, &shipping("2 Mount Road"), false).await.unwrap();
        assert!(!second.is_default);

        repo.set_default(user, second.id).await.unwrap();
        let listed = repo.list(user).await.unwrap();
        assert_eq!(listed.iter().filter(|a| a.is_default).count(), 1);
        assert_eq!(listed[0].id, second.id);
    }

    #[tokio::test]
    async fn test_find_matching_snapshot() {
        let backend = MemoryBackend::new();
        let repo = AddressRepository::new(&backend);
        let user = UserId::random();
        let saved = repo.create(user, &shipping("1 Anna Salai"), false).await.unwrap();

        let found = repo.find_matching(user, &shipping("1 Anna Salai")).await.unwrap();
        assert_eq!(found.map(|a| a.id), Some(saved.id));
        assert!(repo.find_matching(user, &shipping("9 Elsewhere")).await.unwrap().is_none());
    }
}
