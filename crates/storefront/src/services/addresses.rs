//! Address book.

use serde::Deserialize;
use tracing::instrument;

use bazaar_core::models::{Address, AddressForm, ShippingAddress};
use bazaar_core::{AddressId, UserId};
use bazaar_platform::Backend;
use bazaar_platform::repositories::AddressRepository;

use crate::error::AppError;

/// Where an order ships to: a saved address or one typed at checkout.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AddressChoice {
    Saved { address_id: AddressId },
    New(AddressForm),
}

fn validate(form: &AddressForm) -> Result<ShippingAddress, AppError> {
    form.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))
}

/// # Errors
///
/// Returns `AppError` if the platform read fails.
pub async fn list(backend: &dyn Backend, user_id: UserId) -> Result<Vec<Address>, AppError> {
    Ok(AddressRepository::new(backend).list(user_id).await?)
}

/// Save a new address. The first address saved becomes the default.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an invalid form.
#[instrument(skip(backend, form))]
pub async fn create(
    backend: &dyn Backend,
    user_id: UserId,
    form: &AddressForm,
) -> Result<Address, AppError> {
    let address = validate(form)?;
    Ok(AddressRepository::new(backend)
        .create(user_id, &address, form.is_default)
        .await?)
}

/// Replace an address, optionally making it the default.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an invalid form and
/// `AppError::Repository(NotFound)` for someone else's address.
#[instrument(skip(backend, form))]
pub async fn update(
    backend: &dyn Backend,
    user_id: UserId,
    id: AddressId,
    form: &AddressForm,
) -> Result<Address, AppError> {
    let address = validate(form)?;
    let repo = AddressRepository::new(backend);
    let updated = repo.update(user_id, id, &address).await?;
    if form.is_default && !updated.is_default {
        return Ok(repo.set_default(user_id, id).await?);
    }
    Ok(updated)
}

/// # Errors
///
/// Returns `AppError::Repository(NotFound)` for someone else's address.
pub async fn set_default(
    backend: &dyn Backend,
    user_id: UserId,
    id: AddressId,
) -> Result<Address, AppError> {
    Ok(AddressRepository::new(backend).set_default(user_id, id).await?)
}

/// # Errors
///
/// Returns `AppError::Repository(NotFound)` for someone else's address.
pub async fn delete(backend: &dyn Backend, user_id: UserId, id: AddressId) -> Result<(), AppError> {
    Ok(AddressRepository::new(backend).delete(user_id, id).await?)
}

/// Turn a checkout address choice into the snapshot stored on the order.
///
/// A typed address is saved to the book unless an identical one is already
/// there.
///
/// # Errors
///
/// Returns `AppError::NotFound` for an unknown saved address and
/// `AppError::BadRequest` for an invalid form.
#[instrument(skip(backend, choice))]
pub async fn resolve(
    backend: &dyn Backend,
    user_id: UserId,
    choice: &AddressChoice,
) -> Result<ShippingAddress, AppError> {
    let repo = AddressRepository::new(backend);
    match choice {
        AddressChoice::Saved { address_id } => repo
            .get(user_id, *address_id)
            .await?
            .map(|a| a.snapshot())
            .ok_or_else(|| AppError::NotFound("Address".to_owned())),
        AddressChoice::New(form) => {
            let address = validate(form)?;
            if repo.find_matching(user_id, &address).await?.is_none() {
                repo.create(user_id, &address, form.is_default).await?;
            }
            Ok(address)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use bazaar_platform::MemoryBackend;

    use super::*;

    pub(crate) fn form(line1: &str) -> AddressForm {
        AddressForm {
            full_name: "Asha Rao".to_string(),
            phone: "9845012345".to_string(),
            line1: line1.to_string(),
            line2: None,
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pincode: "560001".to_string(),
            is_default: false,
        }
    }

    #[tokio::test]
    async fn test_resolve_new_address_saved_once() {
        let backend = MemoryBackend::new();
        let user = UserId::random();
        let choice = AddressChoice::New(form("12 MG Road"));

        resolve(&backend, user, &choice).await.unwrap();
        resolve(&backend, user, &choice).await.unwrap();

        let saved = list(&backend, user).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert!(saved[0].is_default);
    }

    #[tokio::test]
    async fn test_resolve_rejects_other_users_address() {
        let backend = MemoryBackend::new();
        let owner = UserId::random();
        let saved = create(&backend, owner, &form("12 MG Road")).await.unwrap();

        let err = resolve(
            &backend,
            UserId::random(),
            &AddressChoice::Saved {
                address_id: saved.id,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_invalid_form_rejected() {
        let backend = MemoryBackend::new();
        let mut bad = form("12 MG Road");
        bad.pincode = "12".to_string();
        let err = create(&backend, UserId::random(), &bad).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_update_can_move_default() {
        let backend = MemoryBackend::new();
        let user = UserId::random();
        create(&backend, user, &form("1 Church Street")).await.unwrap();
        let second = create(&backend, user, &form("2 Brigade Road")).await.unwrap();
        assert!(!second.is_default);

        let mut edited = form("2 Brigade Road, 3rd floor");
        edited.is_default = true;
        let updated = update(&backend, user, second.id, &edited).await.unwrap();
        assert!(updated.is_default);
        assert_eq!(
            list(&backend, user)
                .await
                .unwrap()
                .iter()
                .filter(|a| a.is_default)
                .count(),
            1
        );
    }
}
