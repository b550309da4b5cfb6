//! Customer return requests.
//!
//! Only delivered orders can be returned. Requesting a return moves the
//! order to `return_requested`; the back office takes it from there.

use chrono::Utc;
use tracing::{info, instrument};

use bazaar_core::models::ReturnRequest;
use bazaar_core::models::returns::validate_reason;
use bazaar_core::{Lifecycle, OrderId, OrderStatus, ReturnId, ReturnStatus, UserId};
use bazaar_platform::Backend;
use bazaar_platform::repositories::{OrderRepository, ReturnRepository};

use crate::error::AppError;
use crate::services::orders;

/// Ask to send a delivered order back.
///
/// The refund amount is the order total; the coins spent on it are part of
/// that total's complement and were never charged.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a blank reason, `AppError::Transition`
/// if the order is not delivered and `AppError::Conflict` if a return is
/// already open.
#[instrument(skip(backend, reason))]
pub async fn request(
    backend: &dyn Backend,
    user_id: UserId,
    order_id: OrderId,
    reason: &str,
) -> Result<ReturnRequest, AppError> {
    let reason = validate_reason(reason).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let order = orders::get(backend, user_id, order_id).await?;
    order.status.transition_to(OrderStatus::ReturnRequested)?;

    let returns = ReturnRepository::new(backend);
    if returns.open_for_order(order_id).await?.is_some() {
        return Err(AppError::Conflict(
            "A return is already open for this order".to_owned(),
        ));
    }

    let now = Utc::now();
    let created = returns
        .create(&ReturnRequest {
            id: ReturnId::random(),
            order_id,
            user_id,
            reason,
            status: ReturnStatus::Requested,
            refund_amount: order.pricing.total,
            admin_note: None,
            created_at: now,
            updated_at: now,
        })
        .await?;
    OrderRepository::new(backend)
        .set_status(order_id, order.status, OrderStatus::ReturnRequested, now)
        .await?;

    info!(return_id = %created.id, %order_id, "Return requested");
    Ok(created)
}

/// # Errors
///
/// Returns `AppError` if the platform read fails.
pub async fn list(backend: &dyn Backend, user_id: UserId) -> Result<Vec<ReturnRequest>, AppError> {
    Ok(ReturnRepository::new(backend).list_for_user(user_id).await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::UserRole;
    use bazaar_platform::MemoryBackend;

    use super::*;
    use crate::services::fixtures::{draft, seed_order, seed_product, seed_profile};

    #[tokio::test]
    async fn test_delivered_order_can_be_returned_once() {
        let backend = MemoryBackend::new();
        let profile = seed_profile(&backend, UserRole::Customer).await;
        let product = seed_product(&backend, draft("Kurta", 800, 4)).await;
        let order = seed_order(&backend, profile.id, &product, 1, OrderStatus::Delivered).await;

        let created = request(&backend, profile.id, order.id, " wrong size ")
            .await
            .unwrap();
        assert_eq!(created.reason, "wrong size");
        assert_eq!(created.refund_amount, order.pricing.total);

        let order = orders::get(&backend, profile.id, order.id).await.unwrap();
        assert_eq!(order.status, OrderStatus::ReturnRequested);

        let err = request(&backend, profile.id, order.id, "again").await.unwrap_err();
        assert!(matches!(err, AppError::Transition(_)));
        assert_eq!(list(&backend, profile.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_undelivered_order_cannot_be_returned() {
        let backend = MemoryBackend::new();
        let profile = seed_profile(&backend, UserRole::Customer).await;
        let product = seed_product(&backend, draft("Kurta", 800, 4)).await;
        let order = seed_order(&backend, profile.id, &product, 1, OrderStatus::Shipped).await;

        let err = request(&backend, profile.id, order.id, "changed my mind")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Transition(_)));
    }

    #[tokio::test]
    async fn test_blank_reason_rejected() {
        let backend = MemoryBackend::new();
        let profile = seed_profile(&backend, UserRole::Customer).await;
        let product = seed_product(&backend, draft("Kurta", 800, 4)).await;
        let order = seed_order(&backend, profile.id, &product, 1, OrderStatus::Delivered).await;

        let err = request(&backend, profile.id, order.id, "  ").await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
