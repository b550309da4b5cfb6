//! Return processing.
//!
//! ```text
//! requested -> approved -> picked_up -> refunded
//!           \-> rejected
//! ```
//!
//! Rejecting puts the order back to delivered. Refunding credits the refund
//! amount to the customer's wallet, restocks the items and closes the order
//! as returned. Each step is a compare-and-set on the return's status, so a
//! refund cannot be paid twice.

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use bazaar_core::models::{Order, ReturnRequest, TransactionReason};
use bazaar_core::{Lifecycle, Money, OrderStatus, PaymentStatus, ReturnId, ReturnStatus};
use bazaar_platform::Backend;
use bazaar_platform::repositories::{
    OrderRepository, ProductRepository, ReturnRepository, WalletRepository,
};

use crate::error::AppError;

#[derive(Debug, Default, Deserialize)]
pub struct ReturnFilter {
    pub status: Option<ReturnStatus>,
}

/// An admin's decision on a return request.
#[derive(Debug, Default, Deserialize)]
pub struct Decision {
    pub note: Option<String>,
    /// Lower the refund, e.g. for a partial return. Never above the order total.
    pub refund_amount: Option<Money>,
}

/// # Errors
///
/// Returns `AppError` if the platform read fails.
pub async fn list(backend: &dyn Backend, filter: &ReturnFilter) -> Result<Vec<ReturnRequest>, AppError> {
    Ok(ReturnRepository::new(backend).list(filter.status).await?)
}

/// # Errors
///
/// Returns `AppError::NotFound` for an unknown return.
pub async fn get(backend: &dyn Backend, id: ReturnId) -> Result<ReturnRequest, AppError> {
    ReturnRepository::new(backend)
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Return".to_owned()))
}

fn note(decision: &Decision) -> Option<&str> {
    decision
        .note
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
}

async fn advance(
    backend: &dyn Backend,
    id: ReturnId,
    to: ReturnStatus,
    decision: &Decision,
) -> Result<ReturnRequest, AppError> {
    let current = get(backend, id).await?;
    current.status.transition_to(to)?;

    let refund = match decision.refund_amount {
        Some(amount) if amount.is_negative() || amount > current.refund_amount => {
            return Err(AppError::BadRequest(format!(
                "Refund must be between 0 and {}",
                current.refund_amount
            )));
        }
        other => other,
    };

    let updated = ReturnRepository::new(backend)
        .set_status(id, current.status, to, note(decision), refund, Utc::now())
        .await?;
    info!(return_id = %id, from = %current.status, %to, "Return status changed");
    Ok(updated)
}

/// # Errors
///
/// Returns `AppError::Transition` unless the return is still requested.
#[instrument(skip(backend, decision))]
pub async fn approve(backend: &dyn Backend, id: ReturnId, decision: Decision) -> Result<ReturnRequest, AppError> {
    advance(backend, id, ReturnStatus::Approved, &decision).await
}

/// Refuse a return; the order goes back to delivered.
///
/// # Errors
///
/// Returns `AppError::Transition` unless the return is still requested.
#[instrument(skip(backend, decision))]
pub async fn reject(backend: &dyn Backend, id: ReturnId, decision: Decision) -> Result<ReturnRequest, AppError> {
    let decision = Decision {
        refund_amount: None,
        ..decision
    };
    let rejected = advance(backend, id, ReturnStatus::Rejected, &decision).await?;
    move_order(backend, &rejected, OrderStatus::Delivered).await?;
    Ok(rejected)
}

/// The parcel has been collected from the customer.
///
/// # Errors
///
/// Returns `AppError::Transition` unless the return is approved.
#[instrument(skip(backend))]
pub async fn mark_picked_up(backend: &dyn Backend, id: ReturnId) -> Result<ReturnRequest, AppError> {
    advance(backend, id, ReturnStatus::PickedUp, &Decision::default()).await
}

/// Pay the refund into the wallet, restock, and close the order.
///
/// # Errors
///
/// Returns `AppError::Transition` unless the return has been picked up.
#[instrument(skip(backend))]
pub async fn refund(backend: &dyn Backend, id: ReturnId) -> Result<ReturnRequest, AppError> {
    let refunded = advance(backend, id, ReturnStatus::Refunded, &Decision::default()).await?;

    if !refunded.refund_amount.is_zero() {
        WalletRepository::new(backend)
            .credit(
                refunded.user_id,
                refunded.refund_amount,
                TransactionReason::ReturnRefund,
                Some(refunded.order_id),
            )
            .await?;
    }

    let order = move_order(backend, &refunded, OrderStatus::Returned).await?;
    let products = ProductRepository::new(backend);
    for item in &order.items {
        if let Err(err) = products.release_stock(item.product_id, item.quantity).await {
            warn!(order_id = %order.id, product_id = %item.product_id, error = %err, "Returned stock not restocked");
        }
    }
    OrderRepository::new(backend)
        .set_payment_status(order.id, PaymentStatus::Refunded, Utc::now())
        .await?;

    info!(return_id = %id, order_id = %order.id, amount = %refunded.refund_amount, "Return refunded");
    Ok(refunded)
}

async fn move_order(
    backend: &dyn Backend,
    request: &ReturnRequest,
    to: OrderStatus,
) -> Result<Order, AppError> {
    let orders = OrderRepository::new(backend);
    let order = orders
        .get(request.order_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_owned()))?;
    order.status.transition_to(to)?;
    Ok(orders
        .set_status(order.id, order.status, to, Utc::now())
        .await?)
}
