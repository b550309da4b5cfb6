//! Order history, cancellation and invoices.

use chrono::Utc;
use tracing::{info, instrument, warn};

use bazaar_core::models::{Invoice, Order, TransactionReason};
use bazaar_core::{DeliveryStatus, Lifecycle, OrderId, OrderStatus, PaymentStatus, UserId};
use bazaar_platform::Backend;
use bazaar_platform::repositories::{
    DeliveryRepository, OrderRepository, ProductRepository, WalletRepository,
};

use crate::error::AppError;

/// # Errors
///
/// Returns `AppError` if the platform read fails.
pub async fn list(backend: &dyn Backend, user_id: UserId) -> Result<Vec<Order>, AppError> {
    Ok(OrderRepository::new(backend).list_for_user(user_id).await?)
}

/// An order owned by `user_id`. Other customers' orders read as missing.
///
/// # Errors
///
/// Returns `AppError::NotFound` if there is no such order for this user.
pub async fn get(backend: &dyn Backend, user_id: UserId, id: OrderId) -> Result<Order, AppError> {
    OrderRepository::new(backend)
        .get(id)
        .await?
        .filter(|o| o.user_id == user_id)
        .ok_or_else(|| AppError::NotFound("Order".to_owned()))
}

/// # Errors
///
/// Returns `AppError::NotFound` if there is no such order for this user.
pub async fn invoice(backend: &dyn Backend, user_id: UserId, id: OrderId) -> Result<Invoice, AppError> {
    Ok(get(backend, user_id, id).await?.invoice())
}

/// Cancel a pending or confirmed order.
///
/// Reserved stock goes back on the shelf, wallet coins spent on the order
/// are refunded and an unstarted delivery is cancelled with it. A paid
/// order is marked refunded.
///
/// # Errors
///
/// Returns `AppError::Transition` once the order has shipped or finished.
#[instrument(skip(backend))]
pub async fn cancel(backend: &dyn Backend, user_id: UserId, id: OrderId) -> Result<Order, AppError> {
    let order = get(backend, user_id, id).await?;
    let from = order.status;
    from.transition_to(OrderStatus::Cancelled)?;

    let now = Utc::now();
    let orders = OrderRepository::new(backend);
    let mut cancelled = orders.set_status(id, from, OrderStatus::Cancelled, now).await?;
    if order.payment_status == PaymentStatus::Paid {
        cancelled = orders.set_payment_status(id, PaymentStatus::Refunded, now).await?;
    }

    let products = ProductRepository::new(backend);
    for item in &order.items {
        if let Err(err) = products.release_stock(item.product_id, item.quantity).await {
            warn!(order_id = %id, product_id = %item.product_id, error = %err, "Stock not released");
        }
    }

    if !order.pricing.wallet_used.is_zero() {
        WalletRepository::new(backend)
            .credit(
                user_id,
                order.pricing.wallet_used,
                TransactionReason::OrderCancelled,
                Some(id),
            )
            .await?;
    }

    let deliveries = DeliveryRepository::new(backend);
    if let Some(mut delivery) = deliveries.for_order(id).await?
        && delivery.status.can_transition_to(DeliveryStatus::Cancelled)
    {
        let prior = delivery.status;
        delivery.advance(DeliveryStatus::Cancelled, now)?;
        deliveries.save_transition(&delivery, prior).await?;
    }

    info!(order_id = %id, "Order cancelled by customer");
    Ok(cancelled)
}
