//! Order management for the back office.
//!
//! Status changes follow the order lifecycle table. The return states are
//! driven by return processing and cannot be set here.

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use bazaar_core::models::{Order, TransactionReason};
use bazaar_core::{
    DeliveryStatus, Lifecycle, OrderId, OrderStatus, PaymentMethod, PaymentStatus,
};
use bazaar_platform::Backend;
use bazaar_platform::repositories::{
    DeliveryRepository, OrderRepository, ProductRepository, WalletRepository,
};

use crate::error::AppError;

/// Page size when no limit is given.
pub const DEFAULT_LIMIT: usize = 100;

/// Query string for the order list.
#[derive(Debug, Default, Deserialize)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StatusChange {
    pub status: OrderStatus,
}

/// # Errors
///
/// Returns `AppError` if the platform read fails.
pub async fn list(backend: &dyn Backend, filter: &OrderFilter) -> Result<Vec<Order>, AppError> {
    let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, 500);
    Ok(OrderRepository::new(backend)
        .list(filter.status, Some(limit))
        .await?)
}

/// # Errors
///
/// Returns `AppError::NotFound` for an unknown order.
pub async fn get(backend: &dyn Backend, id: OrderId) -> Result<Order, AppError> {
    OrderRepository::new(backend)
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_owned()))
}

/// Move an order to `to`.
///
/// Cancelling releases stock, refunds wallet coins and cancels an unstarted
/// delivery; a paid order is marked refunded. Delivering a cash order marks
/// it paid.
///
/// # Errors
///
/// Returns `AppError::Transition` if the lifecycle forbids the move,
/// `AppError::BadRequest` for the return states and `AppError::Repository`
/// (conflict) if someone else changed the order first.
#[instrument(skip(backend))]
pub async fn transition(backend: &dyn Backend, id: OrderId, to: OrderStatus) -> Result<Order, AppError> {
    if matches!(to, OrderStatus::ReturnRequested | OrderStatus::Returned) {
        return Err(AppError::BadRequest(
            "Returns are handled through return processing".to_owned(),
        ));
    }

    let order = get(backend, id).await?;
    let from = order.status;
    from.transition_to(to)?;

    let now = Utc::now();
    let orders = OrderRepository::new(backend);
    let mut updated = orders.set_status(id, from, to, now).await?;

    match to {
        OrderStatus::Cancelled => {
            release(backend, &order).await?;
            if order.payment_status == PaymentStatus::Paid {
                updated = orders.set_payment_status(id, PaymentStatus::Refunded, now).await?;
            }
        }
        OrderStatus::Delivered
            if order.payment_method == PaymentMethod::CashOnDelivery
                && order.payment_status == PaymentStatus::Pending =>
        {
            updated = orders.set_payment_status(id, PaymentStatus::Paid, now).await?;
        }
        _ => {}
    }

    info!(order_id = %id, %from, %to, "Order status changed");
    Ok(updated)
}

/// Undo what placing the order took: stock, wallet coins, the delivery.
async fn release(backend: &dyn Backend, order: &Order) -> Result<(), AppError> {
    let products = ProductRepository::new(backend);
    for item in &order.items {
        if let Err(err) = products.release_stock(item.product_id, item.quantity).await {
            warn!(order_id = %order.id, product_id = %item.product_id, error = %err, "Stock not released");
        }
    }

    if !order.pricing.wallet_used.is_zero() {
        WalletRepository::new(backend)
            .credit(
                order.user_id,
                order.pricing.wallet_used,
                TransactionReason::OrderCancelled,
                Some(order.id),
            )
            .await?;
    }

    let deliveries = DeliveryRepository::new(backend);
    if let Some(mut delivery) = deliveries.for_order(order.id).await?
        && delivery.status.can_transition_to(DeliveryStatus::Cancelled)
    {
        let prior = delivery.status;
        delivery.advance(DeliveryStatus::Cancelled, Utc::now())?;
        deliveries.save_transition(&delivery, prior).await?;
    }
    Ok(())
}
