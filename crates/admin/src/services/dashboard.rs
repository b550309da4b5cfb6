//! Back office overview.

use serde::Serialize;

use bazaar_core::models::Product;
use bazaar_core::{Lifecycle, Money, OrderStatus, PaymentStatus, ReturnStatus};
use bazaar_platform::Backend;
use bazaar_platform::repositories::{
    DeliveryRepository, OrderRepository, ProductRepository, ReturnRepository,
};

use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    /// One entry per order status, zeros included.
    pub orders_by_status: Vec<StatusCount>,
    pub total_orders: usize,
    /// Order totals, excluding cancelled, returned and failed orders.
    pub revenue: Money,
    pub low_stock: Vec<Product>,
    pub pending_returns: usize,
    pub active_deliveries: usize,
}

fn counts_revenue(status: OrderStatus, payment: PaymentStatus) -> bool {
    !matches!(status, OrderStatus::Cancelled | OrderStatus::Returned)
        && payment != PaymentStatus::Failed
}

/// # Errors
///
/// Returns `AppError` if any platform read fails.
pub async fn overview(backend: &dyn Backend, low_stock_threshold: u32) -> Result<Dashboard, AppError> {
    let orders = OrderRepository::new(backend);
    let counts = orders.count_by_status().await?;
    let orders_by_status: Vec<StatusCount> = OrderStatus::ALL
        .into_iter()
        .map(|status| StatusCount {
            status,
            count: counts.get(&status).copied().unwrap_or(0),
        })
        .collect();

    let revenue = orders
        .list(None, None)
        .await?
        .into_iter()
        .filter(|o| counts_revenue(o.status, o.payment_status))
        .map(|o| o.pricing.total)
        .sum();

    let low_stock = ProductRepository::new(backend)
        .low_stock(low_stock_threshold)
        .await?;
    let pending_returns = ReturnRepository::new(backend)
        .list(None)
        .await?
        .iter()
        .filter(|r| !r.status.is_terminal())
        .count();
    let active_deliveries = DeliveryRepository::new(backend)
        .list(None)
        .await?
        .iter()
        .filter(|d| !d.status.is_terminal())
        .count();

    Ok(Dashboard {
        total_orders: orders_by_status.iter().map(|c| c.count).sum(),
        orders_by_status,
        revenue,
        low_stock,
        pending_returns,
        active_deliveries,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::UserRole;
    use bazaar_platform::MemoryBackend;

    use super::*;
    use crate::services::fixtures::{draft, seed_order, seed_product, seed_profile};

    #[tokio::test]
    async fn test_overview() {
        let backend = MemoryBackend::new();
        let customer = seed_profile(&backend, UserRole::Customer).await;
        let plenty = seed_product(&backend, draft("Basmati rice", 500, 40)).await;
        let scarce = seed_product(&backend, draft("Kashmiri saffron", 900, 2)).await;

        let kept = seed_order(&backend, customer.id, &plenty, 1, OrderStatus::Delivered).await;
        seed_order(&backend, customer.id, &plenty, 3, OrderStatus::Cancelled).await;
        seed_order(&backend, customer.id, &scarce, 1, OrderStatus::Pending).await;
        let pending_total = OrderRepository::new(&backend)
            .list(Some(OrderStatus::Pending), None)
            .await
            .unwrap()[0]
            .pricing
            .total;

        let dash = overview(&backend, 5).await.unwrap();
        assert_eq!(dash.orders_by_status.len(), OrderStatus::ALL.len());
        assert_eq!(dash.total_orders, 3);
        let shipped = dash
            .orders_by_status
            .iter()
            .find(|c| c.status == OrderStatus::Shipped)
            .unwrap();
        assert_eq!(shipped.count, 0);
        assert_eq!(dash.revenue, kept.pricing.total + pending_total);
        assert_eq!(dash.low_stock.len(), 1);
        assert_eq!(dash.low_stock[0].id, scarce.id);
        assert_eq!(dash.pending_returns, 0);
        assert_eq!(dash.active_deliveries, 0);
    }
}
