//! Order row conversion.

use bazaar_core::models::{Order, OrderItem, ShippingAddress};
use bazaar_core::pricing::PriceBreakdown;
use bazaar_core::{OrderItemId, OrderStatus, PaymentMethod, PaymentStatus};

use super::ConversionError;
use crate::rows::{OrderItemRow, OrderRow};

/// Assemble an order from its row and item rows.
///
/// # Errors
///
/// Returns [`ConversionError`] for unknown statuses, a bad payment tag or an
/// unreadable shipping address.
pub fn order_from_rows(row: OrderRow, items: Vec<OrderItemRow>) -> Result<Order, ConversionError> {
    let id = row.id;
    let invalid = |reason: String| ConversionError {
        table: "orders",
        id: id.to_string(),
        reason,
    };

    let status: OrderStatus = row.status.parse().map_err(invalid)?;
    let payment_status: PaymentStatus = row.payment_status.parse().map_err(invalid)?;
    let payment_method =
        PaymentMethod::parse(&row.payment_method).map_err(|e| invalid(e.to_string()))?;
    let shipping_address: ShippingAddress = serde_json::from_value(row.shipping_address)
        .map_err(|e| invalid(format!("shipping address: {e}")))?;

    let items = items
        .into_iter()
        .map(|item| {
            let quantity = u32::try_from(item.quantity).map_err(|_| ConversionError {
                table: "order_items",
                id: item.id.to_string(),
                reason: format!("quantity {} out of range", item.quantity),
            })?;
            Ok(OrderItem {
                id: Some(item.id),
                product_id: item.product_id,
                name: item.product_name.unwrap_or_else(|| "Item".to_owned()),
                unit_price: item.price,
                quantity,
                image: item.image,
            })
        })
        .collect::<Result<Vec<_>, ConversionError>>()?;

    Ok(Order {
        id,
        user_id: row.user_id,
        items,
        pricing: PriceBreakdown {
            subtotal: row.subtotal,
            shipping: row.shipping,
            tax: row.tax,
            coupon_discount: row.coupon_discount,
            card_discount: row.card_discount,
            wallet_used: row.wallet_used,
            total: row.total,
            cod_available: row.cod_available,
        },
        status,
        shipping_address,
        payment_method,
        payment_status,
        coupon_code: row.coupon_code,
        card_offer_id: row.card_offer_id,
        created_at: row.created_at,
        updated_at: row.updated_at.unwrap_or(row.created_at),
    })
}

/// Split an order into its row and item rows.
///
/// # Errors
///
/// Returns [`ConversionError`] if the shipping address cannot be encoded.
pub fn order_to_rows(order: &Order) -> Result<(OrderRow, Vec<OrderItemRow>), ConversionError> {
    let shipping_address =
        serde_json::to_value(&order.shipping_address).map_err(|e| ConversionError {
            table: "orders",
            id: order.id.to_string(),
            reason: e.to_string(),
        })?;

    let row = OrderRow {
        id: order.id,
        user_id: order.user_id,
        status: order.status.to_string(),
        subtotal: order.pricing.subtotal,
        shipping: order.pricing.shipping,
        tax: order.pricing.tax,
        coupon_discount: order.pricing.coupon_discount,
        card_discount: order.pricing.card_discount,
        wallet_used: order.pricing.wallet_used,
        total: order.pricing.total,
        cod_available: order.pricing.cod_available,
        shipping_address,
        payment_method: order.payment_method.to_string(),
        payment_status: order.payment_status.to_string(),
        coupon_code: order.coupon_code.clone(),
        card_offer_id: order.card_offer_id,
        created_at: order.created_at,
        updated_at: Some(order.updated_at),
    };

    let items = order
        .items
        .iter()
        .map(|item| OrderItemRow {
            id: item.id.unwrap_or_else(OrderItemId::random),
            order_id: order.id,
            product_id: item.product_id,
            product_name: Some(item.name.clone()),
            price: item.unit_price,
            quantity: i64::from(item.quantity),
            image: item.image.clone(),
        })
        .collect();

    Ok((row, items))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use bazaar_core::{Money, OrderId, ProductId, UserId};

    use super::*;

    fn row() -> OrderRow {
        OrderRow {
            id: OrderId::random(),
            user_id: UserId::random(),
            status: "confirmed".to_string(),
            subtotal: Money::from_rupees(400),
            shipping: Money::from_rupees(25),
            tax: Money::from_rupees(72),
            coupon_discount: Money::ZERO,
            card_discount: Money::ZERO,
            wallet_used: Money::ZERO,
            total: Money::from_rupees(497),
            cod_available: true,
            shipping_address: json!({
                "full_name": "Asha Rao",
                "phone": "9845012345",
                "line1": "12 MG Road",
                "line2": null,
                "city": "Bengaluru",
                "state": "Karnataka",
                "pincode": "560001"
            }),
            payment_method: "online:pay_123".to_string(),
            payment_status: "paid".to_string(),
            coupon_code: None,
            card_offer_id: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn item(order_id: OrderId) -> OrderItemRow {
        OrderItemRow {
            id: OrderItemId::random(),
            order_id,
            product_id: ProductId::random(),
            product_name: None,
            price: Money::from_rupees(200),
            quantity: 2,
            image: None,
        }
    }

    #[test]
    fn test_order_from_rows() {
        let r = row();
        let items = vec![item(r.id)];
        let order = order_from_rows(r, items).unwrap();
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert_eq!(order.items[0].name, "Item");
        assert_eq!(order.updated_at, order.created_at);
        assert!(matches!(order.payment_method, PaymentMethod::Online { .. }));
    }

    #[test]
    fn test_unknown_status_rejected() {
        let mut r = row();
        r.status = "lost".to_string();
        let err = order_from_rows(r, vec![]).unwrap_err();
        assert!(err.to_string().contains("invalid orders row"));
    }

    #[test]
    fn test_round_trip_keeps_breakdown() {
        let r = row();
        let items = vec![item(r.id)];
        let order = order_from_rows(r, items).unwrap();
        let (row, items) = order_to_rows(&order).unwrap();
        let again = order_from_rows(row, items).unwrap();
        assert_eq!(again.pricing, order.pricing);
        assert_eq!(again.items.len(), 1);
    }
}
