//! Orders and their item snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::address::ShippingAddress;
use crate::pricing::PriceBreakdown;
use crate::types::{
    CardOfferId, Lifecycle, Money, OrderId, OrderItemId, OrderStatus, PaymentMethod,
    PaymentStatus, ProductId, TransitionError, UserId,
};

/// A product line frozen at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<OrderItemId>,
    pub product_id: ProductId,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub image: Option<String>,
}

impl OrderItem {
    #[must_use]
    pub fn line_total(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub pricing: PriceBreakdown,
    pub status: OrderStatus,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub coupon_code: Option<String>,
    pub card_offer_id: Option<CardOfferId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Short reference shown to customers, e.g. `BZ-1A2B3C4D`.
    #[must_use]
    pub fn reference(&self) -> String {
        order_reference(self.id)
    }

    /// Number of units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Move to `next` if the lifecycle allows it.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] for an illegal move; the order is untouched.
    pub fn advance(&mut self, next: OrderStatus, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.status = self.status.transition_to(next)?;
        self.updated_at = now;
        Ok(())
    }

    /// Invoice summary for this order.
    #[must_use]
    pub fn invoice(&self) -> Invoice {
        Invoice {
            reference: self.reference(),
            order_id: self.id,
            issued_at: self.created_at,
            bill_to: self.shipping_address.clone(),
            lines: self
                .items
                .iter()
                .map(|item| InvoiceLine {
                    description: item.name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    amount: item.line_total(),
                })
                .collect(),
            pricing: self.pricing,
            payment_method: self.payment_method.clone(),
            payment_status: self.payment_status,
        }
    }
}

/// Customer-facing reference for an order id.
#[must_use]
pub fn order_reference(id: OrderId) -> String {
    let simple = id.as_uuid().simple().to_string();
    format!("BZ-{}", simple[..8].to_uppercase())
}

/// One row of an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceLine {
    pub description: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub amount: Money,
}

/// Printable order summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Invoice {
    pub reference: String,
    pub order_id: OrderId,
    pub issued_at: DateTime<Utc>,
    pub bill_to: ShippingAddress,
    pub lines: Vec<InvoiceLine>,
    pub pricing: PriceBreakdown,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use crate::models::address::tests::form;

    pub(crate) fn order(status: OrderStatus) -> Order {
        let items = vec![OrderItem {
            id: None,
            product_id: ProductId::random(),
            name: "Basmati Rice 5kg".to_string(),
            unit_price: Money::from_rupees(200),
            quantity: 2,
            image: None,
        }];
        Order {
            id: OrderId::random(),
            user_id: UserId::random(),
            items,
            pricing: PriceBreakdown {
                subtotal: Money::from_rupees(400),
                shipping: Money::from_rupees(25),
                tax: Money::from_rupees(72),
                total: Money::from_rupees(497),
                cod_available: true,
                ..PriceBreakdown::default()
            },
            status,
            shipping_address: form().validate().unwrap(),
            payment_method: PaymentMethod::CashOnDelivery,
            payment_status: PaymentStatus::Pending,
            coupon_code: None,
            card_offer_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_reference_format() {
        let o = order(OrderStatus::Pending);
        let reference = o.reference();
        assert!(reference.starts_with("BZ-"));
        assert_eq!(reference.len(), 11);
    }

    #[test]
    fn test_advance_rejects_illegal_move() {
        let mut o = order(OrderStatus::Shipped);
        let before = o.updated_at;
        assert!(o.advance(OrderStatus::Cancelled, Utc::now()).is_err());
        assert_eq!(o.status, OrderStatus::Shipped);
        assert_eq!(o.updated_at, before);
        o.advance(OrderStatus::Delivered, Utc::now()).unwrap();
        assert_eq!(o.status, OrderStatus::Delivered);
    }

    #[test]
    fn test_invoice_lines() {
        let o = order(OrderStatus::Delivered);
        let invoice = o.invoice();
        assert_eq!(invoice.lines.len(), 1);
        assert_eq!(invoice.lines[0].amount, Money::from_rupees(400));
        assert_eq!(invoice.pricing.total, Money::from_rupees(497));
        assert_eq!(o.item_count(), 2);
    }
}
