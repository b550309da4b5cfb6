//! Business logic services for admin.
//!
//! Handlers stay thin: they check the admin session, then call one of
//! these. Every status change is validated against the lifecycle tables in
//! `bazaar-core` before anything is written.
//!
//! # Services
//!
//! - `auth` - admin sign in and sign out
//! - `products` - catalog editing, images, stock corrections
//! - `orders` - order list and status transitions with their side effects
//! - `promotions` - coupon and card-offer CRUD
//! - `deliveries` - delivery creation, courier assignment, QR minting
//! - `returns` - return approval, pickup and refund
//! - `dashboard` - order counts, revenue, low stock

pub mod auth;
pub mod dashboard;
pub mod deliveries;
pub mod orders;
pub mod products;
pub mod promotions;
pub mod returns;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use chrono::Utc;

    use bazaar_core::models::{
        AddressForm, Order, OrderItem, Product, ProductDraft, Profile,
    };
    use bazaar_core::pricing::{PricedLine, PricingInput, PricingPolicy, compose};
    use bazaar_core::{
        Email, Money, OrderId, OrderStatus, PaymentMethod, PaymentStatus, UserId, UserRole,
    };
    use bazaar_platform::repositories::{OrderRepository, ProductRepository, ProfileRepository};
    use bazaar_platform::{Backend, MemoryAuth, MemoryBackend};

    use crate::state::AppState;

    pub(crate) fn draft(name: &str, rupees: i64, stock: u32) -> ProductDraft {
        ProductDraft {
            name: name.to_string(),
            description: format!("{name}, hand packed"),
            category: "Spices".to_string(),
            price: Money::from_rupees(rupees),
            original_price: None,
            stock,
            images: vec![],
            is_active: true,
        }
    }

    pub(crate) async fn seed_product(backend: &dyn Backend, draft: ProductDraft) -> Product {
        ProductRepository::new(backend).create(&draft).await.unwrap()
    }

    pub(crate) async fn seed_profile(backend: &dyn Backend, role: UserRole) -> Profile {
        let id = UserId::random();
        let email = Email::parse(&format!("{}@example.in", id.as_uuid().simple())).unwrap();
        let repo = ProfileRepository::new(backend);
        repo.create(&Profile::new_customer(id, Some(email), Some("Ravi".to_string())))
            .await
            .unwrap();
        if role == UserRole::Customer {
            repo.get(id).await.unwrap().unwrap()
        } else {
            repo.set_role(id, role).await.unwrap()
        }
    }

    /// A stored cash-on-delivery order for `quantity` units of `product`.
    pub(crate) async fn seed_order(
        backend: &dyn Backend,
        user_id: UserId,
        product: &Product,
        quantity: u32,
        status: OrderStatus,
    ) -> Order {
        let now = Utc::now();
        let lines = [PricedLine {
            unit_price: product.price,
            quantity,
        }];
        let pricing = compose(
            &PricingPolicy::default(),
            &PricingInput {
                lines: &lines,
                coupon: None,
                card_offer: None,
                wallet_balance: Money::ZERO,
                use_wallet: false,
                now,
            },
        )
        .unwrap();
        let shipping_address = AddressForm {
            full_name: "Ravi Kumar".to_string(),
            phone: "9845012345".to_string(),
            line1: "4 Residency Road".to_string(),
            line2: None,
            city: "Bengaluru".to_string(),
            state: "Karnataka".to_string(),
            pincode: "560025".to_string(),
            is_default: false,
        }
        .validate()
        .unwrap();
        let order = Order {
            id: OrderId::random(),
            user_id,
            items: vec![OrderItem {
                id: None,
                product_id: product.id,
                name: product.name.clone(),
                unit_price: product.price,
                quantity,
                image: None,
            }],
            pricing,
            status,
            shipping_address,
            payment_method: PaymentMethod::CashOnDelivery,
            payment_status: PaymentStatus::Pending,
            coupon_code: None,
            card_offer_id: None,
            created_at: now,
            updated_at: now,
        };
        OrderRepository::new(backend).create(&order).await.unwrap()
    }

    pub(crate) fn state(backend: Arc<MemoryBackend>, auth: Arc<MemoryAuth>) -> AppState {
        AppState::new(crate::config::tests::config(), backend, auth)
    }
}
