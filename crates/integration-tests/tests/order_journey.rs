//! An order from catalog entry to refund, across both routers.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use bazaar_core::{Money, UserRole};
use bazaar_integration_tests::{Client, TestContext};

const ADMIN: &str = "owner@bazaar.test";
const CUSTOMER: &str = "asha@bazaar.test";
const COURIER: &str = "ravi@bazaar.test";

fn id(body: &Value) -> String {
    body["id"].as_str().unwrap().to_owned()
}

fn money(value: &Value) -> Money {
    serde_json::from_value(value.clone()).unwrap()
}

async fn signed_in_admin(ctx: &TestContext) -> Client {
    ctx.account(ADMIN, UserRole::Admin).await;
    let mut admin = ctx.admin_client();
    assert_eq!(admin.sign_in(ADMIN).await.status, StatusCode::OK);
    admin
}

async fn courier_step(courier: &mut Client, delivery_id: &str, token: &str, status: &str) {
    let res = courier
        .post(
            &format!("/api/courier/deliveries/{delivery_id}/status"),
            json!({ "qr_token": token, "status": status }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK, "{status}: {}", res.body);
}

#[tokio::test]
async fn test_order_from_catalog_to_refund() {
    let ctx = TestContext::new();
    let mut admin = signed_in_admin(&ctx).await;

    // Catalog
    let product = admin
        .post(
            "/api/products",
            json!({
                "name": "Darjeeling Tea",
                "description": "First flush, 250 g",
                "category": "Beverages",
                "price": "450.00",
                "original_price": null,
                "stock": 10,
                "images": [],
                "is_active": true
            }),
        )
        .await;
    assert_eq!(product.status, StatusCode::CREATED, "{}", product.body);
    let product_id = id(&product.body);

    // Shopping
    let mut shopper = ctx.storefront_client();
    let signed_up = shopper
        .post(
            "/api/auth/sign-up",
            json!({ "email": CUSTOMER, "password": bazaar_integration_tests::PASSWORD }),
        )
        .await;
    assert_eq!(signed_up.status, StatusCode::CREATED, "{}", signed_up.body);

    let added = shopper
        .post("/api/cart/items", json!({ "product_id": product_id, "quantity": 2 }))
        .await;
    assert_eq!(added.status, StatusCode::OK, "{}", added.body);

    let quote = shopper.post("/api/checkout/quote", json!({})).await;
    assert_eq!(quote.status, StatusCode::OK, "{}", quote.body);
    let token = quote.body["token"].as_str().unwrap().to_owned();

    let placed = shopper
        .send(
            Method::POST,
            "/api/checkout/orders",
            Some(json!({
                "quote_token": token,
                "payment_method": "cod",
                "address": {
                    "full_name": "Asha Rao",
                    "phone": "9845012345",
                    "line1": "12 MG Road",
                    "city": "Bengaluru",
                    "state": "Karnataka",
                    "pincode": "560001"
                }
            })),
            &[("idempotency-key", "journey-1")],
        )
        .await;
    assert_eq!(placed.status, StatusCode::CREATED, "{}", placed.body);
    let order_id = id(&placed.body);
    let total = money(&placed.body["pricing"]["total"]);

    // Back office
    let confirmed = admin
        .post(
            &format!("/api/orders/{order_id}/status"),
            json!({ "status": "confirmed" }),
        )
        .await;
    assert_eq!(confirmed.status, StatusCode::OK, "{}", confirmed.body);

    let delivery = admin
        .post("/api/deliveries", json!({ "order_id": order_id }))
        .await;
    assert_eq!(delivery.status, StatusCode::CREATED, "{}", delivery.body);
    let delivery_id = id(&delivery.body);

    let courier_profile = ctx.account(COURIER, UserRole::DeliveryPartner).await;
    let assigned = admin
        .post(
            &format!("/api/deliveries/{delivery_id}/assign"),
            json!({ "courier_id": courier_profile.id }),
        )
        .await;
    assert_eq!(assigned.status, StatusCode::OK, "{}", assigned.body);
    let qr = assigned.body["qr_token"].as_str().unwrap().to_owned();

    // Courier portal
    let mut courier = ctx.storefront_client();
    assert_eq!(courier.sign_in(COURIER).await.status, StatusCode::OK);
    for status in ["picked_up", "in_transit", "delivered"] {
        courier_step(&mut courier, &delivery_id, &qr, status).await;
    }

    let order = shopper.get(&format!("/api/orders/{order_id}")).await;
    assert_eq!(order.body["status"], "delivered", "{}", order.body);

    // Return and refund
    let requested = shopper
        .post(
            &format!("/api/orders/{order_id}/return"),
            json!({ "reason": "Tin arrived dented" }),
        )
        .await;
    assert_eq!(requested.status, StatusCode::CREATED, "{}", requested.body);
    let return_id = id(&requested.body);

    for step in ["approve", "pickup", "refund"] {
        let body = if step == "approve" { Some(json!({})) } else { None };
        let res = admin
            .send(Method::POST, &format!("/api/returns/{return_id}/{step}"), body, &[])
            .await;
        assert_eq!(res.status, StatusCode::OK, "{step}: {}", res.body);
    }

    let wallet = shopper.get("/api/account/wallet").await;
    assert_eq!(money(&wallet.body["balance"]), total);

    let dashboard = admin.get("/api/dashboard").await;
    assert_eq!(dashboard.status, StatusCode::OK);
    assert_eq!(dashboard.body["total_orders"], 1);
    assert_eq!(money(&dashboard.body["revenue"]), Money::ZERO);
}

#[tokio::test]
async fn test_reassigned_code_is_refused() {
    let ctx = TestContext::new();
    let mut admin = signed_in_admin(&ctx).await;
    let customer = ctx.account(CUSTOMER, UserRole::Customer).await;
    let courier_profile = ctx.account(COURIER, UserRole::DeliveryPartner).await;
    let other = ctx
        .account("meena@bazaar.test", UserRole::DeliveryPartner)
        .await;

    let product = admin
        .post(
            "/api/products",
            json!({
                "name": "Jaggery",
                "description": "Organic, 1 kg",
                "category": "Pantry",
                "price": "120.00",
                "original_price": null,
                "stock": 8,
                "images": [],
                "is_active": true
            }),
        )
        .await;
    let product_id = id(&product.body);

    let mut shopper = ctx.storefront_client();
    assert_eq!(shopper.sign_in(CUSTOMER).await.status, StatusCode::OK);
    shopper
        .post("/api/cart/items", json!({ "product_id": product_id }))
        .await;
    let quote = shopper.post("/api/checkout/quote", json!({})).await;
    let placed = shopper
        .post(
            "/api/checkout/orders",
            json!({
                "quote_token": quote.body["token"],
                "payment_method": "cod",
                "address": {
                    "full_name": "Asha Rao",
                    "phone": "9845012345",
                    "line1": "12 MG Road",
                    "city": "Bengaluru",
                    "state": "Karnataka",
                    "pincode": "560001"
                }
            }),
        )
        .await;
    assert_eq!(placed.status, StatusCode::CREATED, "{}", placed.body);
    assert_eq!(placed.body["user_id"], json!(customer.id));
    let order_id = id(&placed.body);

    admin
        .post(
            &format!("/api/orders/{order_id}/status"),
            json!({ "status": "confirmed" }),
        )
        .await;
    let delivery = admin
        .post("/api/deliveries", json!({ "order_id": order_id }))
        .await;
    let delivery_id = id(&delivery.body);

    let first = admin
        .post(
            &format!("/api/deliveries/{delivery_id}/assign"),
            json!({ "courier_id": courier_profile.id }),
        )
        .await;
    let stale = first.body["qr_token"].as_str().unwrap().to_owned();
    let second = admin
        .post(
            &format!("/api/deliveries/{delivery_id}/assign"),
            json!({ "courier_id": other.id }),
        )
        .await;
    assert_eq!(second.status, StatusCode::OK);

    let mut courier = ctx.storefront_client();
    courier.sign_in("meena@bazaar.test").await;
    let refused = courier
        .post(
            &format!("/api/courier/deliveries/{delivery_id}/status"),
            json!({ "qr_token": stale, "status": "picked_up" }),
        )
        .await;
    assert!(refused.status.is_client_error(), "{}", refused.body);
}
