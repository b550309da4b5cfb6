//! Back-office access control.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use serde_json::json;

use bazaar_core::UserRole;
use bazaar_integration_tests::TestContext;

#[tokio::test]
async fn test_health_carries_security_headers() {
    let ctx = TestContext::new();
    let res = ctx.admin_client().get("/health").await;

    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.headers.get("x-frame-options").unwrap(), "DENY");
    assert!(res.headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_api_requires_session() {
    let ctx = TestContext::new();
    let mut client = ctx.admin_client();

    for uri in ["/api/dashboard", "/api/orders", "/api/returns"] {
        let res = client.get(uri).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn test_customer_cannot_enter_back_office() {
    let ctx = TestContext::new();
    ctx.account("asha@bazaar.test", UserRole::Customer).await;

    let mut client = ctx.admin_client();
    let res = client.sign_in("asha@bazaar.test").await;
    assert_eq!(res.status, StatusCode::FORBIDDEN, "{}", res.body);

    let res = client.get("/api/dashboard").await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_demoted_admin_loses_access() {
    let ctx = TestContext::new();
    let profile = ctx.account("owner@bazaar.test", UserRole::Admin).await;

    let mut client = ctx.admin_client();
    assert_eq!(client.sign_in("owner@bazaar.test").await.status, StatusCode::OK);
    assert_eq!(client.get("/api/dashboard").await.status, StatusCode::OK);

    bazaar_platform::repositories::ProfileRepository::new(ctx.backend.as_ref())
        .set_role(profile.id, UserRole::Customer)
        .await
        .unwrap();
    let res = client.get("/api/dashboard").await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_storefront_session_is_not_admin_session() {
    let ctx = TestContext::new();
    ctx.account("owner@bazaar.test", UserRole::Admin).await;

    let mut storefront = ctx.storefront_client();
    assert_eq!(
        storefront.sign_in("owner@bazaar.test").await.status,
        StatusCode::OK
    );

    let res = storefront
        .post("/api/products", json!({ "name": "Contraband" }))
        .await;
    assert!(res.status.is_client_error());
}
