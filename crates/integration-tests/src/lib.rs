//! Integration tests for Bazaar.
//!
//! Both routers run in-process over one [`MemoryBackend`] and
//! [`MemoryAuth`], with `tower-sessions`' `MemoryStore` in place of
//! `PostgreSQL`. Requests go through `tower::ServiceExt::oneshot`, so the
//! full middleware stack (sessions, rate limits, headers) is exercised
//! without binding a port.
//!
//! ```bash
//! cargo test -p bazaar-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use chrono::Duration;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use bazaar_admin::config::AdminConfig;
use bazaar_core::models::Profile;
use bazaar_core::pricing::PricingPolicy;
use bazaar_core::{Email, UserRole};
use bazaar_platform::repositories::ProfileRepository;
use bazaar_platform::{AuthProvider, MemoryAuth, MemoryBackend, PlatformConfig};
use bazaar_storefront::config::StorefrontConfig;

/// Shared by both binaries so admin-minted QR codes verify in the portal.
pub const DELIVERY_TOKEN_SECRET: &str = "delivery-token-key-for-tests-only-01";

/// Password for every account the tests create.
pub const PASSWORD: &str = "correct horse battery";

fn platform() -> PlatformConfig {
    PlatformConfig {
        url: "http://localhost:54321".to_string(),
        anon_key: SecretString::from("anon"),
        service_key: SecretString::from("service"),
    }
}

#[must_use]
pub fn storefront_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://localhost/test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 3000,
        base_url: "http://localhost:3000".to_string(),
        platform: platform(),
        quote_secret: SecretString::from("quote-signing-key-for-tests-only-0001"),
        delivery_token_secret: SecretString::from(DELIVERY_TOKEN_SECRET),
        payment_gateway_key: "rzp_test_key".to_string(),
        pricing: PricingPolicy::default(),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_traces_sample_rate: 0.0,
    }
}

#[must_use]
pub fn admin_config() -> AdminConfig {
    AdminConfig {
        database_url: SecretString::from("postgres://localhost/test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 3001,
        base_url: "http://localhost:3001".to_string(),
        platform: platform(),
        delivery_token_secret: SecretString::from(DELIVERY_TOKEN_SECRET),
        delivery_token_ttl: Duration::hours(48),
        low_stock_threshold: 5,
        json_logs: false,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Both routers over one in-memory platform.
pub struct TestContext {
    pub backend: Arc<MemoryBackend>,
    pub auth: Arc<MemoryAuth>,
    pub storefront: Router,
    pub admin: Router,
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let auth = Arc::new(MemoryAuth::new());
        let storefront = bazaar_storefront::app(
            bazaar_storefront::state::AppState::new(
                storefront_config(),
                backend.clone(),
                auth.clone(),
            ),
            MemoryStore::default(),
        );
        let admin = bazaar_admin::app(
            bazaar_admin::state::AppState::new(admin_config(), backend.clone(), auth.clone()),
            MemoryStore::default(),
        );
        Self {
            backend,
            auth,
            storefront,
            admin,
        }
    }

    /// Register an account with `role` directly on the platform.
    pub async fn account(&self, email: &str, role: UserRole) -> Profile {
        let email = Email::parse(email).unwrap();
        let session = self
            .auth
            .sign_up(&email, &SecretString::from(PASSWORD))
            .await
            .unwrap();
        let profiles = ProfileRepository::new(self.backend.as_ref());
        let profile = profiles
            .create(&Profile::new_customer(session.user.id, Some(email), None))
            .await
            .unwrap();
        if role == UserRole::Customer {
            profile
        } else {
            profiles.set_role(profile.id, role).await.unwrap()
        }
    }

    #[must_use]
    pub fn storefront_client(&self) -> Client {
        Client::new(self.storefront.clone())
    }

    #[must_use]
    pub fn admin_client(&self) -> Client {
        Client::new(self.admin.clone())
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A browser-like client for one router that keeps its session cookie.
pub struct Client {
    app: Router,
    cookie: Option<String>,
}

/// Status, headers and decoded JSON body (`Value::Null` if not JSON).
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

impl Client {
    #[must_use]
    pub const fn new(app: Router) -> Self {
        Self { app, cookie: None }
    }

    pub async fn get(&mut self, uri: &str) -> TestResponse {
        self.send(Method::GET, uri, None, &[]).await
    }

    pub async fn post(&mut self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::POST, uri, Some(body), &[]).await
    }

    pub async fn put(&mut self, uri: &str, body: Value) -> TestResponse {
        self.send(Method::PUT, uri, Some(body), &[]).await
    }

    pub async fn send(
        &mut self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        extra_headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.7");
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        for (name, value) in extra_headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        if let Some(set_cookie) = response.headers().get(header::SET_COOKIE) {
            let pair = set_cookie.to_str().unwrap().split(';').next().unwrap();
            self.cookie = Some(pair.to_owned());
        }

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Sign in through the router's `/api/auth/sign-in`.
    pub async fn sign_in(&mut self, email: &str) -> TestResponse {
        self.post(
            "/api/auth/sign-in",
            serde_json::json!({ "email": email, "password": PASSWORD }),
        )
        .await
    }
}
