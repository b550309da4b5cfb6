//! Password auth against the platform's auth endpoint.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use bazaar_core::{Email, UserId};

use crate::auth::{AuthError, AuthProvider, AuthSession, AuthUser, MIN_PASSWORD_LEN};
use crate::config::PlatformConfig;
use crate::error::BackendError;

#[derive(Debug, Deserialize)]
struct UserBody {
    id: Uuid,
    email: String,
}

#[derive(Debug, Deserialize)]
struct TokenBody {
    access_token: String,
    refresh_token: Option<String>,
    user: UserBody,
}

impl TryFrom<UserBody> for AuthUser {
    type Error = AuthError;

    fn try_from(body: UserBody) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::new(body.id),
            email: Email::parse(&body.email).map_err(|_| AuthError::InvalidToken)?,
        })
    }
}

impl TryFrom<TokenBody> for AuthSession {
    type Error = AuthError;

    fn try_from(body: TokenBody) -> Result<Self, Self::Error> {
        Ok(Self {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            user: body.user.try_into()?,
        })
    }
}

/// Auth client using the public key.
#[derive(Clone)]
pub struct RestAuth {
    inner: Arc<RestAuthInner>,
}

struct RestAuthInner {
    client: reqwest::Client,
    config: PlatformConfig,
}

impl RestAuth {
    #[must_use]
    pub fn new(config: PlatformConfig) -> Self {
        Self {
            inner: Arc::new(RestAuthInner {
                client: reqwest::Client::new(),
                config,
            }),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.inner
            .client
            .post(format!("{}{path}", self.inner.config.auth_url()))
            .header("apikey", self.inner.config.anon_key.expose_secret())
    }

    async fn token_response(response: reqwest::Response) -> Result<AuthSession, AuthError> {
        match response.status() {
            status if status.is_success() => {
                let body: TokenBody = response.json().await.map_err(BackendError::from)?;
                body.try_into()
            }
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                Err(AuthError::InvalidCredentials)
            }
            StatusCode::UNPROCESSABLE_ENTITY => Err(AuthError::EmailTaken),
            status => Err(BackendError::Status {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl AuthProvider for RestAuth {
    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, AuthError> {
        if password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword(MIN_PASSWORD_LEN));
        }
        let response = self
            .post("/signup")
            .json(&json!({
                "email": email.as_str(),
                "password": password.expose_secret(),
            }))
            .send()
            .await
            .map_err(BackendError::from)?;
        Self::token_response(response).await
    }

    #[instrument(skip(self, password), fields(email = %email))]
    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, AuthError> {
        let response = self
            .post("/token?grant_type=password")
            .json(&json!({
                "email": email.as_str(),
                "password": password.expose_secret(),
            }))
            .send()
            .await
            .map_err(BackendError::from)?;
        Self::token_response(response).await
    }

    async fn user_for_token(&self, access_token: &str) -> Result<AuthUser, AuthError> {
        let response = self
            .inner
            .client
            .get(format!("{}/user", self.inner.config.auth_url()))
            .header("apikey", self.inner.config.anon_key.expose_secret())
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(BackendError::from)?;

        if !response.status().is_success() {
            return Err(AuthError::InvalidToken);
        }
        let body: UserBody = response.json().await.map_err(BackendError::from)?;
        body.try_into()
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .post("/logout")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(BackendError::from)?;
        // Already-expired tokens are as good as signed out.
        if response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(BackendError::Status {
                status: response.status().as_u16(),
                message: "logout failed".to_owned(),
            }
            .into())
        }
    }
}
