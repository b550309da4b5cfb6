//! Account authentication seam.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use bazaar_core::{Email, UserId};

/// Errors from the auth service.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    EmailTaken,

    #[error("password must be at least {0} characters")]
    WeakPassword(usize),

    #[error("session expired or invalid")]
    InvalidToken,

    #[error("auth service error: {0}")]
    Backend(#[from] crate::error::BackendError),
}

/// The account behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    pub email: Email,
}

/// Tokens returned by sign in or sign up.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Password accounts on the platform.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an account and sign it in.
    async fn sign_up(&self, email: &Email, password: &SecretString)
    -> Result<AuthSession, AuthError>;

    /// Sign in with email and password.
    async fn sign_in(&self, email: &Email, password: &SecretString)
    -> Result<AuthSession, AuthError>;

    /// Resolve an access token to its account.
    async fn user_for_token(&self, access_token: &str) -> Result<AuthUser, AuthError>;

    /// Revoke an access token.
    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;
}
