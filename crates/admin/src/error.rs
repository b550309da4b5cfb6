//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use bazaar_core::TransitionError;
use bazaar_core::token::TokenError;
use bazaar_platform::{AuthError, RepositoryError};

/// Application-level error type for admin.
#[derive(Debug, Error)]
pub enum AppError {
    /// Platform data operation failed.
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Platform auth operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Status change not allowed from the current status.
    #[error("{0}")]
    Transition(#[from] TransitionError),

    /// Handoff code could not be minted.
    #[error("Token error: {0}")]
    Token(#[from] TokenError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not an admin.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Status code for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Repository(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict(_)
                | RepositoryError::InsufficientStock { .. }
                | RepositoryError::UsageLimitReached { .. } => StatusCode::CONFLICT,
                RepositoryError::Wallet(_) => StatusCode::BAD_REQUEST,
                RepositoryError::Contention(_) => StatusCode::SERVICE_UNAVAILABLE,
                RepositoryError::Backend(_) | RepositoryError::DataCorruption(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
                AuthError::EmailTaken => StatusCode::CONFLICT,
                AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
                AuthError::Backend(_) => StatusCode::BAD_GATEWAY,
            },
            Self::Transition(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Token(_) | Self::Session(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            // Don't expose internal error details to clients
            Self::Repository(
                RepositoryError::Backend(_) | RepositoryError::DataCorruption(_),
            )
            | Self::Token(_)
            | Self::Session(_)
            | Self::Internal(_) => "Internal server error".to_owned(),
            Self::Repository(RepositoryError::NotFound) => "Not found".to_owned(),
            Self::Repository(err) => err.to_string(),
            Self::Auth(AuthError::Backend(_)) => "Authentication service unavailable".to_owned(),
            Self::Auth(err) => err.to_string(),
            Self::Transition(err) => err.to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::Conflict(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the signed-in admin.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::{OrderStatus, ProductId};

    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("coupon".to_string());
        assert_eq!(err.to_string(), "Not found: coupon");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::Unauthorized("x".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("x".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(
                TransitionError {
                    entity: "order",
                    from: OrderStatus::Delivered.to_string(),
                    to: OrderStatus::Cancelled.to_string(),
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(
                RepositoryError::InsufficientStock {
                    product_id: ProductId::random(),
                    available: 0,
                    requested: 3,
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::from(RepositoryError::DataCorruption("bad row in orders".to_string()));
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(
            AppError::from(TokenError::Key).public_message(),
            "Internal server error"
        );
    }
}
