//! Admin sign in and sign out.
//!
//! Staff use their platform accounts; only profiles holding the admin role
//! get a back-office session. A valid password on a non-admin account is
//! revoked straight away and answered like any other refusal.

use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use bazaar_core::models::Profile;
use bazaar_core::{Email, UserRole};
use bazaar_platform::repositories::ProfileRepository;
use bazaar_platform::{AuthProvider, Backend};

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_admin, set_current_admin};
use crate::models::CurrentAdmin;

#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

/// Sign an admin in and store them in the session.
///
/// # Errors
///
/// Returns `AppError::Auth` for bad credentials and `AppError::Forbidden`
/// if the account is not an admin.
#[instrument(skip(backend, auth, session, form), fields(email = %form.email))]
pub async fn sign_in(
    backend: &dyn Backend,
    auth: &dyn AuthProvider,
    session: &Session,
    form: SignInForm,
) -> Result<Profile, AppError> {
    let email = Email::parse(&form.email).map_err(|e| AppError::BadRequest(e.to_string()))?;
    let auth_session = auth
        .sign_in(&email, &SecretString::from(form.password))
        .await?;

    let profile = ProfileRepository::new(backend)
        .get(auth_session.user.id)
        .await?
        .filter(|p| p.role == UserRole::Admin);
    let Some(profile) = profile else {
        warn!(user_id = %auth_session.user.id, "Non-admin account tried the back office");
        if let Err(err) = auth.sign_out(&auth_session.access_token).await {
            warn!(error = %err, "Token revocation failed");
        }
        return Err(AppError::Forbidden("Admin account required".to_owned()));
    };

    let admin = CurrentAdmin {
        id: profile.id,
        email: auth_session.user.email.clone(),
        name: profile
            .full_name
            .clone()
            .unwrap_or_else(|| auth_session.user.email.to_string()),
        access_token: auth_session.access_token,
    };
    set_current_admin(session, &admin).await?;
    set_sentry_user(&admin.id, Some(admin.email.as_str()));
    info!(user_id = %admin.id, "Admin signed in");
    Ok(profile)
}

/// Sign out. A failed token revocation is logged and ignored.
///
/// # Errors
///
/// Returns `AppError::Session` if the session cannot be cleared.
pub async fn sign_out(
    auth: &dyn AuthProvider,
    session: &Session,
    admin: &CurrentAdmin,
) -> Result<(), AppError> {
    if let Err(err) = auth.sign_out(&admin.access_token).await {
        warn!(user_id = %admin.id, error = %err, "Token revocation failed");
    }
    clear_current_admin(session).await?;
    clear_sentry_user();
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use bazaar_platform::{MemoryAuth, MemoryBackend};

    use super::*;
    use crate::models::session_keys;

    pub(crate) const PASSWORD: &str = "correct horse battery";

    pub(crate) fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    /// An account with a profile in `role`, returning its email.
    pub(crate) async fn account(
        backend: &MemoryBackend,
        auth: &MemoryAuth,
        email: &str,
        role: UserRole,
    ) -> Email {
        let email = Email::parse(email).unwrap();
        let created = auth
            .sign_up(&email, &SecretString::from(PASSWORD))
            .await
            .unwrap();
        let profiles = ProfileRepository::new(backend);
        profiles
            .create(&Profile::new_customer(
                created.user.id,
                Some(email.clone()),
                Some("Meera".to_string()),
            ))
            .await
            .unwrap();
        if role != UserRole::Customer {
            profiles.set_role(created.user.id, role).await.unwrap();
        }
        email
    }

    fn form(email: &Email, password: &str) -> SignInForm {
        SignInForm {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_admin_signs_in_and_out() {
        let backend = MemoryBackend::new();
        let auth = MemoryAuth::new();
        let email = account(&backend, &auth, "ops@bazaar.in", UserRole::Admin).await;
        let session = session();

        let profile = sign_in(&backend, &auth, &session, form(&email, PASSWORD))
            .await
            .unwrap();
        assert_eq!(profile.role, UserRole::Admin);
        let stored: CurrentAdmin = session
            .get(session_keys::CURRENT_ADMIN)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.name, "Meera");

        sign_out(&auth, &session, &stored).await.unwrap();
        assert!(
            session
                .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_customer_refused() {
        let backend = MemoryBackend::new();
        let auth = MemoryAuth::new();
        let email = account(&backend, &auth, "shopper@example.in", UserRole::Customer).await;
        let session = session();

        let err = sign_in(&backend, &auth, &session, form(&email, PASSWORD))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
        assert!(
            session
                .get::<CurrentAdmin>(session_keys::CURRENT_ADMIN)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let backend = MemoryBackend::new();
        let auth = MemoryAuth::new();
        let email = account(&backend, &auth, "ops@bazaar.in", UserRole::Admin).await;

        let err = sign_in(&backend, &auth, &session(), form(&email, "not the password"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Auth(_)));
    }
}
