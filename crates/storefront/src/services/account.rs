//! Sign up, sign in and the guest-to-account merge.
//!
//! The platform creates the `profiles` row asynchronously after sign up, so
//! sign in polls for it with a bounded exponential backoff and creates a
//! customer profile itself if it never shows up.

use std::time::Duration;

use rand::Rng;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use bazaar_core::models::Profile;
use bazaar_core::shopper::plan_merge;
use bazaar_core::{Email, Phone, UserId};
use bazaar_platform::repositories::{
    CartRepository, MergeRepository, MergeState, ProfileRepository, WishlistRepository,
};
use bazaar_platform::{AuthProvider, AuthSession, Backend, RepositoryError};

use crate::error::{AppError, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, set_current_user};
use crate::models::{CurrentUser, session_keys};
use crate::services::shopper::guest_state;
use crate::services::wallet;

/// Profile lookups after sign in.
pub const PROFILE_POLL_ATTEMPTS: u32 = 5;

/// First backoff delay; doubles each attempt.
const PROFILE_POLL_BASE: Duration = Duration::from_millis(100);

/// Sign up request body.
#[derive(Debug, Deserialize)]
pub struct SignUpForm {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub referral_code: Option<String>,
}

/// Sign in request body.
#[derive(Debug, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

/// Contact details the customer may change.
#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
}

/// What a guest merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    pub cart_updates: usize,
    pub cart_inserts: usize,
    pub wishlist_inserts: usize,
    /// The merge id had already been recorded.
    pub replayed: bool,
}

fn parse_email(raw: &str) -> Result<Email, AppError> {
    Email::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Create an account, its profile, and sign it in.
///
/// A referral code is checked before the account is created and redeemed
/// after.
///
/// # Errors
///
/// Returns `AppError::Auth` for a taken email or weak password and
/// `AppError::BadRequest` for an unknown referral code.
#[instrument(skip(backend, auth, session, form), fields(email = %form.email))]
pub async fn sign_up(
    backend: &dyn Backend,
    auth: &dyn AuthProvider,
    session: &Session,
    form: SignUpForm,
) -> Result<Profile, AppError> {
    let email = parse_email(&form.email)?;
    let referral_code = form
        .referral_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());
    if let Some(code) = referral_code
        && ProfileRepository::new(backend)
            .by_referral_code(code)
            .await?
            .is_none()
    {
        return Err(AppError::BadRequest("Referral code not found".to_owned()));
    }

    let auth_session = auth
        .sign_up(&email, &SecretString::from(form.password))
        .await?;
    let full_name = form
        .full_name
        .map(|n| n.trim().to_owned())
        .filter(|n| !n.is_empty());
    let profile = ProfileRepository::new(backend)
        .create(&Profile::new_customer(
            auth_session.user.id,
            Some(email),
            full_name,
        ))
        .await?;

    let profile = match referral_code {
        Some(code) => {
            wallet::apply_referral(backend, profile.id, code).await?;
            self::profile(backend, profile.id).await?
        }
        None => profile,
    };

    start_session(backend, session, &auth_session, &profile).await?;
    info!(user_id = %profile.id, "Account created");
    Ok(profile)
}

/// Sign in with email and password.
///
/// # Errors
///
/// Returns `AppError::Auth(InvalidCredentials)` for a wrong email or
/// password.
#[instrument(skip(backend, auth, session, form), fields(email = %form.email))]
pub async fn sign_in(
    backend: &dyn Backend,
    auth: &dyn AuthProvider,
    session: &Session,
    form: SignInForm,
) -> Result<Profile, AppError> {
    let email = parse_email(&form.email)?;
    let auth_session = auth
        .sign_in(&email, &SecretString::from(form.password))
        .await?;
    let profile = wait_for_profile(backend, auth_session.user.id, &email).await?;
    start_session(backend, session, &auth_session, &profile).await?;
    info!(user_id = %profile.id, "Signed in");
    Ok(profile)
}

async fn start_session(
    backend: &dyn Backend,
    session: &Session,
    auth_session: &AuthSession,
    profile: &Profile,
) -> Result<(), AppError> {
    let user = CurrentUser {
        id: profile.id,
        email: auth_session.user.email.clone(),
        role: profile.role,
        access_token: auth_session.access_token.clone(),
    };
    set_current_user(session, &user).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    merge_guest(backend, session, user.id).await?;
    Ok(())
}

/// Load the profile, polling while the platform creates it.
///
/// # Errors
///
/// Returns `AppError::Repository` if the platform read fails.
pub async fn wait_for_profile(
    backend: &dyn Backend,
    user_id: UserId,
    email: &Email,
) -> Result<Profile, AppError> {
    let profiles = ProfileRepository::new(backend);
    for attempt in 0..PROFILE_POLL_ATTEMPTS {
        if let Some(profile) = profiles.get(user_id).await? {
            return Ok(profile);
        }
        if attempt + 1 < PROFILE_POLL_ATTEMPTS {
            let jitter = Duration::from_millis(rand::rng().random_range(0..50));
            let delay = PROFILE_POLL_BASE * 2u32.pow(attempt) + jitter;
            debug!(%user_id, attempt, ?delay, "Profile not ready; retrying");
            tokio::time::sleep(delay).await;
        }
    }

    warn!(%user_id, "Profile missing after sign in; creating it");
    match profiles
        .create(&Profile::new_customer(user_id, Some(email.clone()), None))
        .await
    {
        Ok(profile) => Ok(profile),
        // Created by the platform between the last poll and the insert.
        Err(RepositoryError::Conflict(_)) => profiles
            .get(user_id)
            .await?
            .ok_or_else(|| AppError::Internal("profile vanished".to_owned())),
        Err(err) => Err(err.into()),
    }
}

/// Sign out. A failed token revocation is logged and ignored.
///
/// # Errors
///
/// Returns `AppError::Session` if the session cannot be cleared.
pub async fn sign_out(
    auth: &dyn AuthProvider,
    session: &Session,
    user: &CurrentUser,
) -> Result<(), AppError> {
    if let Err(err) = auth.sign_out(&user.access_token).await {
        warn!(user_id = %user.id, error = %err, "Token revocation failed");
    }
    clear_current_user(session).await?;
    session
        .remove::<serde_json::Value>(session_keys::CHECKOUT_SELECTION)
        .await?;
    clear_sentry_user();
    Ok(())
}

/// # Errors
///
/// Returns `AppError::NotFound` if the profile is missing.
pub async fn profile(backend: &dyn Backend, user_id: UserId) -> Result<Profile, AppError> {
    ProfileRepository::new(backend)
        .get(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile".to_owned()))
}

/// # Errors
///
/// Returns `AppError::BadRequest` for a malformed phone number.
pub async fn update_profile(
    backend: &dyn Backend,
    user_id: UserId,
    update: &ProfileUpdate,
) -> Result<Profile, AppError> {
    let full_name = update
        .full_name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    let phone = update
        .phone
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .map(Phone::parse)
        .transpose()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(ProfileRepository::new(backend)
        .update_contact(user_id, full_name, phone.as_ref().map(Phone::as_str))
        .await?)
}

/// Fold the session's guest cart and wishlist into the account.
///
/// The merge id is written to the session first. The plan is stored on the
/// platform under that id before any row changes and marked applied when
/// they are done; only then are the guest keys cleared. A retry after a
/// partial failure re-applies the stored plan, whose quantities are
/// absolute, and a retry after success only clears the session.
///
/// # Errors
///
/// Returns `AppError` if a session or platform call fails. The guest keys
/// are kept in that case so the next sign in retries.
#[instrument(skip(backend, session))]
pub async fn merge_guest(
    backend: &dyn Backend,
    session: &Session,
    user_id: UserId,
) -> Result<MergeOutcome, AppError> {
    let (guest_cart, guest_wishlist) = guest_state(session).await?;
    let pending = session.get::<Uuid>(session_keys::MERGE_ID).await?;
    if guest_cart.is_empty() && guest_wishlist.is_empty() && pending.is_none() {
        return Ok(MergeOutcome::default());
    }

    let merge_id = match pending {
        Some(id) => id,
        None => {
            let id = Uuid::new_v4();
            session.insert(session_keys::MERGE_ID, id).await?;
            id
        }
    };

    let merges = MergeRepository::new(backend);
    let mut outcome = MergeOutcome::default();
    let cart = CartRepository::new(backend);
    let wishlist = WishlistRepository::new(backend);
    let plan = match merges.state(merge_id).await? {
        MergeState::Applied => {
            debug!(%merge_id, "Merge already applied");
            outcome.replayed = true;
            None
        }
        MergeState::Pending(stored) => {
            info!(%merge_id, "Resuming stored merge plan");
            Some(stored)
        }
        MergeState::Unknown => {
            let planned = plan_merge(
                &cart.list(user_id).await?,
                &wishlist.list(user_id).await?,
                &guest_cart,
                &guest_wishlist,
            );
            Some(merges.begin(merge_id, user_id, planned).await?)
        }
    };

    if let Some(plan) = plan {
        cart.apply_merge(user_id, &plan).await?;
        wishlist.add_many(user_id, &plan.wishlist_inserts).await?;
        merges.mark_applied(merge_id).await?;

        outcome.cart_updates = plan.quantity_updates.len();
        outcome.cart_inserts = plan.cart_inserts.len();
        outcome.wishlist_inserts = plan.wishlist_inserts.len();
        info!(%merge_id, ?outcome, "Guest state merged");
    }

    session
        .remove::<serde_json::Value>(session_keys::GUEST_CART)
        .await?;
    session
        .remove::<serde_json::Value>(session_keys::GUEST_WISHLIST)
        .await?;
    session
        .remove::<serde_json::Value>(session_keys::MERGE_ID)
        .await?;
    Ok(outcome)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::models::{CartItem, WishlistItem};
    use bazaar_core::shopper::MergePlan;
    use bazaar_core::{ProductId, UserRole};
    use bazaar_platform::{MemoryAuth, MemoryBackend, Table};

    use super::*;
    use crate::services::fixtures::{draft, seed_product, seed_profile, session};

    async fn stash_guest(session: &Session, cart: &[CartItem], wishlist: &[WishlistItem]) {
        session.insert(session_keys::GUEST_CART, cart).await.unwrap();
        session
            .insert(session_keys::GUEST_WISHLIST, wishlist)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_merge_sums_and_clears_guest_state() {
        let backend = MemoryBackend::new();
        let profile = seed_profile(&backend, UserRole::Customer).await;
        let ghee = seed_product(&backend, draft("Ghee", 400, 50)).await;
        let rice = seed_product(&backend, draft("Rice", 90, 50)).await;
        CartRepository::new(&backend)
            .add(profile.id, ghee.id, 2)
            .await
            .unwrap();

        let session = session();
        stash_guest(
            &session,
            &[CartItem::new(ghee.id, 3), CartItem::new(rice.id, 1)],
            &[WishlistItem::new(rice.id)],
        )
        .await;

        let outcome = merge_guest(&backend, &session, profile.id).await.unwrap();
        assert_eq!(outcome.cart_updates, 1);
        assert_eq!(outcome.cart_inserts, 1);
        assert_eq!(outcome.wishlist_inserts, 1);

        let cart = CartRepository::new(&backend).list(profile.id).await.unwrap();
        let ghee_line = cart.iter().find(|i| i.product_id == ghee.id).unwrap();
        assert_eq!(ghee_line.quantity, 5);

        let (guest_cart, guest_wishlist) = guest_state(&session).await.unwrap();
        assert!(guest_cart.is_empty() && guest_wishlist.is_empty());
        assert!(
            session
                .get::<Uuid>(session_keys::MERGE_ID)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_recorded_merge_is_not_applied_twice() {
        let backend = MemoryBackend::new();
        let profile = seed_profile(&backend, UserRole::Customer).await;
        let product = ProductId::random();
        let session = session();
        let merge_id = Uuid::new_v4();
        let merges = MergeRepository::new(&backend);
        merges
            .begin(merge_id, profile.id, MergePlan::default())
            .await
            .unwrap();
        merges.mark_applied(merge_id).await.unwrap();
        session
            .insert(session_keys::MERGE_ID, merge_id)
            .await
            .unwrap();
        stash_guest(&session, &[CartItem::new(product, 2)], &[]).await;

        let outcome = merge_guest(&backend, &session, profile.id).await.unwrap();
        assert!(outcome.replayed);
        assert!(backend.rows(Table::CartItems).await.is_empty());
        assert!(guest_state(&session).await.unwrap().0.is_empty());
    }

    #[tokio::test]
    async fn test_failed_merge_keeps_guest_state() {
        let backend = MemoryBackend::new();
        let profile = seed_profile(&backend, UserRole::Customer).await;
        let product = seed_product(&backend, draft("Ghee", 400, 50)).await;
        let session = session();
        stash_guest(&session, &[CartItem::new(product.id, 2)], &[]).await;

        backend.fail_writes_to(Table::CartItems).await;
        assert!(merge_guest(&backend, &session, profile.id).await.is_err());
        let merge_id = session
            .get::<Uuid>(session_keys::MERGE_ID)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(guest_state(&session).await.unwrap().0.len(), 1);

        backend.clear_failures().await;
        merge_guest(&backend, &session, profile.id).await.unwrap();
        assert_eq!(
            MergeRepository::new(&backend).state(merge_id).await.unwrap(),
            MergeState::Applied
        );
        assert_eq!(
            CartRepository::new(&backend).list(profile.id).await.unwrap()[0].quantity,
            2
        );
    }

    #[tokio::test]
    async fn test_merge_retried_after_partial_write_sums_once() {
        let backend = MemoryBackend::new();
        let profile = seed_profile(&backend, UserRole::Customer).await;
        let ghee = seed_product(&backend, draft("Ghee", 400, 50)).await;
        let rice = seed_product(&backend, draft("Rice", 90, 50)).await;
        CartRepository::new(&backend)
            .add(profile.id, ghee.id, 2)
            .await
            .unwrap();
        let session = session();
        stash_guest(
            &session,
            &[CartItem::new(ghee.id, 3)],
            &[WishlistItem::new(rice.id)],
        )
        .await;

        // Cart rows land, the wishlist write fails.
        backend.fail_writes_to(Table::Wishlist).await;
        assert!(merge_guest(&backend, &session, profile.id).await.is_err());
        let cart = CartRepository::new(&backend).list(profile.id).await.unwrap();
        assert_eq!(cart[0].quantity, 5);

        backend.clear_failures().await;
        merge_guest(&backend, &session, profile.id).await.unwrap();
        let cart = CartRepository::new(&backend).list(profile.id).await.unwrap();
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 5);
        let wishlist = WishlistRepository::new(&backend).list(profile.id).await.unwrap();
        assert_eq!(wishlist.len(), 1);
    }

    #[tokio::test]
    async fn test_sign_up_with_referral_then_sign_in() {
        let backend = MemoryBackend::new();
        let auth = MemoryAuth::new();
        let referrer = seed_profile(&backend, UserRole::Customer).await;

        let signup = session();
        let profile = sign_up(
            &backend,
            &auth,
            &signup,
            SignUpForm {
                email: "meera@example.in".to_string(),
                password: "correct horse battery".to_string(),
                full_name: Some("Meera".to_string()),
                referral_code: Some(referrer.referral_code.clone()),
            },
        )
        .await
        .unwrap();
        assert_eq!(profile.referred_by, Some(referrer.id));
        assert_eq!(profile.wallet_balance, bazaar_core::Money::from_rupees(50));

        let fresh = session();
        let signed_in = sign_in(
            &backend,
            &auth,
            &fresh,
            SignInForm {
                email: "meera@example.in".to_string(),
                password: "correct horse battery".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(signed_in.id, profile.id);
        let current = fresh
            .get::<CurrentUser>(session_keys::CURRENT_USER)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.id, profile.id);
    }

    #[tokio::test]
    async fn test_unknown_referral_code_blocks_sign_up() {
        let backend = MemoryBackend::new();
        let auth = MemoryAuth::new();
        let err = sign_up(
            &backend,
            &auth,
            &session(),
            SignUpForm {
                email: "ravi@example.in".to_string(),
                password: "correct horse battery".to_string(),
                full_name: None,
                referral_code: Some("NOPE".to_string()),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_missing_profile_created_after_polling() {
        let backend = MemoryBackend::new();
        let user_id = UserId::random();
        let email = Email::parse("late@example.in").unwrap();
        let profile = wait_for_profile(&backend, user_id, &email).await.unwrap();
        assert_eq!(profile.id, user_id);
        assert_eq!(profile.role, UserRole::Customer);
    }
}
