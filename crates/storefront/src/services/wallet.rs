//! Wallet balance, ledger and referrals.
//!
//! One coin is one rupee. Referral codes are redeemed once per account and
//! credit [`REFERRAL_REWARD`] coins to both sides.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};

use bazaar_core::models::profile::check_referral;
use bazaar_core::models::wallet::REFERRAL_REWARD;
use bazaar_core::models::{Referral, ReferralError, TransactionReason, WalletTransaction};
use bazaar_core::{Money, ReferralId, UserId};
use bazaar_platform::repositories::{ProfileRepository, ReferralRepository, WalletRepository};
use bazaar_platform::{Backend, RepositoryError};

use crate::error::AppError;

/// Everything on the wallet page.
#[derive(Debug, Clone, Serialize)]
pub struct WalletSummary {
    pub balance: Money,
    pub transactions: Vec<WalletTransaction>,
    pub referral_code: String,
    pub referrals: Vec<Referral>,
}

/// # Errors
///
/// Returns `AppError::NotFound` if the profile is missing.
pub async fn summary(backend: &dyn Backend, user_id: UserId) -> Result<WalletSummary, AppError> {
    let profile = ProfileRepository::new(backend)
        .get(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile".to_owned()))?;
    let transactions = WalletRepository::new(backend).history(user_id).await?;
    let referrals = ReferralRepository::new(backend)
        .list_by_referrer(user_id)
        .await?;
    Ok(WalletSummary {
        balance: profile.wallet_balance,
        transactions,
        referral_code: profile.referral_code,
        referrals,
    })
}

fn rejected(err: ReferralError) -> AppError {
    AppError::BadRequest(err.to_string())
}

/// Redeem a referral code for `user_id`.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an unknown code, self-referral or a
/// second redemption.
#[instrument(skip(backend))]
pub async fn apply_referral(
    backend: &dyn Backend,
    user_id: UserId,
    code: &str,
) -> Result<Referral, AppError> {
    let profiles = ProfileRepository::new(backend);
    let referee = profiles
        .get(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Profile".to_owned()))?;
    let referrer = profiles
        .by_referral_code(code)
        .await?
        .ok_or_else(|| rejected(ReferralError::UnknownCode))?;
    check_referral(&referee, &referrer).map_err(rejected)?;

    profiles
        .set_referred_by(referee.id, referrer.id)
        .await
        .map_err(|e| match e {
            RepositoryError::Conflict(_) => rejected(ReferralError::AlreadyReferred),
            other => other.into(),
        })?;

    let reward = Money::from_rupees(REFERRAL_REWARD);
    let referral = ReferralRepository::new(backend)
        .create(&Referral {
            id: ReferralId::random(),
            referrer_id: referrer.id,
            referee_id: referee.id,
            code: referrer.referral_code.clone(),
            reward,
            created_at: Utc::now(),
        })
        .await?;

    let wallet = WalletRepository::new(backend);
    wallet
        .credit(referee.id, reward, TransactionReason::ReferralBonus, None)
        .await?;
    wallet
        .credit(referrer.id, reward, TransactionReason::ReferralReward, None)
        .await?;

    info!(referrer_id = %referrer.id, referee_id = %referee.id, "Referral applied");
    Ok(referral)
}
