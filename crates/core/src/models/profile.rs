//! User profiles and referrals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Email, Money, ReferralId, UserId, UserRole};

/// The `profiles` row that sits alongside an auth account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub email: Option<Email>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub wallet_balance: Money,
    pub referral_code: String,
    pub referred_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    /// A fresh customer profile for a new account.
    #[must_use]
    pub fn new_customer(id: UserId, email: Option<Email>, full_name: Option<String>) -> Self {
        Self {
            id,
            email,
            full_name,
            phone: None,
            role: UserRole::Customer,
            wallet_balance: Money::ZERO,
            referral_code: referral_code_for(id),
            referred_by: None,
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    #[must_use]
    pub fn is_courier(&self) -> bool {
        self.role == UserRole::DeliveryPartner
    }
}

/// Deterministic referral code for a user: `BZ` plus six hex digits.
#[must_use]
pub fn referral_code_for(id: UserId) -> String {
    let simple = id.as_uuid().simple().to_string();
    format!("BZ{}", simple[..6].to_uppercase())
}

/// A completed referral.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    pub id: ReferralId,
    pub referrer_id: UserId,
    pub referee_id: UserId,
    pub code: String,
    pub reward: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferralError {
    #[error("referral code not found")]
    UnknownCode,
    #[error("you cannot use your own referral code")]
    SelfReferral,
    #[error("a referral code has already been applied to this account")]
    AlreadyReferred,
}

/// Check that `referee` may redeem `referrer`'s code.
///
/// # Errors
///
/// Returns [`ReferralError`] for self-referral or a second redemption.
pub fn check_referral(referee: &Profile, referrer: &Profile) -> Result<(), ReferralError> {
    if referee.id == referrer.id {
        return Err(ReferralError::SelfReferral);
    }
    if referee.referred_by.is_some() {
        return Err(ReferralError::AlreadyReferred);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_referral_code_shape() {
        let code = referral_code_for(UserId::random());
        assert_eq!(code.len(), 8);
        assert!(code.starts_with("BZ"));
        assert!(code[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn test_referral_rules() {
        let a = Profile::new_customer(UserId::random(), None, None);
        let mut b = Profile::new_customer(UserId::random(), None, None);
        assert_eq!(check_referral(&a, &a), Err(ReferralError::SelfReferral));
        assert!(check_referral(&b, &a).is_ok());
        b.referred_by = Some(a.id);
        assert_eq!(check_referral(&b, &a), Err(ReferralError::AlreadyReferred));
    }
}
