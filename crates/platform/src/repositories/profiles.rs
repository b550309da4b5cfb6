//! Profile repository.

use serde_json::json;
use tracing::{debug, instrument};

use bazaar_core::models::wallet::apply;
use bazaar_core::models::{Profile, TransactionKind};
use bazaar_core::{Email, Money, UserId, UserRole};

use super::{CAS_ATTEMPTS, RepositoryError, decode_all, decode_first, encode, money_value, patch};
use crate::backend::Backend;
use crate::query::{Filter, Query, Table};

/// Repository for `profiles` rows.
pub struct ProfileRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> ProfileRepository<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Get a profile by user id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if the row cannot be decoded.
    pub async fn get(&self, id: UserId) -> Result<Option<Profile>, RepositoryError> {
        let query = Query::new().eq("id", id.to_string()).limit(1);
        decode_first(self.backend.select(Table::Profiles, &query).await?)
    }

    /// Find the profile that owns a referral code.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn by_referral_code(&self, code: &str) -> Result<Option<Profile>, RepositoryError> {
        let query = Query::new()
            .eq("referral_code", code.trim().to_uppercase())
            .limit(1);
        decode_first(self.backend.select(Table::Profiles, &query).await?)
    }

    /// Find a profile by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn by_email(&self, email: &Email) -> Result<Option<Profile>, RepositoryError> {
        let query = Query::new().eq("email", email.as_str()).limit(1);
        decode_first(self.backend.select(Table::Profiles, &query).await?)
    }

    /// Profiles with the given role, by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn list_by_role(&self, role: UserRole) -> Result<Vec<Profile>, RepositoryError> {
        let query = Query::new()
            .eq("role", role.to_string())
            .order_asc("full_name");
        decode_all(self.backend.select(Table::Profiles, &query).await?)
    }

    /// Insert a profile.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the id or referral code is taken.
    #[instrument(skip(self, profile), fields(user_id = %profile.id))]
    pub async fn create(&self, profile: &Profile) -> Result<Profile, RepositoryError> {
        let stored = self
            .backend
            .insert(Table::Profiles, vec![encode(profile)?])
            .await?;
        decode_first(stored)?
            .ok_or_else(|| RepositoryError::DataCorruption("insert returned no row".to_owned()))
    }

    /// Change a user's role.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    #[instrument(skip(self))]
    pub async fn set_role(&self, id: UserId, role: UserRole) -> Result<Profile, RepositoryError> {
        self.patch_one(id, &[], patch([("role", json!(role.to_string()))]))
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Update name and phone.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the profile does not exist.
    pub async fn update_contact(
        &self,
        id: UserId,
        full_name: Option<&str>,
        phone: Option<&str>,
    ) -> Result<Profile, RepositoryError> {
        let changes = patch([("full_name", json!(full_name)), ("phone", json!(phone))]);
        self.patch_one(id, &[], changes)
            .await?
            .ok_or(RepositoryError::NotFound)
    }

    /// Record who referred this user. Only succeeds once per account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a referrer is already set.
    pub async fn set_referred_by(&self, id: UserId, referrer: UserId) -> Result<Profile, RepositoryError> {
        let changes = patch([("referred_by", json!(referrer.to_string()))]);
        match self
            .patch_one(id, &[Filter::is_null("referred_by")], changes)
            .await?
        {
            Some(profile) => Ok(profile),
            None if self.get(id).await?.is_some() => Err(RepositoryError::Conflict(
                "referral already applied".to_owned(),
            )),
            None => Err(RepositoryError::NotFound),
        }
    }

    /// Apply a credit or debit to the wallet balance and return the new balance.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Wallet` for an overdraft or a non-positive
    /// amount, `RepositoryError::Contention` if the balance keeps changing.
    #[instrument(skip(self))]
    pub async fn adjust_wallet(
        &self,
        id: UserId,
        kind: TransactionKind,
        amount: Money,
    ) -> Result<Money, RepositoryError> {
        for attempt in 1..=CAS_ATTEMPTS {
            let profile = self.get(id).await?.ok_or(RepositoryError::NotFound)?;
            let next = apply(profile.wallet_balance, kind, amount)?;
            let guard = [Filter::eq("wallet_balance", money_value(profile.wallet_balance))];
            let changes = patch([("wallet_balance", money_value(next))]);
            if self.patch_one(id, &guard, changes).await?.is_some() {
                return Ok(next);
            }
            debug!(user_id = %id, attempt, "Wallet balance changed underneath; retrying");
        }
        Err(RepositoryError::Contention("profiles.wallet_balance"))
    }

    async fn patch_one(
        &self,
        id: UserId,
        guards: &[Filter],
        changes: crate::backend::Row,
    ) -> Result<Option<Profile>, RepositoryError> {
        let mut filters = vec![Filter::eq("id", id.to_string())];
        filters.extend_from_slice(guards);
        let updated = self.backend.update(Table::Profiles, &filters, changes).await?;
        decode_first(updated)
    }
}
