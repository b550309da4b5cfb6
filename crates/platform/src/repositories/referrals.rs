//! Completed referrals.

use bazaar_core::UserId;
use bazaar_core::models::Referral;

use super::{RepositoryError, decode_all, decode_first, encode};
use crate::backend::Backend;
use crate::query::{Query, Table};

pub struct ReferralRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> ReferralRepository<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Record a referral. A referee can only be referred once.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the referee already has one.
    pub async fn create(&self, referral: &Referral) -> Result<Referral, RepositoryError> {
        let stored = self.backend.insert(Table::Referrals, vec![encode(referral)?]).await?;
        decode_first(stored)?
            .ok_or_else(|| RepositoryError::DataCorruption("insert returned no row".to_owned()))
    }

    /// People this user has referred.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn list_by_referrer(&self, referrer: UserId) -> Result<Vec<Referral>, RepositoryError> {
        let query = Query::new()
            .eq("referrer_id", referrer.to_string())
            .order_desc("created_at");
        decode_all(self.backend.select(Table::Referrals, &query).await?)
    }
}
