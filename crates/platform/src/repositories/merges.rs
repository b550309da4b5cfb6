//! Guest-to-account merges.
//!
//! A merge row is written with its plan before any cart or wishlist row
//! changes, and flipped to applied once they all have. A retry after a
//! partial failure re-applies the stored plan instead of planning again
//! against rows the first attempt already touched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use bazaar_core::UserId;
use bazaar_core::shopper::MergePlan;

use super::{RepositoryError, decode_first, encode, patch};
use crate::backend::Backend;
use crate::query::{Filter, Query, Table};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MergeRow {
    id: Uuid,
    user_id: UserId,
    plan: MergePlan,
    applied: bool,
    created_at: DateTime<Utc>,
}

/// Where a merge id stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeState {
    /// Never seen.
    Unknown,
    /// Planned, possibly partly written.
    Pending(MergePlan),
    /// Every write landed.
    Applied,
}

pub struct MergeRepository<'a> {
    backend: &'a dyn Backend,
}

impl<'a> MergeRepository<'a> {
    #[must_use]
    pub const fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn state(&self, merge_id: Uuid) -> Result<MergeState, RepositoryError> {
        let query = Query::new().eq("id", merge_id.to_string()).limit(1);
        let row: Option<MergeRow> = decode_first(self.backend.select(Table::MergeRequests, &query).await?)?;
        Ok(match row {
            None => MergeState::Unknown,
            Some(row) if row.applied => MergeState::Applied,
            Some(row) => MergeState::Pending(row.plan),
        })
    }

    /// Store the plan for a merge before writing any of it.
    ///
    /// Returns the plan that will be applied: `plan` itself, or the one
    /// already stored under this id if another request got there first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn begin(&self, merge_id: Uuid, user_id: UserId, plan: MergePlan) -> Result<MergePlan, RepositoryError> {
        let row = MergeRow {
            id: merge_id,
            user_id,
            plan,
            applied: false,
            created_at: Utc::now(),
        };
        match self.backend.insert(Table::MergeRequests, vec![encode(&row)?]).await {
            Ok(_) => Ok(row.plan),
            Err(e) if e.is_conflict() => match self.state(merge_id).await? {
                MergeState::Pending(stored) => Ok(stored),
                MergeState::Applied | MergeState::Unknown => Ok(MergePlan::default()),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Mark a merge as applied. Marking twice is fine.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Backend` if the platform call fails.
    pub async fn mark_applied(&self, merge_id: Uuid) -> Result<(), RepositoryError> {
        self.backend
            .update(
                Table::MergeRequests,
                &[Filter::eq("id", merge_id.to_string())],
                patch([("applied", serde_json::Value::Bool(true))]),
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use bazaar_core::models::CartItem;
    use bazaar_core::{CartItemId, ProductId};

    use super::*;
    use crate::MemoryBackend;

    fn plan() -> MergePlan {
        MergePlan {
            quantity_updates: vec![(CartItemId::random(), 5)],
            cart_inserts: vec![CartItem::new(ProductId::random(), 1)],
            wishlist_inserts: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_second_begin_keeps_first_plan() {
        let backend = MemoryBackend::new();
        let repo = MergeRepository::new(&backend);
        let merge_id = Uuid::new_v4();
        let user = UserId::random();
        let first = plan();

        assert_eq!(repo.state(merge_id).await.unwrap(), MergeState::Unknown);
        assert_eq!(repo.begin(merge_id, user, first.clone()).await.unwrap(), first);
        assert_eq!(repo.begin(merge_id, user, plan()).await.unwrap(), first);
        assert_eq!(repo.state(merge_id).await.unwrap(), MergeState::Pending(first));

        repo.mark_applied(merge_id).await.unwrap();
        assert_eq!(repo.state(merge_id).await.unwrap(), MergeState::Applied);
    }
}
