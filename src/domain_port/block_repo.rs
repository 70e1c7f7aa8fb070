use crate::domain_model::{PublicUser, UserId};
use crate::domain_port::{StorageTx, StoreError};
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait BlockRepo: Send + Sync {
    /// Idempotent: re-blocking an already blocked user succeeds.
    async fn insert(
        &self,
        blocker: UserId,
        blocked: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn delete(&self, blocker: UserId, blocked: UserId) -> Result<bool, StoreError>;

    /// Symmetric: true when either side blocks the other.
    async fn exists_between(&self, a: UserId, b: UserId) -> Result<bool, StoreError>;

    async fn exists_between_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        a: UserId,
        b: UserId,
    ) -> Result<bool, StoreError>;

    async fn list(&self, blocker: UserId) -> Result<Vec<PublicUser>, StoreError>;
}
