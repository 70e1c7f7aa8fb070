use crate::domain_model::UserId;
use crate::domain_port::{StorageTx, StoreError};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub token_hash: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait RefreshTokenRepo: Send + Sync {
    async fn insert_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        record: &RefreshTokenRecord,
    ) -> Result<(), StoreError>;

    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), StoreError>;

    /// Locks the row for the rest of the transaction (rotation is
    /// check-and-consume).
    async fn find_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError>;

    /// Returns whether a row was actually deleted.
    async fn delete_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        token_hash: &str,
    ) -> Result<bool, StoreError>;

    async fn delete(&self, token_hash: &str) -> Result<bool, StoreError>;
}
