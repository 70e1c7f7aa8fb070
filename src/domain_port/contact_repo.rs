use crate::domain_model::{ContactEntry, UserId};
use crate::domain_port::StoreError;
use chrono::{DateTime, Utc};

/// Outcome of a contact insert; the unique key decides.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ContactInsert {
    Inserted,
    Duplicate,
}

#[async_trait::async_trait]
pub trait ContactRepo: Send + Sync {
    async fn insert(
        &self,
        owner: UserId,
        contact: UserId,
        nickname: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ContactInsert, StoreError>;

    async fn list(&self, owner: UserId) -> Result<Vec<ContactEntry>, StoreError>;

    async fn delete(&self, owner: UserId, contact: UserId) -> Result<bool, StoreError>;
}
