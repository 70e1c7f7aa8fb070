use crate::domain_model::{MessageId, UserId};
use crate::domain_port::StoreError;
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait ReceiptRepo: Send + Sync {
    /// Insert a DELIVERED receipt. The duplicate-key branch is a no-op so an
    /// existing READ row is never downgraded.
    async fn upsert_delivered(
        &self,
        message_id: MessageId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Insert or promote to READ.
    async fn upsert_read(
        &self,
        message_id: MessageId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
