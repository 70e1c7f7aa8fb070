use super::util::store_err;
use crate::domain_model::{MessageId, ReceiptStatus, UserId};
use crate::domain_port::{ReceiptRepo, StoreError};
use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

pub struct MySqlReceiptRepo {
    pool: MySqlPool,
}

impl MySqlReceiptRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlReceiptRepo { pool }
    }
}

#[async_trait::async_trait]
impl ReceiptRepo for MySqlReceiptRepo {
    async fn upsert_delivered(
        &self,
        message_id: MessageId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        // The update branch keeps the existing row untouched: a READ receipt
        // must never fall back to DELIVERED.
        sqlx::query(
            r#"
INSERT INTO message_receipt (message_id, user_id, status, status_at)
VALUES (?, ?, ?, ?)
ON DUPLICATE KEY UPDATE status = status
"#,
        )
        .bind(message_id)
        .bind(user_id)
        .bind(ReceiptStatus::Delivered.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(store_err("upsert delivered receipt"))?;
        Ok(())
    }

    async fn upsert_read(
        &self,
        message_id: MessageId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
INSERT INTO message_receipt (message_id, user_id, status, status_at)
VALUES (?, ?, ?, ?)
ON DUPLICATE KEY UPDATE status = VALUES(status), status_at = VALUES(status_at)
"#,
        )
        .bind(message_id)
        .bind(user_id)
        .bind(ReceiptStatus::Read.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(store_err("upsert read receipt"))?;
        Ok(())
    }
}
