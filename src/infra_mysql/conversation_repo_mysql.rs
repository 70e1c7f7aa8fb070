use super::util::{downcast, store_err};
use crate::domain_model::{ConversationId, ConversationKind, ConversationRecord, UserId};
use crate::domain_port::{ConversationRepo, StorageTx, StoreError};
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

fn conversation_from_row(row: &MySqlRow) -> Result<ConversationRecord, StoreError> {
    let kind: String = row.get("kind");
    Ok(ConversationRecord {
        conversation_id: row.get("conversation_id"),
        kind: kind.parse::<ConversationKind>().map_err(StoreError)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

pub struct MySqlConversationRepo {
    pool: MySqlPool,
}

impl MySqlConversationRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlConversationRepo { pool }
    }
}

#[async_trait::async_trait]
impl ConversationRepo for MySqlConversationRepo {
    async fn create_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        kind: ConversationKind,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let tx = downcast(tx);

        sqlx::query(
            r#"
INSERT INTO conversation (conversation_id, kind, created_at, updated_at)
VALUES (?, ?, ?, ?)
"#,
        )
        .bind(conversation_id)
        .bind(kind.as_str())
        .bind(now)
        .bind(now)
        .execute(tx.conn())
        .await
        .map_err(store_err("insert conversation"))?;
        Ok(())
    }

    async fn get(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<ConversationRecord>, StoreError> {
        let row = sqlx::query(
            "SELECT conversation_id, kind, created_at, updated_at FROM conversation WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err("query conversation"))?;
        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn get_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
    ) -> Result<Option<ConversationRecord>, StoreError> {
        let tx = downcast(tx);

        let row = sqlx::query(
            "SELECT conversation_id, kind, created_at, updated_at FROM conversation WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_optional(tx.conn())
        .await
        .map_err(store_err("query conversation"))?;
        row.as_ref().map(conversation_from_row).transpose()
    }

    async fn find_direct_between_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<Option<ConversationId>, StoreError> {
        let tx = downcast(tx);

        // Both users must sit on the SAME conversation: one participant row
        // per user, self-joined. "Any participant in {a,b}" would also match
        // each user's direct chats with third parties.
        let row = sqlx::query(
            r#"
SELECT c.conversation_id
FROM conversation c
JOIN conversation_participant pa
  ON pa.conversation_id = c.conversation_id AND pa.user_id = ?
JOIN conversation_participant pb
  ON pb.conversation_id = c.conversation_id AND pb.user_id = ?
WHERE c.kind = 'DIRECT'
LIMIT 1
"#,
        )
        .bind(user_a)
        .bind(user_b)
        .fetch_optional(tx.conn())
        .await
        .map_err(store_err("find direct conversation"))?;

        Ok(row.map(|row| row.get("conversation_id")))
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<ConversationRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
SELECT c.conversation_id, c.kind, c.created_at, c.updated_at
FROM conversation c
JOIN conversation_participant p ON p.conversation_id = c.conversation_id
WHERE p.user_id = ?
ORDER BY c.updated_at DESC, c.conversation_id DESC
"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err("list conversations"))?;

        rows.iter().map(conversation_from_row).collect()
    }

    async fn touch_updated_at_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let tx = downcast(tx);

        sqlx::query("UPDATE conversation SET updated_at = ? WHERE conversation_id = ?")
            .bind(now)
            .bind(conversation_id)
            .execute(tx.conn())
            .await
            .map_err(store_err("touch conversation"))?;
        Ok(())
    }
}
