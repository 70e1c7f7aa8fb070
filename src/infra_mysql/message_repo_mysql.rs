use super::util::{downcast, like_pattern, store_err};
use crate::domain_model::{
    ContentType, ConversationId, DELETED_PLACEHOLDER, MessageId, MessageRecord, UserId,
};
use crate::domain_port::{MessageRepo, ReadTarget, SeekPosition, StorageTx, StoreError};
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

const MESSAGE_COLS: &str =
    "message_id, conversation_id, sender_id, content, content_type, reply_to_id, created_at, edited_at, deleted_at";

fn message_from_row(row: &MySqlRow) -> Result<MessageRecord, StoreError> {
    let content_type: String = row.get("content_type");
    Ok(MessageRecord {
        message_id: row.get("message_id"),
        conversation_id: row.get("conversation_id"),
        sender_id: row.get("sender_id"),
        content: row.get("content"),
        content_type: content_type.parse::<ContentType>().map_err(StoreError)?,
        reply_to_id: row.get::<Option<MessageId>, _>("reply_to_id"),
        created_at: row.get("created_at"),
        edited_at: row.get::<Option<DateTime<Utc>>, _>("edited_at"),
        deleted_at: row.get::<Option<DateTime<Utc>>, _>("deleted_at"),
    })
}

pub struct MySqlMessageRepo {
    pool: MySqlPool,
}

impl MySqlMessageRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlMessageRepo { pool }
    }
}

#[async_trait::async_trait]
impl MessageRepo for MySqlMessageRepo {
    async fn insert_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        record: &MessageRecord,
    ) -> Result<(), StoreError> {
        let tx = downcast(tx);

        sqlx::query(
            r#"
INSERT INTO message (message_id, conversation_id, sender_id, content, content_type, reply_to_id, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(record.message_id)
        .bind(record.conversation_id)
        .bind(record.sender_id)
        .bind(&record.content)
        .bind(record.content_type.as_str())
        .bind(record.reply_to_id)
        .bind(record.created_at)
        .execute(tx.conn())
        .await
        .map_err(store_err("insert message"))?;
        Ok(())
    }

    async fn get(&self, message_id: MessageId) -> Result<Option<MessageRecord>, StoreError> {
        let query = format!("SELECT {MESSAGE_COLS} FROM message WHERE message_id = ?");
        let row = sqlx::query(&query)
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err("query message"))?;
        row.as_ref().map(message_from_row).transpose()
    }

    async fn get_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        message_id: MessageId,
    ) -> Result<Option<MessageRecord>, StoreError> {
        let tx = downcast(tx);

        let query = format!("SELECT {MESSAGE_COLS} FROM message WHERE message_id = ?");
        let row = sqlx::query(&query)
            .bind(message_id)
            .fetch_optional(tx.conn())
            .await
            .map_err(store_err("query message"))?;
        row.as_ref().map(message_from_row).transpose()
    }

    async fn list_page_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        before: Option<SeekPosition>,
        limit: u16,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let tx = downcast(tx);

        // Strictly-older seek on the (created_at, id) total order; the id
        // column breaks timestamp collisions the same way the sort does.
        let rows = match before {
            None => {
                let query = format!(
                    r#"
SELECT {MESSAGE_COLS}
FROM message
WHERE conversation_id = ? AND deleted_at IS NULL
ORDER BY created_at DESC, message_id DESC
LIMIT ?
"#
                );
                sqlx::query(&query)
                    .bind(conversation_id)
                    .bind(limit)
                    .fetch_all(tx.conn())
                    .await
            }
            Some(seek) => {
                let query = format!(
                    r#"
SELECT {MESSAGE_COLS}
FROM message
WHERE conversation_id = ? AND deleted_at IS NULL
  AND (created_at < ? OR (created_at = ? AND message_id < ?))
ORDER BY created_at DESC, message_id DESC
LIMIT ?
"#
                );
                sqlx::query(&query)
                    .bind(conversation_id)
                    .bind(seek.created_at)
                    .bind(seek.created_at)
                    .bind(seek.message_id)
                    .bind(limit)
                    .fetch_all(tx.conn())
                    .await
            }
        }
        .map_err(store_err("page messages"))?;

        rows.iter().map(message_from_row).collect()
    }

    async fn last_message(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<MessageRecord>, StoreError> {
        let query = format!(
            r#"
SELECT {MESSAGE_COLS}
FROM message
WHERE conversation_id = ? AND deleted_at IS NULL
ORDER BY created_at DESC, message_id DESC
LIMIT 1
"#
        );
        let row = sqlx::query(&query)
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err("query last message"))?;
        row.as_ref().map(message_from_row).transpose()
    }

    async fn unread_counts(
        &self,
        user_id: UserId,
    ) -> Result<Vec<(ConversationId, i64)>, StoreError> {
        let rows = sqlx::query(
            r#"
SELECT m.conversation_id, COUNT(*) AS unread
FROM message m
JOIN conversation_participant p
  ON p.conversation_id = m.conversation_id AND p.user_id = ?
WHERE m.sender_id <> ?
  AND m.deleted_at IS NULL
  AND (p.last_read_at IS NULL OR m.created_at > p.last_read_at)
GROUP BY m.conversation_id
"#,
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err("count unread"))?;

        Ok(rows
            .iter()
            .map(|row| (row.get("conversation_id"), row.get::<i64, _>("unread")))
            .collect())
    }

    async fn list_read_targets(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        up_to: DateTime<Utc>,
    ) -> Result<Vec<ReadTarget>, StoreError> {
        let rows = sqlx::query(
            r#"
SELECT m.message_id, m.sender_id
FROM message m
WHERE m.conversation_id = ?
  AND m.created_at <= ?
  AND m.sender_id <> ?
  AND m.deleted_at IS NULL
  AND NOT EXISTS (
      SELECT 1 FROM message_receipt r
      WHERE r.message_id = m.message_id AND r.user_id = ? AND r.status = 'READ'
  )
ORDER BY m.created_at ASC, m.message_id ASC
"#,
        )
        .bind(conversation_id)
        .bind(up_to)
        .bind(reader)
        .bind(reader)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err("list read targets"))?;

        Ok(rows
            .iter()
            .map(|row| ReadTarget {
                message_id: row.get("message_id"),
                sender_id: row.get("sender_id"),
            })
            .collect())
    }

    async fn set_edited(
        &self,
        message_id: MessageId,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE message SET content = ?, edited_at = ? WHERE message_id = ?")
            .bind(content)
            .bind(edited_at)
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(store_err("edit message"))?;
        Ok(())
    }

    async fn tombstone(
        &self,
        message_id: MessageId,
        deleted_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE message SET content = ?, deleted_at = ? WHERE message_id = ?")
            .bind(DELETED_PLACEHOLDER)
            .bind(deleted_at)
            .bind(message_id)
            .execute(&self.pool)
            .await
            .map_err(store_err("tombstone message"))?;
        Ok(())
    }

    async fn search(
        &self,
        user_id: UserId,
        query: &str,
        conversation_id: Option<ConversationId>,
        limit: u16,
    ) -> Result<Vec<MessageRecord>, StoreError> {
        let pattern = like_pattern(query);

        let rows = match conversation_id {
            None => {
                let sql = format!(
                    r#"
SELECT m.message_id, m.conversation_id, m.sender_id, m.content, m.content_type,
       m.reply_to_id, m.created_at, m.edited_at, m.deleted_at
FROM message m
JOIN conversation_participant p
  ON p.conversation_id = m.conversation_id AND p.user_id = ?
WHERE m.deleted_at IS NULL
  AND LOWER(m.content) LIKE ?
ORDER BY m.created_at DESC, m.message_id DESC
LIMIT {limit}
"#
                );
                sqlx::query(&sql)
                    .bind(user_id)
                    .bind(&pattern)
                    .fetch_all(&self.pool)
                    .await
            }
            Some(conversation_id) => {
                let sql = format!(
                    r#"
SELECT m.message_id, m.conversation_id, m.sender_id, m.content, m.content_type,
       m.reply_to_id, m.created_at, m.edited_at, m.deleted_at
FROM message m
JOIN conversation_participant p
  ON p.conversation_id = m.conversation_id AND p.user_id = ?
WHERE m.conversation_id = ?
  AND m.deleted_at IS NULL
  AND LOWER(m.content) LIKE ?
ORDER BY m.created_at DESC, m.message_id DESC
LIMIT {limit}
"#
                );
                sqlx::query(&sql)
                    .bind(user_id)
                    .bind(conversation_id)
                    .bind(&pattern)
                    .fetch_all(&self.pool)
                    .await
            }
        }
        .map_err(store_err("search messages"))?;

        rows.iter().map(message_from_row).collect()
    }
}
