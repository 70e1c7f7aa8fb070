use super::util::{downcast, store_err};
use crate::domain_model::{
    ConversationId, ParticipantProfile, ParticipantRecord, ParticipantRole, PublicUser, UserId,
};
use crate::domain_port::{ParticipantRepo, StorageTx, StoreError};
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

fn participant_from_row(row: &MySqlRow) -> Result<ParticipantRecord, StoreError> {
    let role: String = row.get("role");
    Ok(ParticipantRecord {
        conversation_id: row.get("conversation_id"),
        user_id: row.get("user_id"),
        role: role.parse::<ParticipantRole>().map_err(StoreError)?,
        joined_at: row.get("joined_at"),
        last_read_at: row.get::<Option<DateTime<Utc>>, _>("last_read_at"),
    })
}

fn profile_from_row(row: &MySqlRow) -> Result<ParticipantProfile, StoreError> {
    let role: String = row.get("role");
    Ok(ParticipantProfile {
        user: PublicUser {
            user_id: row.get("user_id"),
            username: row.get("username"),
            display_name: row.get("display_name"),
            avatar_url: row.get("avatar_url"),
            bio: row.get("bio"),
            is_online: row.get("is_online"),
            last_seen: row.get::<Option<DateTime<Utc>>, _>("last_seen"),
        },
        role: role.parse::<ParticipantRole>().map_err(StoreError)?,
        joined_at: row.get("joined_at"),
    })
}

pub struct MySqlParticipantRepo {
    pool: MySqlPool,
}

impl MySqlParticipantRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlParticipantRepo { pool }
    }
}

#[async_trait::async_trait]
impl ParticipantRepo for MySqlParticipantRepo {
    async fn insert_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        user_id: UserId,
        role: ParticipantRole,
        joined_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let tx = downcast(tx);

        sqlx::query(
            r#"
INSERT INTO conversation_participant (conversation_id, user_id, role, joined_at)
VALUES (?, ?, ?, ?)
"#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .bind(role.as_str())
        .bind(joined_at)
        .execute(tx.conn())
        .await
        .map_err(store_err("insert participant"))?;
        Ok(())
    }

    async fn is_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM conversation_participant WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err("membership check"))?;
        Ok(count > 0)
    }

    async fn is_participant_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        let tx = downcast(tx);

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM conversation_participant WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_one(tx.conn())
        .await
        .map_err(store_err("membership check"))?;
        Ok(count > 0)
    }

    async fn get_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<Option<ParticipantRecord>, StoreError> {
        let tx = downcast(tx);

        let row = sqlx::query(
            r#"
SELECT conversation_id, user_id, role, joined_at, last_read_at
FROM conversation_participant
WHERE conversation_id = ? AND user_id = ?
"#,
        )
        .bind(conversation_id)
        .bind(user_id)
        .fetch_optional(tx.conn())
        .await
        .map_err(store_err("query participant"))?;
        row.as_ref().map(participant_from_row).transpose()
    }

    async fn user_ids(&self, conversation_id: ConversationId) -> Result<Vec<UserId>, StoreError> {
        let rows = sqlx::query(
            "SELECT user_id FROM conversation_participant WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err("list participant ids"))?;
        Ok(rows.iter().map(|row| row.get("user_id")).collect())
    }

    async fn user_ids_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
    ) -> Result<Vec<UserId>, StoreError> {
        let tx = downcast(tx);

        let rows = sqlx::query(
            "SELECT user_id FROM conversation_participant WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_all(tx.conn())
        .await
        .map_err(store_err("list participant ids"))?;
        Ok(rows.iter().map(|row| row.get("user_id")).collect())
    }

    async fn list_profiles(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<ParticipantProfile>, StoreError> {
        let rows = sqlx::query(
            r#"
SELECT u.user_id, u.username, u.display_name, u.avatar_url, u.bio, u.is_online, u.last_seen,
       p.role, p.joined_at
FROM conversation_participant p
JOIN user u ON u.user_id = p.user_id
WHERE p.conversation_id = ?
ORDER BY p.joined_at ASC, u.user_id ASC
"#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err("list participant profiles"))?;

        rows.iter().map(profile_from_row).collect()
    }

    async fn remove_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<bool, StoreError> {
        let tx = downcast(tx);

        let result = sqlx::query(
            "DELETE FROM conversation_participant WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(conversation_id)
        .bind(user_id)
        .execute(tx.conn())
        .await
        .map_err(store_err("remove participant"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_role_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        user_id: UserId,
        role: ParticipantRole,
    ) -> Result<(), StoreError> {
        let tx = downcast(tx);

        sqlx::query(
            "UPDATE conversation_participant SET role = ? WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(role.as_str())
        .bind(conversation_id)
        .bind(user_id)
        .execute(tx.conn())
        .await
        .map_err(store_err("update role"))?;
        Ok(())
    }

    async fn oldest_member_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
    ) -> Result<Option<UserId>, StoreError> {
        let tx = downcast(tx);

        let row = sqlx::query(
            r#"
SELECT user_id
FROM conversation_participant
WHERE conversation_id = ?
ORDER BY joined_at ASC, user_id ASC
LIMIT 1
"#,
        )
        .bind(conversation_id)
        .fetch_optional(tx.conn())
        .await
        .map_err(store_err("query oldest member"))?;
        Ok(row.map(|row| row.get("user_id")))
    }

    async fn admin_count_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
    ) -> Result<i64, StoreError> {
        let tx = downcast(tx);

        sqlx::query_scalar(
            "SELECT COUNT(*) FROM conversation_participant WHERE conversation_id = ? AND role = 'ADMIN'",
        )
        .bind(conversation_id)
        .fetch_one(tx.conn())
        .await
        .map_err(store_err("count admins"))
    }

    async fn touch_last_read(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE conversation_participant SET last_read_at = ? WHERE conversation_id = ? AND user_id = ?",
        )
        .bind(now)
        .bind(conversation_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(store_err("touch last read"))?;
        Ok(())
    }

    async fn neighbor_user_ids(&self, user_id: UserId) -> Result<Vec<UserId>, StoreError> {
        let rows = sqlx::query(
            r#"
SELECT DISTINCT o.user_id
FROM conversation_participant p
JOIN conversation_participant o
  ON o.conversation_id = p.conversation_id AND o.user_id <> p.user_id
WHERE p.user_id = ?
"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err("query neighbors"))?;
        Ok(rows.iter().map(|row| row.get("user_id")).collect())
    }
}
