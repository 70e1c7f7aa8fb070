use super::util::{downcast, is_dup_key, store_err};
use crate::domain_model::{PublicUser, UserId};
use crate::domain_port::{BlockRepo, StorageTx, StoreError};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row};

pub struct MySqlBlockRepo {
    pool: MySqlPool,
}

impl MySqlBlockRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlBlockRepo { pool }
    }
}

#[async_trait::async_trait]
impl BlockRepo for MySqlBlockRepo {
    async fn insert(
        &self,
        blocker: UserId,
        blocked: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
INSERT INTO block (blocker_user_id, blocked_user_id, created_at)
VALUES (?, ?, ?)
"#,
        )
        .bind(blocker)
        .bind(blocked)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_dup_key(&e) => Ok(()), // already blocked
            Err(e) => Err(store_err("insert block")(e)),
        }
    }

    async fn delete(&self, blocker: UserId, blocked: UserId) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM block WHERE blocker_user_id = ? AND blocked_user_id = ?")
                .bind(blocker)
                .bind(blocked)
                .execute(&self.pool)
                .await
                .map_err(store_err("delete block"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists_between(&self, a: UserId, b: UserId) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
SELECT COUNT(1)
FROM block
WHERE (blocker_user_id = ? AND blocked_user_id = ?)
   OR (blocker_user_id = ? AND blocked_user_id = ?)
"#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err("block check"))?;
        Ok(count > 0)
    }

    async fn exists_between_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        a: UserId,
        b: UserId,
    ) -> Result<bool, StoreError> {
        let tx = downcast(tx);

        let count: i64 = sqlx::query_scalar(
            r#"
SELECT COUNT(1)
FROM block
WHERE (blocker_user_id = ? AND blocked_user_id = ?)
   OR (blocker_user_id = ? AND blocked_user_id = ?)
"#,
        )
        .bind(a)
        .bind(b)
        .bind(b)
        .bind(a)
        .fetch_one(tx.conn())
        .await
        .map_err(store_err("block check"))?;
        Ok(count > 0)
    }

    async fn list(&self, blocker: UserId) -> Result<Vec<PublicUser>, StoreError> {
        let rows = sqlx::query(
            r#"
SELECT u.user_id, u.username, u.display_name, u.avatar_url, u.bio, u.is_online, u.last_seen
FROM block b
JOIN user u ON u.user_id = b.blocked_user_id
WHERE b.blocker_user_id = ?
ORDER BY u.username ASC
"#,
        )
        .bind(blocker)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err("list blocks"))?;

        Ok(rows
            .iter()
            .map(|row| PublicUser {
                user_id: row.get("user_id"),
                username: row.get("username"),
                display_name: row.get("display_name"),
                avatar_url: row.get("avatar_url"),
                bio: row.get("bio"),
                is_online: row.get("is_online"),
                last_seen: row.get::<Option<DateTime<Utc>>, _>("last_seen"),
            })
            .collect())
    }
}
