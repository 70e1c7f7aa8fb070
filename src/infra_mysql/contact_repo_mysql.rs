use super::util::{is_dup_key, store_err};
use crate::domain_model::{ContactEntry, PublicUser, UserId};
use crate::domain_port::{ContactInsert, ContactRepo, StoreError};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row};

pub struct MySqlContactRepo {
    pool: MySqlPool,
}

impl MySqlContactRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlContactRepo { pool }
    }
}

#[async_trait::async_trait]
impl ContactRepo for MySqlContactRepo {
    async fn insert(
        &self,
        owner: UserId,
        contact: UserId,
        nickname: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ContactInsert, StoreError> {
        let result = sqlx::query(
            r#"
INSERT INTO contact (owner_user_id, contact_user_id, nickname, created_at)
VALUES (?, ?, ?, ?)
"#,
        )
        .bind(owner)
        .bind(contact)
        .bind(nickname)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(ContactInsert::Inserted),
            Err(e) if is_dup_key(&e) => Ok(ContactInsert::Duplicate),
            Err(e) => Err(store_err("insert contact")(e)),
        }
    }

    async fn list(&self, owner: UserId) -> Result<Vec<ContactEntry>, StoreError> {
        let rows = sqlx::query(
            r#"
SELECT u.user_id, u.username, u.display_name, u.avatar_url, u.bio, u.is_online, u.last_seen,
       c.nickname, c.created_at
FROM contact c
JOIN user u ON u.user_id = c.contact_user_id
WHERE c.owner_user_id = ?
ORDER BY u.display_name ASC
"#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err("list contacts"))?;

        Ok(rows
            .iter()
            .map(|row| ContactEntry {
                user: PublicUser {
                    user_id: row.get("user_id"),
                    username: row.get("username"),
                    display_name: row.get("display_name"),
                    avatar_url: row.get("avatar_url"),
                    bio: row.get("bio"),
                    is_online: row.get("is_online"),
                    last_seen: row.get::<Option<DateTime<Utc>>, _>("last_seen"),
                },
                nickname: row.get("nickname"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn delete(&self, owner: UserId, contact: UserId) -> Result<bool, StoreError> {
        let result =
            sqlx::query("DELETE FROM contact WHERE owner_user_id = ? AND contact_user_id = ?")
                .bind(owner)
                .bind(contact)
                .execute(&self.pool)
                .await
                .map_err(store_err("delete contact"))?;
        Ok(result.rows_affected() > 0)
    }
}
