use super::util::{downcast, is_dup_key, like_pattern, store_err};
use crate::domain_model::{ProfilePatch, UserId, UserRecord};
use crate::domain_port::{NewUser, StorageTx, StoreError, UserRepo};
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};

const USER_COLS: &str =
    "user_id, username, email, password_hash, display_name, avatar_url, bio, is_online, last_seen, created_at";

fn user_from_row(row: &MySqlRow) -> UserRecord {
    UserRecord {
        user_id: row.get("user_id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        display_name: row.get("display_name"),
        avatar_url: row.get("avatar_url"),
        bio: row.get("bio"),
        is_online: row.get("is_online"),
        last_seen: row.get::<Option<DateTime<Utc>>, _>("last_seen"),
        created_at: row.get("created_at"),
    }
}

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn create_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        user: &NewUser,
    ) -> Result<(), StoreError> {
        let tx = downcast(tx);

        sqlx::query(
            r#"
INSERT INTO user (user_id, username, email, password_hash, display_name)
VALUES (?, ?, ?, ?, ?)
"#,
        )
        .bind(user.user_id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.display_name)
        .execute(tx.conn())
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                StoreError("duplicate username or email".into())
            } else {
                store_err("insert user")(e)
            }
        })?;

        Ok(())
    }

    async fn get_by_id(&self, user_id: UserId) -> Result<Option<UserRecord>, StoreError> {
        let query = format!("SELECT {USER_COLS} FROM user WHERE user_id = ?");
        let row = sqlx::query(&query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err("query user by id"))?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let query = format!("SELECT {USER_COLS} FROM user WHERE email = ?");
        let row = sqlx::query(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err("query user by email"))?;
        Ok(row.as_ref().map(user_from_row))
    }

    async fn username_exists(&self, username: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err("count username"))?;
        Ok(count > 0)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM user WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err("count email"))?;
        Ok(count > 0)
    }

    async fn count_existing_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        ids: &[UserId],
    ) -> Result<u64, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let tx = downcast(tx);

        let mut qb = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM user WHERE user_id IN (");
        let mut sep = qb.separated(", ");
        for id in ids {
            sep.push_bind(*id);
        }
        qb.push(")");

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(tx.conn())
            .await
            .map_err(store_err("count users"))?;
        Ok(count as u64)
    }

    async fn display_names_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        ids: &[UserId],
    ) -> Result<Vec<(UserId, String)>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let tx = downcast(tx);

        let mut qb =
            QueryBuilder::<MySql>::new("SELECT user_id, display_name FROM user WHERE user_id IN (");
        let mut sep = qb.separated(", ");
        for id in ids {
            sep.push_bind(*id);
        }
        qb.push(")");

        let rows = qb
            .build()
            .fetch_all(tx.conn())
            .await
            .map_err(store_err("query display names"))?;
        Ok(rows
            .iter()
            .map(|row| (row.get("user_id"), row.get("display_name")))
            .collect())
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        patch: &ProfilePatch,
    ) -> Result<(), StoreError> {
        let mut qb = QueryBuilder::<MySql>::new("UPDATE user SET ");
        let mut sep = qb.separated(", ");
        if let Some(display_name) = &patch.display_name {
            sep.push("display_name = ").push_bind_unseparated(display_name);
        }
        if let Some(avatar_url) = &patch.avatar_url {
            sep.push("avatar_url = ").push_bind_unseparated(avatar_url);
        }
        if let Some(bio) = &patch.bio {
            sep.push("bio = ").push_bind_unseparated(bio);
        }
        qb.push(" WHERE user_id = ").push_bind(user_id);

        qb.build()
            .execute(&self.pool)
            .await
            .map_err(store_err("update profile"))?;
        Ok(())
    }

    async fn search(
        &self,
        query: &str,
        exclude: UserId,
        limit: u16,
    ) -> Result<Vec<UserRecord>, StoreError> {
        let sql = format!(
            r#"
SELECT {USER_COLS}
FROM user
WHERE (LOWER(username) LIKE ? OR LOWER(display_name) LIKE ?)
  AND user_id <> ?
ORDER BY username
LIMIT ?
"#
        );
        let pattern = like_pattern(query);
        let rows = sqlx::query(&sql)
            .bind(&pattern)
            .bind(&pattern)
            .bind(exclude)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err("search users"))?;
        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn set_online(&self, user_id: UserId) -> Result<(), StoreError> {
        sqlx::query("UPDATE user SET is_online = TRUE WHERE user_id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(store_err("set online"))?;
        Ok(())
    }

    async fn set_offline(
        &self,
        user_id: UserId,
        last_seen: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE user SET is_online = FALSE, last_seen = ? WHERE user_id = ?")
            .bind(last_seen)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(store_err("set offline"))?;
        Ok(())
    }
}
