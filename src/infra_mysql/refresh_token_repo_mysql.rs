use super::util::{downcast, store_err};
use crate::domain_port::{RefreshTokenRecord, RefreshTokenRepo, StorageTx, StoreError};
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row};

pub struct MySqlRefreshTokenRepo {
    pool: MySqlPool,
}

impl MySqlRefreshTokenRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlRefreshTokenRepo { pool }
    }
}

#[async_trait::async_trait]
impl RefreshTokenRepo for MySqlRefreshTokenRepo {
    async fn insert_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        record: &RefreshTokenRecord,
    ) -> Result<(), StoreError> {
        let tx = downcast(tx);

        sqlx::query(
            r#"
INSERT INTO refresh_token (token_hash, user_id, expires_at)
VALUES (?, ?, ?)
"#,
        )
        .bind(&record.token_hash)
        .bind(record.user_id)
        .bind(record.expires_at)
        .execute(tx.conn())
        .await
        .map_err(store_err("insert refresh token"))?;
        Ok(())
    }

    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), StoreError> {
        sqlx::query(
            r#"
INSERT INTO refresh_token (token_hash, user_id, expires_at)
VALUES (?, ?, ?)
"#,
        )
        .bind(&record.token_hash)
        .bind(record.user_id)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(store_err("insert refresh token"))?;
        Ok(())
    }

    async fn find_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        token_hash: &str,
    ) -> Result<Option<RefreshTokenRecord>, StoreError> {
        let tx = downcast(tx);

        // FOR UPDATE: concurrent rotations of the same token serialize here,
        // so exactly one presenter wins.
        let row = sqlx::query(
            r#"
SELECT token_hash, user_id, expires_at
FROM refresh_token
WHERE token_hash = ?
FOR UPDATE
"#,
        )
        .bind(token_hash)
        .fetch_optional(tx.conn())
        .await
        .map_err(store_err("query refresh token"))?;

        Ok(row.map(|row| RefreshTokenRecord {
            token_hash: row.get("token_hash"),
            user_id: row.get("user_id"),
            expires_at: row.get::<DateTime<Utc>, _>("expires_at"),
        }))
    }

    async fn delete_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        token_hash: &str,
    ) -> Result<bool, StoreError> {
        let tx = downcast(tx);

        let result = sqlx::query("DELETE FROM refresh_token WHERE token_hash = ?")
            .bind(token_hash)
            .execute(tx.conn())
            .await
            .map_err(store_err("delete refresh token"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, token_hash: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM refresh_token WHERE token_hash = ?")
            .bind(token_hash)
            .execute(&self.pool)
            .await
            .map_err(store_err("delete refresh token"))?;
        Ok(result.rows_affected() > 0)
    }
}
