use super::util::{downcast, store_err};
use crate::domain_model::{ConversationId, GroupId, GroupPatch, GroupRecord};
use crate::domain_port::{GroupRepo, StorageTx, StoreError};
use sqlx::mysql::MySqlRow;
use sqlx::{MySql, MySqlPool, QueryBuilder, Row};

const GROUP_COLS: &str =
    "group_id, conversation_id, name, description, icon_url, created_by, created_at";

fn group_from_row(row: &MySqlRow) -> GroupRecord {
    GroupRecord {
        group_id: row.get("group_id"),
        conversation_id: row.get("conversation_id"),
        name: row.get("name"),
        description: row.get("description"),
        icon_url: row.get("icon_url"),
        created_by: row.get("created_by"),
        created_at: row.get("created_at"),
    }
}

pub struct MySqlGroupRepo {
    pool: MySqlPool,
}

impl MySqlGroupRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlGroupRepo { pool }
    }
}

#[async_trait::async_trait]
impl GroupRepo for MySqlGroupRepo {
    async fn insert_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        record: &GroupRecord,
    ) -> Result<(), StoreError> {
        let tx = downcast(tx);

        sqlx::query(
            r#"
INSERT INTO chat_group (group_id, conversation_id, name, description, icon_url, created_by, created_at)
VALUES (?, ?, ?, ?, ?, ?, ?)
"#,
        )
        .bind(record.group_id)
        .bind(record.conversation_id)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.icon_url)
        .bind(record.created_by)
        .bind(record.created_at)
        .execute(tx.conn())
        .await
        .map_err(store_err("insert group"))?;
        Ok(())
    }

    async fn get(&self, group_id: GroupId) -> Result<Option<GroupRecord>, StoreError> {
        let query = format!("SELECT {GROUP_COLS} FROM chat_group WHERE group_id = ?");
        let row = sqlx::query(&query)
            .bind(group_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err("query group"))?;
        Ok(row.as_ref().map(group_from_row))
    }

    async fn get_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        group_id: GroupId,
    ) -> Result<Option<GroupRecord>, StoreError> {
        let tx = downcast(tx);

        let query = format!("SELECT {GROUP_COLS} FROM chat_group WHERE group_id = ?");
        let row = sqlx::query(&query)
            .bind(group_id)
            .fetch_optional(tx.conn())
            .await
            .map_err(store_err("query group"))?;
        Ok(row.as_ref().map(group_from_row))
    }

    async fn get_by_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<GroupRecord>, StoreError> {
        let query = format!("SELECT {GROUP_COLS} FROM chat_group WHERE conversation_id = ?");
        let row = sqlx::query(&query)
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err("query group by conversation"))?;
        Ok(row.as_ref().map(group_from_row))
    }

    async fn update_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        group_id: GroupId,
        patch: &GroupPatch,
    ) -> Result<(), StoreError> {
        let tx = downcast(tx);

        let mut qb = QueryBuilder::<MySql>::new("UPDATE chat_group SET ");
        let mut sep = qb.separated(", ");
        if let Some(name) = &patch.name {
            sep.push("name = ").push_bind_unseparated(name.trim());
        }
        if let Some(description) = &patch.description {
            sep.push("description = ").push_bind_unseparated(description);
        }
        if let Some(icon_url) = &patch.icon_url {
            sep.push("icon_url = ").push_bind_unseparated(icon_url);
        }
        qb.push(" WHERE group_id = ").push_bind(group_id);

        qb.build()
            .execute(tx.conn())
            .await
            .map_err(store_err("update group"))?;
        Ok(())
    }
}
