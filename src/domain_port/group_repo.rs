use crate::domain_model::{ConversationId, GroupId, GroupPatch, GroupRecord};
use crate::domain_port::{StorageTx, StoreError};

#[async_trait::async_trait]
pub trait GroupRepo: Send + Sync {
    async fn insert_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        record: &GroupRecord,
    ) -> Result<(), StoreError>;

    async fn get(&self, group_id: GroupId) -> Result<Option<GroupRecord>, StoreError>;

    async fn get_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        group_id: GroupId,
    ) -> Result<Option<GroupRecord>, StoreError>;

    async fn get_by_conversation(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<GroupRecord>, StoreError>;

    async fn update_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        group_id: GroupId,
        patch: &GroupPatch,
    ) -> Result<(), StoreError>;
}
