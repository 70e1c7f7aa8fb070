use crate::domain_model::{ConversationId, ConversationKind, ConversationRecord, UserId};
use crate::domain_port::{StorageTx, StoreError};
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait ConversationRepo: Send + Sync {
    async fn create_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        kind: ConversationKind,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn get(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<ConversationRecord>, StoreError>;

    async fn get_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
    ) -> Result<Option<ConversationRecord>, StoreError>;

    /// The DIRECT conversation containing BOTH users, if one exists. The
    /// match requires a participant row for each id on the same
    /// conversation, not any row in the pair.
    async fn find_direct_between_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        user_a: UserId,
        user_b: UserId,
    ) -> Result<Option<ConversationId>, StoreError>;

    /// Conversations the user participates in, most recently updated first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<ConversationRecord>, StoreError>;

    async fn touch_updated_at_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}
