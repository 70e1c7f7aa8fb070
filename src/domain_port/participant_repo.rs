use crate::domain_model::{
    ConversationId, ParticipantProfile, ParticipantRecord, ParticipantRole, UserId,
};
use crate::domain_port::{StorageTx, StoreError};
use chrono::{DateTime, Utc};

#[async_trait::async_trait]
pub trait ParticipantRepo: Send + Sync {
    async fn insert_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        user_id: UserId,
        role: ParticipantRole,
        joined_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn is_participant(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<bool, StoreError>;

    async fn is_participant_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<bool, StoreError>;

    async fn get_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<Option<ParticipantRecord>, StoreError>;

    async fn user_ids(&self, conversation_id: ConversationId) -> Result<Vec<UserId>, StoreError>;

    async fn user_ids_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
    ) -> Result<Vec<UserId>, StoreError>;

    /// Participant rows joined with public user fields, oldest join first.
    async fn list_profiles(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Vec<ParticipantProfile>, StoreError>;

    /// Returns whether a row was actually removed.
    async fn remove_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        user_id: UserId,
    ) -> Result<bool, StoreError>;

    async fn update_role_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        user_id: UserId,
        role: ParticipantRole,
    ) -> Result<(), StoreError>;

    /// Earliest-joined remaining participant (user id tiebreak), for
    /// admin auto-promotion.
    async fn oldest_member_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
    ) -> Result<Option<UserId>, StoreError>;

    async fn admin_count_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
    ) -> Result<i64, StoreError>;

    async fn touch_last_read(
        &self,
        conversation_id: ConversationId,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Distinct other users sharing at least one conversation with `user_id`.
    async fn neighbor_user_ids(&self, user_id: UserId) -> Result<Vec<UserId>, StoreError>;
}
