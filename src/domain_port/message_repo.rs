use crate::domain_model::{ConversationId, MessageId, MessageRecord, UserId};
use crate::domain_port::{StorageTx, StoreError};
use chrono::{DateTime, Utc};

/// Resolved seek position for cursor pagination: the `(created_at, id)` pair
/// of the cursor row. The comparison is on both columns so the order stays
/// total when timestamps collide.
#[derive(Debug, Clone, Copy)]
pub struct SeekPosition {
    pub created_at: DateTime<Utc>,
    pub message_id: MessageId,
}

/// A message that still needs a READ receipt from a given reader, paired
/// with its sender for the notification.
#[derive(Debug, Clone, Copy)]
pub struct ReadTarget {
    pub message_id: MessageId,
    pub sender_id: UserId,
}

#[async_trait::async_trait]
pub trait MessageRepo: Send + Sync {
    async fn insert_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        record: &MessageRecord,
    ) -> Result<(), StoreError>;

    async fn get(&self, message_id: MessageId) -> Result<Option<MessageRecord>, StoreError>;

    async fn get_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        message_id: MessageId,
    ) -> Result<Option<MessageRecord>, StoreError>;

    /// Up to `limit` non-tombstoned rows, newest first, strictly older than
    /// `before` when given.
    async fn list_page_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        conversation_id: ConversationId,
        before: Option<SeekPosition>,
        limit: u16,
    ) -> Result<Vec<MessageRecord>, StoreError>;

    /// Most recent non-tombstoned message, if any.
    async fn last_message(
        &self,
        conversation_id: ConversationId,
    ) -> Result<Option<MessageRecord>, StoreError>;

    /// Per-conversation counts of messages from others newer than the
    /// requester's `last_read_at` (all such when null). Conversations with
    /// zero unread are omitted.
    async fn unread_counts(
        &self,
        user_id: UserId,
    ) -> Result<Vec<(ConversationId, i64)>, StoreError>;

    /// Messages in the conversation at or before `up_to`, sent by others,
    /// with no READ receipt from `reader` yet. Ascending `created_at`.
    async fn list_read_targets(
        &self,
        conversation_id: ConversationId,
        reader: UserId,
        up_to: DateTime<Utc>,
    ) -> Result<Vec<ReadTarget>, StoreError>;

    async fn set_edited(
        &self,
        message_id: MessageId,
        content: &str,
        edited_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Tombstone: sets `deleted_at` and overwrites content with the fixed
    /// placeholder.
    async fn tombstone(
        &self,
        message_id: MessageId,
        deleted_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Case-insensitive substring search over conversations the requester
    /// participates in, excluding tombstones, newest first.
    async fn search(
        &self,
        user_id: UserId,
        query: &str,
        conversation_id: Option<ConversationId>,
        limit: u16,
    ) -> Result<Vec<MessageRecord>, StoreError>;
}
