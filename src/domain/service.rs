use crate::domain_model::*;
use crate::domain_port::{ReadTarget, StoreError};
use chrono::{DateTime, Utc};
use serde::Serialize;

// region auth service

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("{0}")]
    Validation(String),
    #[error("Invalid or expired access token")]
    InvalidToken,
    #[error("Invalid or expired refresh token")]
    InvalidRefresh,
    #[error("User not found")]
    UserNotFound,
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::Store(e.0)
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: OwnProfile,
    pub tokens: TokenPair,
}

/// What a verified access token asserts.
#[derive(Debug, Clone)]
pub struct AccessClaims {
    pub user_id: UserId,
    pub username: String,
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, input: RegisterInput) -> Result<AuthSession, AuthError>;
    async fn login(&self, input: LoginInput) -> Result<AuthSession, AuthError>;
    /// Single-use rotation: the presented refresh token is consumed and a
    /// fresh pair issued atomically. Replays fail with `InvalidRefresh`.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError>;
    async fn logout(&self, refresh_token: &str) -> Result<(), AuthError>;
    async fn verify_access(&self, token: &str) -> Result<AccessClaims, AuthError>;
}

// endregion

// region user service

#[derive(Debug, thiserror::Error)]
pub enum UserError {
    #[error("User not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for UserError {
    fn from(e: StoreError) -> Self {
        UserError::Store(e.0)
    }
}

#[async_trait::async_trait]
pub trait UserService: Send + Sync {
    async fn own_profile(&self, user_id: UserId) -> Result<OwnProfile, UserError>;
    async fn public_profile(&self, user_id: UserId) -> Result<PublicUser, UserError>;
    async fn update_profile(
        &self,
        user_id: UserId,
        patch: ProfilePatch,
    ) -> Result<OwnProfile, UserError>;
    async fn search(&self, caller: UserId, query: &str) -> Result<Vec<PublicUser>, UserError>;
    async fn set_online(&self, user_id: UserId) -> Result<(), UserError>;
    /// Marks the user offline and returns the recorded `last_seen`.
    async fn set_offline(&self, user_id: UserId) -> Result<DateTime<Utc>, UserError>;
    /// Everyone sharing at least one conversation with the user, for
    /// presence fanout. Deduplicated, excluding the user.
    async fn neighbor_user_ids(&self, user_id: UserId) -> Result<Vec<UserId>, UserError>;
}

// endregion

// region conversation service

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),
    #[error("Not a participant")]
    NotParticipant,
    #[error("Conversation unavailable")]
    Blocked,
    #[error("Conversation not found")]
    ConversationNotFound,
    #[error("Message not found")]
    MessageNotFound,
    #[error("User not found")]
    UserNotFound,
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for ChatError {
    fn from(e: StoreError) -> Self {
        ChatError::Store(e.0)
    }
}

/// A persisted message plus everything fanout needs.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub record: MessageRecord,
    pub sender_name: String,
    /// Participants other than the sender.
    pub recipients: Vec<UserId>,
    pub reply_preview: Option<ReplyPreview>,
}

#[async_trait::async_trait]
pub trait ConversationService: Send + Sync {
    /// Deterministic get-or-create of the DIRECT conversation between two
    /// distinct users. Both argument orders resolve to the same id.
    async fn get_or_create_direct(
        &self,
        me: UserId,
        other: UserId,
    ) -> Result<ConversationSummary, ChatError>;

    async fn list_conversations(&self, me: UserId)
    -> Result<Vec<ConversationSummary>, ChatError>;

    async fn get_conversation(
        &self,
        me: UserId,
        conversation_id: ConversationId,
    ) -> Result<ConversationSummary, ChatError>;

    async fn get_messages(
        &self,
        me: UserId,
        conversation_id: ConversationId,
        cursor: Option<MessageId>,
        limit: PageSize,
    ) -> Result<MessagePage, ChatError>;

    /// Persist a message and bump the conversation clock, in one
    /// transaction. Membership, block, and reply-target checks run first.
    async fn send_message(
        &self,
        sender: UserId,
        conversation_id: ConversationId,
        content: String,
        content_type: Option<String>,
        reply_to: Option<MessageId>,
    ) -> Result<SentMessage, ChatError>;

    /// Best-effort DELIVERED upsert after a successful socket write. Never
    /// downgrades READ.
    async fn record_delivered(
        &self,
        message_id: MessageId,
        recipient: UserId,
    ) -> Result<(), ChatError>;

    /// Participant ids of a conversation, gated on the requester being one
    /// of them.
    async fn participant_user_ids(
        &self,
        me: UserId,
        conversation_id: ConversationId,
    ) -> Result<Vec<UserId>, ChatError>;

    /// Bulk-mark READ up to the target message; returns the messages newly
    /// marked (ascending `created_at`) so their senders can be notified.
    /// A missing or foreign target returns an empty list.
    async fn mark_read_up_to(
        &self,
        reader: UserId,
        conversation_id: ConversationId,
        target: MessageId,
    ) -> Result<Vec<ReadTarget>, ChatError>;
}

// endregion

// region group service

#[derive(Debug, thiserror::Error)]
pub enum GroupError {
    #[error("{0}")]
    Validation(String),
    #[error("Not a member")]
    NotMember,
    #[error("Admin privileges required")]
    NotAdmin,
    #[error("Group not found")]
    NotFound,
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for GroupError {
    fn from(e: StoreError) -> Self {
        GroupError::Store(e.0)
    }
}

#[derive(Debug, Clone)]
pub struct CreateGroupInput {
    pub name: String,
    pub description: Option<String>,
    pub member_ids: Vec<UserId>,
}

#[derive(Debug)]
pub struct GroupCreation {
    pub detail: GroupDetail,
    pub system_message: SentMessage,
}

#[derive(Debug)]
pub struct GroupUpdate {
    pub group: GroupRecord,
    /// Present when the change produced an in-conversation event (rename).
    pub system_message: Option<SentMessage>,
}

#[derive(Debug)]
pub struct MembershipChange {
    pub added: Vec<PublicUser>,
    pub system_message: SentMessage,
}

#[derive(Debug)]
pub struct MemberRemoval {
    pub removed: UserId,
    /// Set when the departure of an admin auto-promoted the oldest member.
    pub promoted_admin: Option<UserId>,
    pub system_message: SentMessage,
}

#[async_trait::async_trait]
pub trait GroupService: Send + Sync {
    async fn create_group(
        &self,
        creator: UserId,
        input: CreateGroupInput,
    ) -> Result<GroupCreation, GroupError>;

    async fn get_group(&self, me: UserId, group_id: GroupId) -> Result<GroupDetail, GroupError>;

    async fn update_group(
        &self,
        me: UserId,
        group_id: GroupId,
        patch: GroupPatch,
    ) -> Result<GroupUpdate, GroupError>;

    async fn add_members(
        &self,
        me: UserId,
        group_id: GroupId,
        member_ids: Vec<UserId>,
    ) -> Result<MembershipChange, GroupError>;

    /// Admin removes anyone; a member removes only themselves (leave).
    async fn remove_member(
        &self,
        me: UserId,
        group_id: GroupId,
        target: UserId,
    ) -> Result<MemberRemoval, GroupError>;

    async fn update_role(
        &self,
        me: UserId,
        group_id: GroupId,
        target: UserId,
        role: ParticipantRole,
    ) -> Result<(), GroupError>;
}

// endregion

// region message service

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Message not found")]
    NotFound,
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for MessageError {
    fn from(e: StoreError) -> Self {
        MessageError::Store(e.0)
    }
}

/// An edit or delete plus the participant set that must hear about it.
#[derive(Debug)]
pub struct MessageBroadcast {
    pub record: MessageRecord,
    pub participant_ids: Vec<UserId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadEntry {
    pub conversation_id: ConversationId,
    pub unread_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadSummary {
    pub conversations: Vec<UnreadEntry>,
    pub total: i64,
}

#[async_trait::async_trait]
pub trait MessageService: Send + Sync {
    /// Sender-only, TEXT-only, within 15 minutes of creation.
    async fn edit_message(
        &self,
        me: UserId,
        message_id: MessageId,
        new_content: String,
    ) -> Result<MessageBroadcast, MessageError>;

    /// Sender-only tombstone within 1 hour of creation.
    async fn delete_message(
        &self,
        me: UserId,
        message_id: MessageId,
    ) -> Result<MessageBroadcast, MessageError>;

    /// Duplicate the message into every target conversation the caller
    /// participates in; skipped targets are dropped silently.
    async fn forward_message(
        &self,
        me: UserId,
        message_id: MessageId,
        targets: Vec<ConversationId>,
    ) -> Result<Vec<SentMessage>, MessageError>;

    async fn search(
        &self,
        me: UserId,
        query: &str,
        conversation_id: Option<ConversationId>,
    ) -> Result<Vec<MessageRecord>, MessageError>;

    async fn unread_summary(&self, me: UserId) -> Result<UnreadSummary, MessageError>;
}

// endregion

// region contact service

#[derive(Debug, thiserror::Error)]
pub enum ContactError {
    #[error("{0}")]
    Validation(String),
    #[error("User not found")]
    NotFound,
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for ContactError {
    fn from(e: StoreError) -> Self {
        ContactError::Store(e.0)
    }
}

#[async_trait::async_trait]
pub trait ContactService: Send + Sync {
    async fn add_contact(
        &self,
        me: UserId,
        other: UserId,
        nickname: Option<String>,
    ) -> Result<ContactEntry, ContactError>;
    async fn list_contacts(&self, me: UserId) -> Result<Vec<ContactEntry>, ContactError>;
    async fn remove_contact(&self, me: UserId, other: UserId) -> Result<(), ContactError>;
    async fn block_user(&self, me: UserId, other: UserId) -> Result<(), ContactError>;
    async fn unblock_user(&self, me: UserId, other: UserId) -> Result<(), ContactError>;
    async fn list_blocks(&self, me: UserId) -> Result<Vec<PublicUser>, ContactError>;
}

// endregion
