//! In-process fakes for exercising the hub and dispatcher without a store.
//! Tokens are user ids in string form; everything store-backed is stubbed.

use crate::domain::*;
use crate::domain_model::*;
use crate::domain_port::ReadTarget;
use crate::server::{RealtimeContext, ServiceRegistry, SessionHub, TypingTracker};
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;

pub fn user(n: u128) -> UserId {
    UserId(uuid::Uuid::from_u128(n))
}

pub fn test_user_id() -> UserId {
    user(1)
}

pub fn token_for(user_id: UserId) -> String {
    user_id.to_string()
}

pub const TEST_TOKEN: &str = "00000000-0000-0000-0000-000000000001";

pub struct FakeAuthService;

#[async_trait::async_trait]
impl AuthService for FakeAuthService {
    async fn register(&self, _input: RegisterInput) -> Result<AuthSession, AuthError> {
        todo!()
    }

    async fn login(&self, _input: LoginInput) -> Result<AuthSession, AuthError> {
        todo!()
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenPair, AuthError> {
        todo!()
    }

    async fn logout(&self, _refresh_token: &str) -> Result<(), AuthError> {
        todo!()
    }

    async fn verify_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        let user_id = UserId::from_str(token).map_err(|_| AuthError::InvalidToken)?;
        Ok(AccessClaims {
            user_id,
            username: format!("user-{user_id}"),
        })
    }
}

pub struct FakeUserService;

#[async_trait::async_trait]
impl UserService for FakeUserService {
    async fn own_profile(&self, _user_id: UserId) -> Result<OwnProfile, UserError> {
        todo!()
    }

    async fn public_profile(&self, _user_id: UserId) -> Result<PublicUser, UserError> {
        todo!()
    }

    async fn update_profile(
        &self,
        _user_id: UserId,
        _patch: ProfilePatch,
    ) -> Result<OwnProfile, UserError> {
        todo!()
    }

    async fn search(&self, _caller: UserId, _query: &str) -> Result<Vec<PublicUser>, UserError> {
        todo!()
    }

    async fn set_online(&self, _user_id: UserId) -> Result<(), UserError> {
        Ok(())
    }

    async fn set_offline(&self, _user_id: UserId) -> Result<DateTime<Utc>, UserError> {
        Ok(Utc::now())
    }

    async fn neighbor_user_ids(&self, _user_id: UserId) -> Result<Vec<UserId>, UserError> {
        Ok(Vec::new())
    }
}

/// Conversation fake with a fixed participant roster shared by every
/// conversation id.
pub struct FakeConversationService {
    pub participants: Vec<UserId>,
    pub read_targets: Vec<ReadTarget>,
}

#[async_trait::async_trait]
impl ConversationService for FakeConversationService {
    async fn get_or_create_direct(
        &self,
        _me: UserId,
        _other: UserId,
    ) -> Result<ConversationSummary, ChatError> {
        todo!()
    }

    async fn list_conversations(&self, _me: UserId) -> Result<Vec<ConversationSummary>, ChatError> {
        todo!()
    }

    async fn get_conversation(
        &self,
        _me: UserId,
        _conversation_id: ConversationId,
    ) -> Result<ConversationSummary, ChatError> {
        todo!()
    }

    async fn get_messages(
        &self,
        _me: UserId,
        _conversation_id: ConversationId,
        _cursor: Option<MessageId>,
        _limit: PageSize,
    ) -> Result<MessagePage, ChatError> {
        todo!()
    }

    async fn send_message(
        &self,
        _sender: UserId,
        _conversation_id: ConversationId,
        _content: String,
        _content_type: Option<String>,
        _reply_to: Option<MessageId>,
    ) -> Result<SentMessage, ChatError> {
        Err(ChatError::Store("no store in tests".into()))
    }

    async fn record_delivered(
        &self,
        _message_id: MessageId,
        _recipient: UserId,
    ) -> Result<(), ChatError> {
        Ok(())
    }

    async fn participant_user_ids(
        &self,
        me: UserId,
        _conversation_id: ConversationId,
    ) -> Result<Vec<UserId>, ChatError> {
        if !self.participants.contains(&me) {
            return Err(ChatError::NotParticipant);
        }
        Ok(self.participants.clone())
    }

    async fn mark_read_up_to(
        &self,
        _reader: UserId,
        _conversation_id: ConversationId,
        _target: MessageId,
    ) -> Result<Vec<ReadTarget>, ChatError> {
        Ok(self.read_targets.clone())
    }
}

pub struct FakeGroupService;

#[async_trait::async_trait]
impl GroupService for FakeGroupService {
    async fn create_group(
        &self,
        _creator: UserId,
        _input: CreateGroupInput,
    ) -> Result<GroupCreation, GroupError> {
        todo!()
    }

    async fn get_group(&self, _me: UserId, _group_id: GroupId) -> Result<GroupDetail, GroupError> {
        todo!()
    }

    async fn update_group(
        &self,
        _me: UserId,
        _group_id: GroupId,
        _patch: GroupPatch,
    ) -> Result<GroupUpdate, GroupError> {
        todo!()
    }

    async fn add_members(
        &self,
        _me: UserId,
        _group_id: GroupId,
        _member_ids: Vec<UserId>,
    ) -> Result<MembershipChange, GroupError> {
        todo!()
    }

    async fn remove_member(
        &self,
        _me: UserId,
        _group_id: GroupId,
        _target: UserId,
    ) -> Result<MemberRemoval, GroupError> {
        todo!()
    }

    async fn update_role(
        &self,
        _me: UserId,
        _group_id: GroupId,
        _target: UserId,
        _role: ParticipantRole,
    ) -> Result<(), GroupError> {
        todo!()
    }
}

pub struct FakeMessageService;

#[async_trait::async_trait]
impl MessageService for FakeMessageService {
    async fn edit_message(
        &self,
        _me: UserId,
        _message_id: MessageId,
        _new_content: String,
    ) -> Result<MessageBroadcast, MessageError> {
        todo!()
    }

    async fn delete_message(
        &self,
        _me: UserId,
        _message_id: MessageId,
    ) -> Result<MessageBroadcast, MessageError> {
        todo!()
    }

    async fn forward_message(
        &self,
        _me: UserId,
        _message_id: MessageId,
        _targets: Vec<ConversationId>,
    ) -> Result<Vec<SentMessage>, MessageError> {
        todo!()
    }

    async fn search(
        &self,
        _me: UserId,
        _query: &str,
        _conversation_id: Option<ConversationId>,
    ) -> Result<Vec<MessageRecord>, MessageError> {
        todo!()
    }

    async fn unread_summary(&self, _me: UserId) -> Result<UnreadSummary, MessageError> {
        todo!()
    }
}

pub struct FakeContactService;

#[async_trait::async_trait]
impl ContactService for FakeContactService {
    async fn add_contact(
        &self,
        _me: UserId,
        _other: UserId,
        _nickname: Option<String>,
    ) -> Result<ContactEntry, ContactError> {
        todo!()
    }

    async fn list_contacts(&self, _me: UserId) -> Result<Vec<ContactEntry>, ContactError> {
        todo!()
    }

    async fn remove_contact(&self, _me: UserId, _other: UserId) -> Result<(), ContactError> {
        todo!()
    }

    async fn block_user(&self, _me: UserId, _other: UserId) -> Result<(), ContactError> {
        todo!()
    }

    async fn unblock_user(&self, _me: UserId, _other: UserId) -> Result<(), ContactError> {
        todo!()
    }

    async fn list_blocks(&self, _me: UserId) -> Result<Vec<PublicUser>, ContactError> {
        todo!()
    }
}

pub struct TestContextBuilder {
    participants: Vec<UserId>,
    read_targets: Vec<ReadTarget>,
}

impl TestContextBuilder {
    pub fn new() -> Self {
        TestContextBuilder {
            participants: vec![test_user_id()],
            read_targets: Vec::new(),
        }
    }

    pub fn participants(mut self, participants: Vec<UserId>) -> Self {
        self.participants = participants;
        self
    }

    #[allow(dead_code)]
    pub fn read_targets(mut self, targets: Vec<ReadTarget>) -> Self {
        self.read_targets = targets;
        self
    }

    pub fn build(self) -> Arc<RealtimeContext> {
        let services = Arc::new(ServiceRegistry {
            auth_service: Arc::new(FakeAuthService),
            user_service: Arc::new(FakeUserService),
            conversation_service: Arc::new(FakeConversationService {
                participants: self.participants,
                read_targets: self.read_targets,
            }),
            group_service: Arc::new(FakeGroupService),
            message_service: Arc::new(FakeMessageService),
            contact_service: Arc::new(FakeContactService),
        });
        Arc::new(RealtimeContext {
            hub: Arc::new(SessionHub::new()),
            services,
            typing: Arc::new(TypingTracker::new()),
        })
    }
}

pub fn test_context() -> Arc<RealtimeContext> {
    TestContextBuilder::new().build()
}
