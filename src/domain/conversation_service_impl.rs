use crate::domain::{ChatError, ConversationService, SentMessage};
use crate::domain_model::*;
use crate::domain_port::{
    BlockRepo, ConversationRepo, GroupRepo, MessageRepo, ParticipantRepo, ReadTarget, ReceiptRepo,
    SeekPosition, StorageTx, TxManager, UserRepo,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

pub struct RealConversationService {
    user_repo: Arc<dyn UserRepo>,
    conversation_repo: Arc<dyn ConversationRepo>,
    participant_repo: Arc<dyn ParticipantRepo>,
    message_repo: Arc<dyn MessageRepo>,
    receipt_repo: Arc<dyn ReceiptRepo>,
    group_repo: Arc<dyn GroupRepo>,
    block_repo: Arc<dyn BlockRepo>,
    tx_manager: Arc<dyn TxManager>,
}

impl RealConversationService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        conversation_repo: Arc<dyn ConversationRepo>,
        participant_repo: Arc<dyn ParticipantRepo>,
        message_repo: Arc<dyn MessageRepo>,
        receipt_repo: Arc<dyn ReceiptRepo>,
        group_repo: Arc<dyn GroupRepo>,
        block_repo: Arc<dyn BlockRepo>,
        tx_manager: Arc<dyn TxManager>,
    ) -> Self {
        Self {
            user_repo,
            conversation_repo,
            participant_repo,
            message_repo,
            receipt_repo,
            group_repo,
            block_repo,
            tx_manager,
        }
    }

    /// Hydrate one conversation for a listing: participants, last message,
    /// group row for GROUP kind, and the requester's unread count.
    async fn summarize(
        &self,
        conversation: ConversationRecord,
        unread_count: i64,
    ) -> Result<ConversationSummary, ChatError> {
        let participants = self
            .participant_repo
            .list_profiles(conversation.conversation_id)
            .await?;
        let last_message = self
            .message_repo
            .last_message(conversation.conversation_id)
            .await?;
        let group = match conversation.kind {
            ConversationKind::Group => {
                self.group_repo
                    .get_by_conversation(conversation.conversation_id)
                    .await?
            }
            ConversationKind::Direct => None,
        };

        Ok(ConversationSummary {
            conversation,
            group,
            last_message,
            participants,
            unread_count,
        })
    }

    async fn unread_map(&self, me: UserId) -> Result<HashMap<ConversationId, i64>, ChatError> {
        Ok(self.message_repo.unread_counts(me).await?.into_iter().collect())
    }

    /// DIRECT sends are refused while a block exists in either direction.
    async fn check_direct_block_in_tx<'t>(
        &self,
        tx: &mut dyn StorageTx<'t>,
        sender: UserId,
        participants: &[UserId],
    ) -> Result<(), ChatError> {
        for &other in participants.iter().filter(|&&u| u != sender) {
            if self.block_repo.exists_between_in_tx(tx, sender, other).await? {
                return Err(ChatError::Blocked);
            }
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ConversationService for RealConversationService {
    async fn get_or_create_direct(
        &self,
        me: UserId,
        other: UserId,
    ) -> Result<ConversationSummary, ChatError> {
        if me == other {
            return Err(ChatError::Validation(
                "Cannot start a conversation with yourself".into(),
            ));
        }
        if self.block_repo.exists_between(me, other).await? {
            return Err(ChatError::Blocked);
        }

        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| ChatError::Store(e.to_string()))?;

        let conversation_id = match self
            .conversation_repo
            .find_direct_between_in_tx(&mut *tx, me, other)
            .await?
        {
            Some(existing) => {
                tx.commit()
                    .await
                    .map_err(|e| ChatError::Store(e.to_string()))?;
                existing
            }
            None => {
                if self
                    .user_repo
                    .count_existing_in_tx(&mut *tx, &[other])
                    .await?
                    == 0
                {
                    return Err(ChatError::UserNotFound);
                }

                let conversation_id = ConversationId::new();
                let now = Utc::now();
                self.conversation_repo
                    .create_in_tx(&mut *tx, conversation_id, ConversationKind::Direct, now)
                    .await?;
                self.participant_repo
                    .insert_in_tx(&mut *tx, conversation_id, me, ParticipantRole::Member, now)
                    .await?;
                self.participant_repo
                    .insert_in_tx(&mut *tx, conversation_id, other, ParticipantRole::Member, now)
                    .await?;
                tx.commit()
                    .await
                    .map_err(|e| ChatError::Store(e.to_string()))?;
                conversation_id
            }
        };

        let conversation = self
            .conversation_repo
            .get(conversation_id)
            .await?
            .ok_or(ChatError::ConversationNotFound)?;
        let unread = self.unread_map(me).await?;
        self.summarize(
            conversation,
            unread.get(&conversation_id).copied().unwrap_or(0),
        )
        .await
    }

    async fn list_conversations(
        &self,
        me: UserId,
    ) -> Result<Vec<ConversationSummary>, ChatError> {
        let conversations = self.conversation_repo.list_for_user(me).await?;
        let unread = self.unread_map(me).await?;

        let mut summaries = Vec::with_capacity(conversations.len());
        for conversation in conversations {
            let count = unread
                .get(&conversation.conversation_id)
                .copied()
                .unwrap_or(0);
            summaries.push(self.summarize(conversation, count).await?);
        }
        Ok(summaries)
    }

    async fn get_conversation(
        &self,
        me: UserId,
        conversation_id: ConversationId,
    ) -> Result<ConversationSummary, ChatError> {
        let conversation = self
            .conversation_repo
            .get(conversation_id)
            .await?
            .ok_or(ChatError::ConversationNotFound)?;
        if !self.participant_repo.is_participant(conversation_id, me).await? {
            return Err(ChatError::NotParticipant);
        }
        let unread = self.unread_map(me).await?;
        self.summarize(
            conversation,
            unread.get(&conversation_id).copied().unwrap_or(0),
        )
        .await
    }

    async fn get_messages(
        &self,
        me: UserId,
        conversation_id: ConversationId,
        cursor: Option<MessageId>,
        limit: PageSize,
    ) -> Result<MessagePage, ChatError> {
        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| ChatError::Store(e.to_string()))?;

        if !self
            .participant_repo
            .is_participant_in_tx(&mut *tx, conversation_id, me)
            .await?
        {
            return Err(ChatError::NotParticipant);
        }

        // The cursor id is resolved to its (created_at, id) pair so the seek
        // is on the same total order the page query sorts by. A cursor that
        // no longer exists or belongs elsewhere yields an empty page.
        let before = match cursor {
            None => None,
            Some(cursor_id) => match self.message_repo.get_in_tx(&mut *tx, cursor_id).await? {
                Some(row) if row.conversation_id == conversation_id => Some(SeekPosition {
                    created_at: row.created_at,
                    message_id: row.message_id,
                }),
                _ => {
                    tx.commit()
                        .await
                        .map_err(|e| ChatError::Store(e.to_string()))?;
                    return Ok(MessagePage {
                        messages: Vec::new(),
                        has_more: false,
                        next_cursor: None,
                    });
                }
            },
        };

        let limit = limit.clamped();
        let rows = self
            .message_repo
            .list_page_in_tx(&mut *tx, conversation_id, before, limit + 1)
            .await?;
        tx.commit()
            .await
            .map_err(|e| ChatError::Store(e.to_string()))?;

        Ok(assemble_page(rows, limit as usize))
    }

    async fn send_message(
        &self,
        sender: UserId,
        conversation_id: ConversationId,
        content: String,
        content_type: Option<String>,
        reply_to: Option<MessageId>,
    ) -> Result<SentMessage, ChatError> {
        if content.trim().is_empty() {
            return Err(ChatError::Validation("Message content is empty".into()));
        }
        let content_type = ContentType::from_client(content_type.as_deref())
            .ok_or_else(|| ChatError::Validation("Unknown content type".into()))?;

        let mut tx = self
            .tx_manager
            .begin()
            .await
            .map_err(|e| ChatError::Store(e.to_string()))?;

        if !self
            .participant_repo
            .is_participant_in_tx(&mut *tx, conversation_id, sender)
            .await?
        {
            return Err(ChatError::NotParticipant);
        }

        let conversation = self
            .conversation_repo
            .get_in_tx(&mut *tx, conversation_id)
            .await?
            .ok_or(ChatError::ConversationNotFound)?;

        let participant_ids = self
            .participant_repo
            .user_ids_in_tx(&mut *tx, conversation_id)
            .await?;

        if conversation.kind == ConversationKind::Direct {
            self.check_direct_block_in_tx(&mut *tx, sender, &participant_ids)
                .await?;
        }

        // A reply must quote a message of the same conversation.
        let reply_preview = match reply_to {
            None => None,
            Some(reply_id) => {
                let target = self
                    .message_repo
                    .get_in_tx(&mut *tx, reply_id)
                    .await?
                    .filter(|m| m.conversation_id == conversation_id)
                    .ok_or(ChatError::MessageNotFound)?;
                Some(ReplyPreview {
                    message_id: target.message_id,
                    sender_id: target.sender_id,
                    content: target.content,
                })
            }
        };

        let now = Utc::now();
        let record = MessageRecord {
            message_id: MessageId::new(),
            conversation_id,
            sender_id: sender,
            content,
            content_type,
            reply_to_id: reply_preview.as_ref().map(|p| p.message_id),
            created_at: now,
            edited_at: None,
            deleted_at: None,
        };
        self.message_repo.insert_in_tx(&mut *tx, &record).await?;
        self.conversation_repo
            .touch_updated_at_in_tx(&mut *tx, conversation_id, now)
            .await?;

        let sender_name = self
            .user_repo
            .display_names_in_tx(&mut *tx, &[sender])
            .await?
            .into_iter()
            .map(|(_, name)| name)
            .next()
            .unwrap_or_default();

        tx.commit()
            .await
            .map_err(|e| ChatError::Store(e.to_string()))?;

        let recipients = participant_ids.into_iter().filter(|&u| u != sender).collect();
        Ok(SentMessage {
            record,
            sender_name,
            recipients,
            reply_preview,
        })
    }

    async fn record_delivered(
        &self,
        message_id: MessageId,
        recipient: UserId,
    ) -> Result<(), ChatError> {
        self.receipt_repo
            .upsert_delivered(message_id, recipient, Utc::now())
            .await?;
        Ok(())
    }

    async fn participant_user_ids(
        &self,
        me: UserId,
        conversation_id: ConversationId,
    ) -> Result<Vec<UserId>, ChatError> {
        let ids = self.participant_repo.user_ids(conversation_id).await?;
        if !ids.contains(&me) {
            return Err(ChatError::NotParticipant);
        }
        Ok(ids)
    }

    async fn mark_read_up_to(
        &self,
        reader: UserId,
        conversation_id: ConversationId,
        target: MessageId,
    ) -> Result<Vec<ReadTarget>, ChatError> {
        if !self
            .participant_repo
            .is_participant(conversation_id, reader)
            .await?
        {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        self.participant_repo
            .touch_last_read(conversation_id, reader, now)
            .await?;

        // Missing or foreign target: the read cursor still moved, nothing
        // else to do.
        let target = match self.message_repo.get(target).await? {
            Some(m) if m.conversation_id == conversation_id => m,
            _ => return Ok(Vec::new()),
        };

        let targets = self
            .message_repo
            .list_read_targets(conversation_id, reader, target.created_at)
            .await?;
        for t in &targets {
            self.receipt_repo
                .upsert_read(t.message_id, reader, now)
                .await?;
        }
        Ok(targets)
    }
}
