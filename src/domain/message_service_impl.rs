use crate::domain::{
    ChatError, ConversationService, MessageBroadcast, MessageError, MessageService, SentMessage,
    UnreadEntry, UnreadSummary,
};
use crate::domain_model::*;
use crate::domain_port::{MessageRepo, ParticipantRepo};
use chrono::Utc;
use std::sync::Arc;

const SEARCH_RESULT_CAP: u16 = 50;

pub struct RealMessageService {
    message_repo: Arc<dyn MessageRepo>,
    participant_repo: Arc<dyn ParticipantRepo>,
    conversation_service: Arc<dyn ConversationService>,
}

impl RealMessageService {
    pub fn new(
        message_repo: Arc<dyn MessageRepo>,
        participant_repo: Arc<dyn ParticipantRepo>,
        conversation_service: Arc<dyn ConversationService>,
    ) -> Self {
        Self {
            message_repo,
            participant_repo,
            conversation_service,
        }
    }

    /// A live (non-tombstoned) message, or NotFound.
    async fn live_message(&self, message_id: MessageId) -> Result<MessageRecord, MessageError> {
        self.message_repo
            .get(message_id)
            .await?
            .filter(|m| !m.is_tombstoned())
            .ok_or(MessageError::NotFound)
    }
}

#[async_trait::async_trait]
impl MessageService for RealMessageService {
    async fn edit_message(
        &self,
        me: UserId,
        message_id: MessageId,
        new_content: String,
    ) -> Result<MessageBroadcast, MessageError> {
        if new_content.trim().is_empty() {
            return Err(MessageError::Validation("Message content is empty".into()));
        }

        let mut record = self.live_message(message_id).await?;
        if record.sender_id != me {
            return Err(MessageError::Forbidden(
                "Only the sender can edit a message".into(),
            ));
        }
        if record.content_type != ContentType::Text {
            return Err(MessageError::Validation(
                "Only text messages can be edited".into(),
            ));
        }
        let now = Utc::now();
        if !record.within_edit_window(now) {
            return Err(MessageError::Validation(
                "Messages can only be edited within 15 minutes".into(),
            ));
        }

        self.message_repo
            .set_edited(message_id, &new_content, now)
            .await?;
        record.content = new_content;
        record.edited_at = Some(now);

        let participant_ids = self
            .participant_repo
            .user_ids(record.conversation_id)
            .await?;
        Ok(MessageBroadcast {
            record,
            participant_ids,
        })
    }

    async fn delete_message(
        &self,
        me: UserId,
        message_id: MessageId,
    ) -> Result<MessageBroadcast, MessageError> {
        let mut record = self.live_message(message_id).await?;
        if record.sender_id != me {
            return Err(MessageError::Forbidden(
                "Only the sender can delete a message".into(),
            ));
        }
        let now = Utc::now();
        if !record.within_delete_window(now) {
            return Err(MessageError::Validation(
                "Messages can only be deleted within 1 hour".into(),
            ));
        }

        self.message_repo.tombstone(message_id, now).await?;
        record.content = DELETED_PLACEHOLDER.to_owned();
        record.deleted_at = Some(now);

        let participant_ids = self
            .participant_repo
            .user_ids(record.conversation_id)
            .await?;
        Ok(MessageBroadcast {
            record,
            participant_ids,
        })
    }

    async fn forward_message(
        &self,
        me: UserId,
        message_id: MessageId,
        targets: Vec<ConversationId>,
    ) -> Result<Vec<SentMessage>, MessageError> {
        let source = self.live_message(message_id).await?;
        if !self
            .participant_repo
            .is_participant(source.conversation_id, me)
            .await?
        {
            return Err(MessageError::Forbidden("Not a participant".into()));
        }

        let mut forwarded = Vec::new();
        for target in targets {
            // Each target re-runs the full send path: membership and block
            // gates, its own transaction, its own timestamps.
            match self
                .conversation_service
                .send_message(
                    me,
                    target,
                    source.content.clone(),
                    Some(source.content_type.as_str().to_owned()),
                    None,
                )
                .await
            {
                Ok(sent) => forwarded.push(sent),
                Err(ChatError::NotParticipant)
                | Err(ChatError::Blocked)
                | Err(ChatError::ConversationNotFound) => {
                    tracing::debug!(%target, "forward target skipped");
                }
                Err(ChatError::Validation(reason)) => {
                    return Err(MessageError::Validation(reason));
                }
                Err(e) => return Err(MessageError::Store(e.to_string())),
            }
        }
        Ok(forwarded)
    }

    async fn search(
        &self,
        me: UserId,
        query: &str,
        conversation_id: Option<ConversationId>,
    ) -> Result<Vec<MessageRecord>, MessageError> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .message_repo
            .search(me, query, conversation_id, SEARCH_RESULT_CAP)
            .await?)
    }

    async fn unread_summary(&self, me: UserId) -> Result<UnreadSummary, MessageError> {
        let counts = self.message_repo.unread_counts(me).await?;
        let total = counts.iter().map(|(_, n)| n).sum();
        let conversations = counts
            .into_iter()
            .map(|(conversation_id, unread_count)| UnreadEntry {
                conversation_id,
                unread_count,
            })
            .collect();
        Ok(UnreadSummary {
            conversations,
            total,
        })
    }
}
