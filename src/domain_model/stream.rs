use crate::domain_model::{ContentType, ConversationId, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frame type strings, both directions.
pub mod frame_type {
    pub const AUTH: &str = "auth";
    pub const AUTH_SUCCESS: &str = "auth:success";
    pub const AUTH_ERROR: &str = "auth:error";
    pub const CHAT_SEND: &str = "chat:send";
    pub const CHAT_SENT: &str = "chat:sent";
    pub const CHAT_RECEIVE: &str = "chat:receive";
    pub const CHAT_DELIVERED: &str = "chat:delivered";
    pub const CHAT_READ: &str = "chat:read";
    pub const CHAT_TYPING: &str = "chat:typing";
    pub const CHAT_EDITED: &str = "chat:edited";
    pub const CHAT_DELETED: &str = "chat:deleted";
    pub const PRESENCE_UPDATE: &str = "presence:update";
    pub const ERROR: &str = "error";
}

/// Application close codes.
pub const CLOSE_GOING_AWAY: u16 = 1001;
pub const CLOSE_AUTH_FAILED: u16 = 4001;

// region inbound

/// Envelope of a client frame. The payload stays opaque here; per-type
/// decoding happens after the dispatcher's envelope and auth checks.
#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub timestamp: i64,
}

impl InboundFrame {
    pub fn envelope_is_valid(&self) -> bool {
        !self.id.is_empty() && !self.kind.is_empty() && self.payload.is_object()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSendPayload {
    pub conversation_id: ConversationId,
    pub content: String,
    pub content_type: Option<String>,
    pub reply_to_message_id: Option<MessageId>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReadPayload {
    pub conversation_id: ConversationId,
    pub message_id: MessageId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTypingPayload {
    pub conversation_id: ConversationId,
    pub is_typing: bool,
}

// endregion

// region outbound

#[derive(Debug, Serialize)]
pub struct OutboundFrame {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub payload: serde_json::Value,
    pub timestamp: i64,
    #[serde(rename = "replyTo", skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
}

impl OutboundFrame {
    pub fn event<T: Serialize>(kind: &'static str, payload: &T) -> Self {
        OutboundFrame {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
            timestamp: Utc::now().timestamp_millis(),
            reply_to: None,
        }
    }

    pub fn reply<T: Serialize>(kind: &'static str, payload: &T, reply_to: &str) -> Self {
        let mut frame = Self::event(kind, payload);
        frame.reply_to = Some(reply_to.to_owned());
        frame
    }

    pub fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSuccess {
    pub user_id: UserId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFailure {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSent {
    pub client_message_id: String,
    pub message_id: MessageId,
    pub timestamp: DateTime<Utc>,
}

/// Preview of the quoted message on a reply.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyPreview {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReceive {
    pub message_id: MessageId,
    pub sender_id: UserId,
    pub sender_name: String,
    pub conversation_id: ConversationId,
    pub content: String,
    pub content_type: ContentType,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyPreview>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDelivered {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatReadNotice {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub read_by: UserId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTypingNotice {
    pub conversation_id: ConversationId,
    pub user_id: UserId,
    pub is_typing: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEdited {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub new_content: String,
    pub edited_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDeleted {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUpdate {
    pub user_id: UserId,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

impl PresenceUpdate {
    pub fn online(user_id: UserId) -> Self {
        PresenceUpdate {
            user_id,
            status: "online",
            last_seen: None,
        }
    }

    pub fn offline(user_id: UserId, last_seen: DateTime<Utc>) -> Self {
        PresenceUpdate {
            user_id,
            status: "offline",
            last_seen: Some(last_seen),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

// endregion

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbound_envelope_parses_and_validates() {
        let text = r#"{"id":"c1","type":"chat:send","payload":{"conversationId":"7f2f3a1e-0000-0000-0000-000000000001","content":"hi"},"timestamp":1712000000000}"#;
        let frame: InboundFrame = serde_json::from_str(text).unwrap();
        assert!(frame.envelope_is_valid());
        assert_eq!(frame.kind, "chat:send");

        let payload: ChatSendPayload = serde_json::from_value(frame.payload).unwrap();
        assert_eq!(payload.content, "hi");
        assert!(payload.content_type.is_none());
        assert!(payload.reply_to_message_id.is_none());
    }

    #[test]
    fn envelope_without_payload_object_is_invalid() {
        let text = r#"{"id":"c1","type":"auth","timestamp":0}"#;
        let frame: InboundFrame = serde_json::from_str(text).unwrap();
        assert!(!frame.envelope_is_valid());
    }

    #[test]
    fn outbound_frames_are_camel_case_and_elide_reply_to() {
        let frame = OutboundFrame::event(
            frame_type::CHAT_DELIVERED,
            &ChatDelivered {
                message_id: MessageId::new(),
                conversation_id: ConversationId::new(),
            },
        );
        let value: serde_json::Value = serde_json::from_str(&frame.to_text()).unwrap();
        assert_eq!(value["type"], "chat:delivered");
        assert!(value["payload"]["messageId"].is_string());
        assert!(value["payload"]["conversationId"].is_string());
        assert!(value.get("replyTo").is_none());

        let reply = OutboundFrame::reply(
            frame_type::ERROR,
            &ErrorBody {
                code: "SEND_FAILED",
                message: "nope".into(),
            },
            "c42",
        );
        let value: serde_json::Value = serde_json::from_str(&reply.to_text()).unwrap();
        assert_eq!(value["replyTo"], "c42");
        assert_eq!(value["payload"]["code"], "SEND_FAILED");
    }

    #[test]
    fn presence_offline_carries_last_seen() {
        let seen = Utc::now();
        let frame = OutboundFrame::event(
            frame_type::PRESENCE_UPDATE,
            &PresenceUpdate::offline(UserId::new(), seen),
        );
        let value: serde_json::Value = serde_json::from_str(&frame.to_text()).unwrap();
        assert_eq!(value["payload"]["status"], "offline");
        assert!(value["payload"]["lastSeen"].is_string());

        let online = OutboundFrame::event(
            frame_type::PRESENCE_UPDATE,
            &PresenceUpdate::online(UserId::new()),
        );
        let value: serde_json::Value = serde_json::from_str(&online.to_text()).unwrap();
        assert!(value["payload"].get("lastSeen").is_none());
    }
}
