use crate::domain_model::{ConversationId, MessageId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Content shown in place of a tombstoned message.
pub const DELETED_PLACEHOLDER: &str = "This message was deleted";

/// Sender may edit own TEXT messages this long after creation.
pub const EDIT_WINDOW_MINS: i64 = 15;
/// Sender may delete-for-everyone this long after creation.
pub const DELETE_WINDOW_MINS: i64 = 60;

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ContentType {
    #[default]
    Text,
    Image,
    File,
    Audio,
    Video,
    System,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "TEXT",
            ContentType::Image => "IMAGE",
            ContentType::File => "FILE",
            ContentType::Audio => "AUDIO",
            ContentType::Video => "VIDEO",
            ContentType::System => "SYSTEM",
        }
    }

    /// Client input is case-insensitive; absent means TEXT. SYSTEM is
    /// server-authored and never accepted from a client.
    pub fn from_client(raw: Option<&str>) -> Option<ContentType> {
        let raw = match raw {
            None => return Some(ContentType::Text),
            Some(r) => r,
        };
        match raw.to_ascii_uppercase().as_str() {
            "TEXT" => Some(ContentType::Text),
            "IMAGE" => Some(ContentType::Image),
            "FILE" => Some(ContentType::File),
            "AUDIO" => Some(ContentType::Audio),
            "VIDEO" => Some(ContentType::Video),
            _ => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEXT" => Ok(ContentType::Text),
            "IMAGE" => Ok(ContentType::Image),
            "FILE" => Ok(ContentType::File),
            "AUDIO" => Ok(ContentType::Audio),
            "VIDEO" => Ok(ContentType::Video),
            "SYSTEM" => Ok(ContentType::System),
            other => Err(format!("unknown content type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub content: String,
    pub content_type: ContentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<MessageId>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MessageRecord {
    pub fn is_tombstoned(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn within_edit_window(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at <= Duration::minutes(EDIT_WINDOW_MINS)
    }

    pub fn within_delete_window(&self, now: DateTime<Utc>) -> bool {
        now - self.created_at <= Duration::minutes(DELETE_WINDOW_MINS)
    }
}

/// One page of history. `messages` are chronological (oldest first);
/// `next_cursor` is the id to pass back for the next (older) page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<MessageRecord>,
    pub has_more: bool,
    pub next_cursor: Option<MessageId>,
}

/// Build a page from a `limit + 1` fetch ordered newest-first. The extra row
/// only proves there is an older page; it is popped before the reversal to
/// chronological order.
pub fn assemble_page(mut rows_desc: Vec<MessageRecord>, limit: usize) -> MessagePage {
    let has_more = rows_desc.len() > limit;
    if has_more {
        rows_desc.truncate(limit);
    }
    rows_desc.reverse();
    let next_cursor = if has_more {
        rows_desc.first().map(|m| m.message_id)
    } else {
        None
    };
    MessagePage {
        messages: rows_desc,
        has_more,
        next_cursor,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(n: i64) -> MessageRecord {
        MessageRecord {
            message_id: MessageId::new(),
            conversation_id: ConversationId(uuid::Uuid::nil()),
            sender_id: UserId(uuid::Uuid::nil()),
            content: format!("m{n}"),
            content_type: ContentType::Text,
            reply_to_id: None,
            created_at: Utc::now() + Duration::seconds(n),
            edited_at: None,
            deleted_at: None,
        }
    }

    #[test]
    fn page_without_overflow_has_no_cursor() {
        let rows = vec![record(3), record(2), record(1)];
        let page = assemble_page(rows, 3);
        assert!(!page.has_more);
        assert!(page.next_cursor.is_none());
        assert_eq!(page.messages.len(), 3);
        assert_eq!(page.messages[0].content, "m1");
        assert_eq!(page.messages[2].content, "m3");
    }

    #[test]
    fn overflow_row_is_dropped_and_cursor_points_at_oldest_returned() {
        let rows = vec![record(4), record(3), record(2), record(1)];
        let page = assemble_page(rows, 3);
        assert!(page.has_more);
        assert_eq!(page.messages.len(), 3);
        // chronological: m2, m3, m4; the cursor is m2 (oldest on the page)
        assert_eq!(page.messages[0].content, "m2");
        assert_eq!(page.next_cursor, Some(page.messages[0].message_id));
    }

    #[test]
    fn empty_fetch_yields_empty_page() {
        let page = assemble_page(Vec::new(), 50);
        assert!(!page.has_more);
        assert!(page.messages.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn content_type_from_client_defaults_and_rejects_system() {
        assert_eq!(ContentType::from_client(None), Some(ContentType::Text));
        assert_eq!(
            ContentType::from_client(Some("image")),
            Some(ContentType::Image)
        );
        assert_eq!(ContentType::from_client(Some("SYSTEM")), None);
        assert_eq!(ContentType::from_client(Some("bogus")), None);
    }

    #[test]
    fn edit_and_delete_windows() {
        let mut m = record(0);
        m.created_at = Utc::now();
        let now = m.created_at;
        assert!(m.within_edit_window(now + Duration::minutes(14)));
        assert!(!m.within_edit_window(now + Duration::minutes(16)));
        assert!(m.within_delete_window(now + Duration::minutes(59)));
        assert!(!m.within_delete_window(now + Duration::minutes(61)));
    }
}
