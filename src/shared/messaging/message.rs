//! Chat Message Data Structure
//!
//! Represents an immutable message appended to a conversation, together with
//! the pagination cursor and the request/response bodies that carry messages.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::SharedError;

/// Represents a chat message
///
/// Messages are totally ordered inside their conversation by
/// `(sent_at, sequence)`. The store assigns both at append time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message ID
    pub id: String,
    /// Conversation this message belongs to
    pub conversation_id: String,
    /// Account that sent the message
    pub sender_account_id: String,
    /// Message content, never empty
    pub content: String,
    /// When the message was appended
    pub sent_at: DateTime<Utc>,
    /// Per-conversation sequence number, strictly increasing
    pub sequence: i64,
    /// Whether the message has been read by the recipient
    #[serde(default)]
    pub read: bool,
    /// Opaque attachment references, in the order supplied by the sender
    #[serde(default)]
    pub attachments: Vec<String>,
}

impl Message {
    /// Position of this message in its conversation's order
    pub fn cursor(&self) -> MessageCursor {
        MessageCursor {
            sent_at: self.sent_at,
            sequence: self.sequence,
        }
    }

    /// Whether this message sorts strictly after `cursor`
    pub fn is_after(&self, cursor: &MessageCursor) -> bool {
        (self.sent_at, self.sequence) > (cursor.sent_at, cursor.sequence)
    }
}

/// Truncate `content` to at most `max_len` characters, marking the cut with `...`
pub fn preview(content: &str, max_len: usize) -> String {
    if content.chars().count() <= max_len {
        return content.to_string();
    }
    let keep = max_len.saturating_sub(3);
    let mut preview: String = content.chars().take(keep).collect();
    preview.push_str("...");
    preview
}

/// Pagination cursor: the `(sent_at, sequence)` pair of the last message of a page
///
/// On the wire it is the string `"<sent_at micros>_<sequence>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MessageCursor {
    pub sent_at: DateTime<Utc>,
    pub sequence: i64,
}

impl fmt::Display for MessageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.sent_at.timestamp_micros(), self.sequence)
    }
}

impl FromStr for MessageCursor {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || SharedError::validation("cursor", format!("malformed cursor '{}'", s));

        let (micros, sequence) = s.split_once('_').ok_or_else(malformed)?;
        let micros: i64 = micros.parse().map_err(|_| malformed())?;
        let sequence: i64 = sequence.parse().map_err(|_| malformed())?;
        let sent_at = DateTime::from_timestamp_micros(micros).ok_or_else(malformed)?;

        Ok(Self { sent_at, sequence })
    }
}

impl Serialize for MessageCursor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MessageCursor {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One page of history plus the cursor for the next page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    /// `None` once fewer than `limit` messages came back
    pub next_cursor: Option<MessageCursor>,
}

/// Request to send a message (`POST /api/messages` and realtime `sendMessage`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    /// Explicit, pre-existing conversation; used verbatim
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Recipient of a direct conversation; the id is derived from the pair
    #[serde(default)]
    pub recipient_account_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

/// Response after sending a message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageResponse {
    pub conversation_id: String,
    pub message: Message,
    /// The message is stored but the conversation metadata could not be updated
    #[serde(default)]
    pub degraded: bool,
}

/// Query parameters for `GET /api/conversations/{id}/messages`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListMessagesQuery {
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

/// Response for listing messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListMessagesResponse {
    pub messages: Vec<Message>,
    pub next_cursor: Option<String>,
}

impl From<MessagePage> for ListMessagesResponse {
    fn from(page: MessagePage) -> Self {
        Self {
            messages: page.messages,
            next_cursor: page.next_cursor.map(|cursor| cursor.to_string()),
        }
    }
}
