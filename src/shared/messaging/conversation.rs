//! Conversation Data Structure
//!
//! Represents a conversation between two or more accounts.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of conversation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConversationType {
    #[default]
    Direct,
}

impl ConversationType {
    /// Convert to string for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationType::Direct => "direct",
        }
    }

    /// Parse from string (database); unknown values fall back to `Direct`
    pub fn from_db(_s: &str) -> Self {
        ConversationType::Direct
    }
}

/// Represents a conversation between accounts
///
/// Participants only ever grow; the directory unions new participants in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Conversation ID (derived for direct pairs, or client supplied)
    pub id: String,
    /// Participant account IDs
    pub participants: BTreeSet<String>,
    /// Preview text of last message
    pub last_message_preview: String,
    /// Time of the last appended message
    pub updated_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
}

impl Conversation {
    /// Check if account is a participant
    pub fn has_participant(&self, account_id: &str) -> bool {
        self.participants.contains(account_id)
    }
}

/// Upsert issued to the conversation directory after every append
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTouch {
    pub conversation_id: String,
    pub participants: Vec<String>,
    pub last_message_preview: String,
    pub updated_at: DateTime<Utc>,
    pub conversation_type: ConversationType,
}

impl ConversationTouch {
    /// Apply this touch to an existing record, or build the initial record
    pub fn apply(&self, existing: Option<Conversation>) -> Conversation {
        let mut conversation = existing.unwrap_or_else(|| Conversation {
            id: self.conversation_id.clone(),
            participants: BTreeSet::new(),
            last_message_preview: String::new(),
            updated_at: self.updated_at,
            conversation_type: self.conversation_type,
        });
        conversation
            .participants
            .extend(self.participants.iter().cloned());
        conversation.last_message_preview = self.last_message_preview.clone();
        conversation.updated_at = self.updated_at;
        conversation
    }
}

/// Response for listing conversations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListConversationsResponse {
    pub conversations: Vec<Conversation>,
}
