/**
 * Real-time Event System
 *
 * This module defines the events exchanged over the realtime WebSocket
 * channel. Every frame is a JSON text frame of the form
 * `{"event": "<name>", "data": {...}}`.
 *
 * Client events drive a connection (authenticate, join rooms, send,
 * heartbeat). Server events are pushed by the broker to rooms or to a
 * single connection.
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::messaging::{Message, PresenceUpdate, SendMessageRequest};

/// Event sent by a client over the realtime channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    /// Bind the connection to an account; failure closes the connection
    Authenticate { token: String },
    /// Subscribe to `conv:<conversation_id>`
    JoinConversation { conversation_id: String },
    /// Unsubscribe from `conv:<conversation_id>`
    LeaveConversation { conversation_id: String },
    /// Same body as `POST /api/messages`
    SendMessage(SendMessageRequest),
    /// Same body as `POST /api/presence`
    Heartbeat(PresenceUpdate),
}

/// Event pushed by the server over the realtime channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    Authenticated {
        account_id: String,
    },
    Joined {
        conversation_id: String,
    },
    Left {
        conversation_id: String,
    },
    /// Fan-out to every member of `conv:<conversation_id>`
    MessageReceived {
        conversation_id: String,
        message: Message,
    },
    /// Acknowledgement of a realtime `sendMessage`, to the sending connection only
    MessageSent {
        conversation_id: String,
        message: Message,
        degraded: bool,
    },
    /// Pushed to each participant's personal room after a touch
    ConversationUpdated {
        conversation_id: String,
        last_message_preview: String,
        updated_at: DateTime<Utc>,
    },
    /// A rejected, non-fatal client event
    Error {
        status: u16,
        message: String,
    },
}

impl ServerEvent {
    /// Create an error event
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::Error {
            status,
            message: message.into(),
        }
    }

    /// Event name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Authenticated { .. } => "authenticated",
            ServerEvent::Joined { .. } => "joined",
            ServerEvent::Left { .. } => "left",
            ServerEvent::MessageReceived { .. } => "messageReceived",
            ServerEvent::MessageSent { .. } => "messageSent",
            ServerEvent::ConversationUpdated { .. } => "conversationUpdated",
            ServerEvent::Error { .. } => "error",
        }
    }
}
