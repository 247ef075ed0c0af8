//! Messaging Module
//!
//! This module contains all the data structures for the messaging system:
//!
//! - `Message` - An immutable message appended to a conversation
//! - `Conversation` - Metadata for a conversation between accounts
//! - `PresenceRecord` - Online/offline/away status of an account
//!
//! # Usage
//!
//! ```rust
//! use vms_chat::shared::messaging::{Conversation, Message, PresenceRecord};
//! ```

pub mod conversation;
pub mod message;
pub mod presence;

// Re-export all types
pub use conversation::{Conversation, ConversationTouch, ConversationType, ListConversationsResponse};
pub use message::{
    ListMessagesQuery, ListMessagesResponse, Message, MessageCursor, MessagePage,
    SendMessageRequest, SendMessageResponse,
};
pub use presence::{
    Activity, GameInfo, LinkedAccounts, PresenceMutation, PresenceRecord, PresenceStatus,
    PresenceUpdate,
};
