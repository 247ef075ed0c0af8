//! Conversation Directory
//!
//! Upserts conversation metadata after every append. Participants are only
//! ever unioned in; preview and time are last-writer-wins.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::backend::error::BackendError;
use crate::shared::messaging::{Conversation, ConversationTouch};

#[async_trait]
pub trait ConversationDirectory: Send + Sync {
    /// Idempotent upsert; returns the record as it stands afterwards
    async fn touch(&self, touch: ConversationTouch) -> Result<Conversation, BackendError>;

    async fn get(&self, conversation_id: &str) -> Result<Option<Conversation>, BackendError>;

    /// Conversations the account takes part in, most recently updated first
    async fn list_for_account(&self, account_id: &str) -> Result<Vec<Conversation>, BackendError>;
}

/// Sort most recently updated first, ties by id
pub fn sort_recent_first(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
}

/// In-memory conversation directory
#[derive(Default)]
pub struct MemoryConversationDirectory {
    conversations: RwLock<HashMap<String, Conversation>>,
}

impl MemoryConversationDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationDirectory for MemoryConversationDirectory {
    async fn touch(&self, touch: ConversationTouch) -> Result<Conversation, BackendError> {
        let mut conversations = self.conversations.write().await;
        let existing = conversations.remove(&touch.conversation_id);
        let conversation = touch.apply(existing);
        conversations.insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn get(&self, conversation_id: &str) -> Result<Option<Conversation>, BackendError> {
        Ok(self.conversations.read().await.get(conversation_id).cloned())
    }

    async fn list_for_account(&self, account_id: &str) -> Result<Vec<Conversation>, BackendError> {
        let mut conversations: Vec<Conversation> = self
            .conversations
            .read()
            .await
            .values()
            .filter(|conversation| conversation.has_participant(account_id))
            .cloned()
            .collect();
        sort_recent_first(&mut conversations);
        Ok(conversations)
    }
}
