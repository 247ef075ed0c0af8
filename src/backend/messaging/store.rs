//! Message Store
//!
//! Appends immutable messages and pages through them in `(sent_at, sequence)`
//! order. Both are assigned by the store at append time, serialized per
//! conversation, so `sent_at` never decreases and `sequence` is gapless.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::shared::messaging::{Message, MessageCursor, MessagePage};
use crate::shared::time;

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Append a message; fails with `InvalidArgument` on empty content
    async fn append(
        &self,
        conversation_id: &str,
        sender_account_id: &str,
        content: &str,
        attachments: &[String],
    ) -> Result<Message, BackendError>;

    /// Messages strictly after `cursor`, oldest first, at most `limit`
    async fn list(
        &self,
        conversation_id: &str,
        cursor: Option<MessageCursor>,
        limit: usize,
    ) -> Result<MessagePage, BackendError>;
}

/// Reject content that is empty once surrounding whitespace is removed
pub fn validate_content(content: &str) -> Result<(), BackendError> {
    if content.trim().is_empty() {
        return Err(BackendError::invalid_argument("message content cannot be empty"));
    }
    Ok(())
}

/// Default and maximum page sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default: usize,
    pub max: usize,
}

impl PageLimits {
    /// Clamp a requested limit into `1..=max`
    pub fn clamp(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default).clamp(1, self.max.max(1))
    }
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default: 20,
            max: 100,
        }
    }
}

/// Build a page from the messages returned for `limit`
pub fn page_from(messages: Vec<Message>, limit: usize) -> MessagePage {
    let next_cursor = if messages.len() >= limit {
        messages.last().map(Message::cursor)
    } else {
        None
    };
    MessagePage {
        messages,
        next_cursor,
    }
}

/// In-memory message store
#[derive(Default)]
pub struct MemoryMessageStore {
    conversations: RwLock<HashMap<String, Vec<Message>>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(
        &self,
        conversation_id: &str,
        sender_account_id: &str,
        content: &str,
        attachments: &[String],
    ) -> Result<Message, BackendError> {
        validate_content(content)?;

        let mut conversations = self.conversations.write().await;
        let history = conversations.entry(conversation_id.to_string()).or_default();

        let now = time::now();
        let (sent_at, sequence) = match history.last() {
            Some(last) => (now.max(last.sent_at), last.sequence + 1),
            None => (now, 1),
        };

        let message = Message {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            sender_account_id: sender_account_id.to_string(),
            content: content.to_string(),
            sent_at,
            sequence,
            read: false,
            attachments: attachments.to_vec(),
        };
        history.push(message.clone());
        Ok(message)
    }

    async fn list(
        &self,
        conversation_id: &str,
        cursor: Option<MessageCursor>,
        limit: usize,
    ) -> Result<MessagePage, BackendError> {
        let limit = limit.max(1);
        let conversations = self.conversations.read().await;
        let Some(history) = conversations.get(conversation_id) else {
            return Ok(page_from(Vec::new(), limit));
        };

        let start = match cursor {
            Some(cursor) => history.partition_point(|message| !message.is_after(&cursor)),
            None => 0,
        };
        let messages = history[start..].iter().take(limit).cloned().collect();
        Ok(page_from(messages, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::Arc;

    async fn seeded(count: usize) -> MemoryMessageStore {
        let store = MemoryMessageStore::new();
        for i in 1..=count {
            store
                .append("alice_bob", "alice", &format!("message {}", i), &[])
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let store = MemoryMessageStore::new();
        assert_matches!(
            store.append("alice_bob", "alice", "", &[]).await,
            Err(BackendError::InvalidArgument { .. })
        );
        assert_matches!(
            store.append("alice_bob", "alice", "   ", &[]).await,
            Err(BackendError::InvalidArgument { .. })
        );
        let page = store.list("alice_bob", None, 10).await.unwrap();
        assert!(page.messages.is_empty());
    }

    #[tokio::test]
    async fn test_append_assigns_sequence_and_keeps_attachments() {
        let store = MemoryMessageStore::new();
        let attachments = vec!["img/1".to_string(), "img/2".to_string()];
        let first = store.append("c", "alice", "one", &attachments).await.unwrap();
        let second = store.append("c", "bob", "two", &[]).await.unwrap();
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);
        assert!(second.sent_at >= first.sent_at);
        assert!(!first.read);
        assert_eq!(first.attachments, attachments);
    }

    #[tokio::test]
    async fn test_pages_of_two() {
        let store = seeded(5).await;

        let first = store.list("alice_bob", None, 2).await.unwrap();
        let contents: Vec<_> = first.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["message 1", "message 2"]);
        assert!(first.next_cursor.is_some());

        let second = store.list("alice_bob", first.next_cursor, 2).await.unwrap();
        let contents: Vec<_> = second.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["message 3", "message 4"]);
        assert!(second.next_cursor.is_some());

        let third = store.list("alice_bob", second.next_cursor, 2).await.unwrap();
        assert_eq!(third.messages.len(), 1);
        assert_eq!(third.messages[0].content, "message 5");
        assert!(third.next_cursor.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_totally_ordered() {
        let store = Arc::new(MemoryMessageStore::new());
        let mut handles = Vec::new();
        for i in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let sender = if i % 2 == 0 { "alice" } else { "bob" };
                store.append("alice_bob", sender, "hi", &[]).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let page = store.list("alice_bob", None, 100).await.unwrap();
        assert_eq!(page.messages.len(), 50);
        for (index, pair) in page.messages.windows(2).enumerate() {
            assert_eq!(pair[0].sequence, index as i64 + 1);
            assert!(pair[1].is_after(&pair[0].cursor()));
        }
    }

    #[test]
    fn test_page_limits_clamp() {
        let limits = PageLimits::default();
        assert_eq!(limits.clamp(None), 20);
        assert_eq!(limits.clamp(Some(0)), 1);
        assert_eq!(limits.clamp(Some(500)), 100);
        assert_eq!(limits.clamp(Some(7)), 7);
    }
}
