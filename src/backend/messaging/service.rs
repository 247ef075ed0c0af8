//! Messaging Service
//!
//! Sending a message runs as a saga:
//!
//! 1. append to the Message Store (the commit point; failure aborts)
//! 2. touch the Conversation Directory, retried with backoff; when every
//!    attempt fails the message stays stored and the result is `degraded`
//! 3. publish to the conversation room (fire-and-forget)
//!
//! Nothing is published before the append succeeded, so a client notified
//! of a message can always find it through `history`.

use std::sync::Arc;

use crate::backend::error::BackendError;
use crate::backend::messaging::directory::ConversationDirectory;
use crate::backend::messaging::identity::{self, PAIR_SEPARATOR, ROOM_SEPARATOR};
use crate::backend::messaging::store::{validate_content, MessageStore, PageLimits};
use crate::backend::realtime::RealtimeBroker;
use crate::shared::config::MessagingConfig;
use crate::shared::messaging::message::preview;
use crate::shared::messaging::{
    Conversation, ConversationTouch, ConversationType, ListMessagesQuery, MessageCursor, MessagePage,
    SendMessageRequest, SendMessageResponse,
};
use crate::shared::ServerEvent;

/// Where a send request lands
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendTarget {
    pub conversation_id: String,
    /// Participants the touch unions into the conversation
    pub participants: Vec<String>,
    /// Whether the id came from the client rather than the resolver
    pub explicit: bool,
}

/// Work out the conversation a request targets
pub fn resolve_target(
    sender_account_id: &str,
    request: &SendMessageRequest,
) -> Result<SendTarget, BackendError> {
    identity::validate_account_id(sender_account_id)?;

    match (&request.conversation_id, &request.recipient_account_id) {
        (Some(conversation_id), Some(recipient)) => {
            let derived = identity::resolve(sender_account_id, recipient)?;
            if *conversation_id != derived {
                return Err(BackendError::invalid_argument(
                    "conversationId does not match the recipient",
                ));
            }
            Ok(SendTarget {
                conversation_id: derived,
                participants: vec![sender_account_id.to_string(), recipient.clone()],
                explicit: false,
            })
        }
        (None, Some(recipient)) => Ok(SendTarget {
            conversation_id: identity::resolve(sender_account_id, recipient)?,
            participants: vec![sender_account_id.to_string(), recipient.clone()],
            explicit: false,
        }),
        (Some(conversation_id), None) => {
            validate_conversation_id(conversation_id)?;
            let mut participants = vec![sender_account_id.to_string()];
            // A derived id names both members even when addressed by id.
            if identity::is_direct_member(conversation_id, sender_account_id) {
                if let Some((low, high)) = conversation_id.split_once(PAIR_SEPARATOR) {
                    let other = if low == sender_account_id { high } else { low };
                    if other != sender_account_id {
                        participants.push(other.to_string());
                    }
                }
            }
            Ok(SendTarget {
                conversation_id: conversation_id.clone(),
                participants,
                explicit: true,
            })
        }
        (None, None) => Err(BackendError::invalid_argument(
            "one of conversationId or recipientAccountId is required",
        )),
    }
}

pub fn validate_conversation_id(conversation_id: &str) -> Result<(), BackendError> {
    if conversation_id.trim().is_empty() {
        return Err(BackendError::invalid_argument("conversation id cannot be empty"));
    }
    if conversation_id.contains(ROOM_SEPARATOR) {
        return Err(BackendError::invalid_argument(format!(
            "conversation id '{}' contains a reserved character",
            conversation_id
        )));
    }
    Ok(())
}

/// Whether `account_id` may read or subscribe to a conversation
///
/// Participants of an existing conversation may; for a conversation that
/// does not exist yet only the two members of a derived pair may.
pub fn may_access(existing: Option<&Conversation>, conversation_id: &str, account_id: &str) -> bool {
    match existing {
        Some(conversation) => conversation.has_participant(account_id),
        None => identity::is_direct_member(conversation_id, account_id),
    }
}

#[derive(Clone)]
pub struct MessagingService {
    messages: Arc<dyn MessageStore>,
    conversations: Arc<dyn ConversationDirectory>,
    broker: RealtimeBroker,
    config: MessagingConfig,
}

impl MessagingService {
    pub fn new(
        messages: Arc<dyn MessageStore>,
        conversations: Arc<dyn ConversationDirectory>,
        broker: RealtimeBroker,
        config: MessagingConfig,
    ) -> Self {
        Self {
            messages,
            conversations,
            broker,
            config,
        }
    }

    pub fn config(&self) -> &MessagingConfig {
        &self.config
    }

    fn page_limits(&self) -> PageLimits {
        PageLimits {
            default: self.config.page_size,
            max: self.config.page_max,
        }
    }

    /// Send a message from `sender_account_id`
    pub async fn send(
        &self,
        sender_account_id: &str,
        request: SendMessageRequest,
    ) -> Result<SendMessageResponse, BackendError> {
        validate_content(&request.content)?;
        let target = resolve_target(sender_account_id, &request)?;

        if target.explicit {
            let existing = self.conversations.get(&target.conversation_id).await?;
            let allowed = match &existing {
                Some(_) if !self.config.enforce_participation => true,
                // A new conversation addressed by id must be a derived pair the sender belongs to.
                _ => may_access(existing.as_ref(), &target.conversation_id, sender_account_id),
            };
            if !allowed {
                return Err(BackendError::not_found("conversation not found"));
            }
        }

        let message = self
            .messages
            .append(
                &target.conversation_id,
                sender_account_id,
                &request.content,
                &request.attachments,
            )
            .await
            .map_err(|e| {
                tracing::error!("[Messaging] Append to {} failed: {}", target.conversation_id, e);
                e
            })?;

        tracing::info!(
            "[Messaging] {} appended message {} (seq {}) to {}",
            sender_account_id,
            message.id,
            message.sequence,
            target.conversation_id
        );

        let touch = ConversationTouch {
            conversation_id: target.conversation_id.clone(),
            participants: target.participants.clone(),
            last_message_preview: preview(&message.content, self.config.preview_length),
            updated_at: message.sent_at,
            conversation_type: ConversationType::Direct,
        };

        let conversation = self.touch_with_retry(touch).await;
        let degraded = conversation.is_none();

        self.broker.publish(&target.conversation_id, &message);
        if let Some(conversation) = &conversation {
            self.notify_participants(conversation);
        }

        Ok(SendMessageResponse {
            conversation_id: target.conversation_id,
            message,
            degraded,
        })
    }

    async fn touch_with_retry(&self, touch: ConversationTouch) -> Option<Conversation> {
        let attempts = self.config.touch_retry_attempts.max(1);
        let mut backoff = self.config.touch_retry_backoff;

        for attempt in 1..=attempts {
            match self.conversations.touch(touch.clone()).await {
                Ok(conversation) => return Some(conversation),
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        "[Messaging] Touch of {} failed (attempt {}/{}): {}",
                        touch.conversation_id,
                        attempt,
                        attempts,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                Err(e) => {
                    tracing::error!(
                        "[Messaging] Giving up on touch of {} after {} attempts, metadata is stale: {}",
                        touch.conversation_id,
                        attempts,
                        e
                    );
                }
            }
        }
        None
    }

    fn notify_participants(&self, conversation: &Conversation) {
        let event = ServerEvent::ConversationUpdated {
            conversation_id: conversation.id.clone(),
            last_message_preview: conversation.last_message_preview.clone(),
            updated_at: conversation.updated_at,
        };
        for participant in &conversation.participants {
            self.broker.notify_account(participant, &event);
        }
    }

    /// Check that `account_id` may see the conversation
    ///
    /// Always passes when participation is not enforced.
    pub async fn authorize_access(
        &self,
        account_id: &str,
        conversation_id: &str,
    ) -> Result<Option<Conversation>, BackendError> {
        validate_conversation_id(conversation_id)?;
        let existing = self.conversations.get(conversation_id).await?;
        if self.config.enforce_participation
            && !may_access(existing.as_ref(), conversation_id, account_id)
        {
            tracing::debug!(
                "[Messaging] {} denied access to {}",
                account_id,
                conversation_id
            );
            return Err(BackendError::not_found("conversation not found"));
        }
        Ok(existing)
    }

    /// One page of a conversation's history
    pub async fn history(
        &self,
        account_id: &str,
        conversation_id: &str,
        query: ListMessagesQuery,
    ) -> Result<MessagePage, BackendError> {
        let cursor = query
            .cursor
            .as_deref()
            .map(str::parse::<MessageCursor>)
            .transpose()?;
        let limit = self.page_limits().clamp(query.limit);

        let existing = self.authorize_access(account_id, conversation_id).await?;
        let page = self.messages.list(conversation_id, cursor, limit).await?;

        if existing.is_none() && page.messages.is_empty() && cursor.is_none() {
            return Err(BackendError::not_found("conversation not found"));
        }
        Ok(page)
    }

    /// Conversations of an account, most recent first
    pub async fn conversations_for(&self, account_id: &str) -> Result<Vec<Conversation>, BackendError> {
        self.conversations.list_for_account(account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request(conversation_id: Option<&str>, recipient: Option<&str>) -> SendMessageRequest {
        SendMessageRequest {
            conversation_id: conversation_id.map(String::from),
            recipient_account_id: recipient.map(String::from),
            content: "hi".to_string(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn test_target_from_recipient() {
        let target = resolve_target("bob", &request(None, Some("alice"))).unwrap();
        assert_eq!(target.conversation_id, "alice_bob");
        assert!(!target.explicit);
        assert_eq!(target.participants, vec!["bob".to_string(), "alice".to_string()]);
    }

    #[test]
    fn test_target_explicit_verbatim() {
        let target = resolve_target("alice", &request(Some("squad-7"), None)).unwrap();
        assert_eq!(target.conversation_id, "squad-7");
        assert!(target.explicit);
        assert_eq!(target.participants, vec!["alice".to_string()]);
    }

    #[test]
    fn test_target_explicit_pair_includes_both_members() {
        let target = resolve_target("bob", &request(Some("alice_bob"), None)).unwrap();
        assert_eq!(target.participants, vec!["bob".to_string(), "alice".to_string()]);
    }

    #[test]
    fn test_target_combined_must_agree() {
        assert!(resolve_target("alice", &request(Some("alice_bob"), Some("bob"))).is_ok());
        assert_matches!(
            resolve_target("alice", &request(Some("alice_carol"), Some("bob"))),
            Err(BackendError::InvalidArgument { .. })
        );
    }

    #[test]
    fn test_target_rejections() {
        assert_matches!(
            resolve_target("alice", &request(None, None)),
            Err(BackendError::InvalidArgument { .. })
        );
        assert_matches!(
            resolve_target("alice", &request(None, Some("alice"))),
            Err(BackendError::InvalidArgument { .. })
        );
        assert_matches!(
            resolve_target("alice", &request(Some("conv:x"), None)),
            Err(BackendError::InvalidArgument { .. })
        );
    }

    #[test]
    fn test_may_access() {
        assert!(may_access(None, "alice_bob", "alice"));
        assert!(!may_access(None, "alice_bob", "carol"));
        assert!(!may_access(None, "squad-7", "alice"));
    }
}
