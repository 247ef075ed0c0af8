//! Database operations for messaging
//!
//! Postgres implementations of `MessageStore` and `ConversationDirectory`.
//!
//! Appends advance `message_sequences` with an atomic upsert. The row lock
//! it takes serializes appends per conversation until the transaction
//! commits, so `(sent_at, sequence)` is assigned in commit order.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgExecutor, PgPool, Row};
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::backend::messaging::directory::ConversationDirectory;
use crate::backend::messaging::store::{page_from, validate_content, MessageStore};
use crate::shared::messaging::{
    Conversation, ConversationTouch, ConversationType, Message, MessageCursor, MessagePage,
};
use crate::shared::time;

fn message_from_row(row: &PgRow) -> Message {
    let attachments: Json<Vec<String>> = row.get("attachments");
    Message {
        id: row.get::<Uuid, _>("id").to_string(),
        conversation_id: row.get("conversation_id"),
        sender_account_id: row.get("sender_account_id"),
        content: row.get("content"),
        sent_at: row.get("sent_at"),
        sequence: row.get("sequence"),
        read: row.get("read"),
        attachments: attachments.0,
    }
}

fn conversation_from_row(row: &PgRow) -> Conversation {
    let participants: Vec<String> = row.get("participants");
    Conversation {
        id: row.get("id"),
        participants: participants.into_iter().collect(),
        last_message_preview: row.get("last_message_preview"),
        updated_at: row.get("updated_at"),
        conversation_type: ConversationType::from_db(
            row.get::<String, _>("conversation_type").as_str(),
        ),
    }
}

/// Postgres-backed message store
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn append(
        &self,
        conversation_id: &str,
        sender_account_id: &str,
        content: &str,
        attachments: &[String],
    ) -> Result<Message, BackendError> {
        validate_content(content)?;

        let mut tx = self.pool.begin().await?;

        let position = sqlx::query(
            r#"
            INSERT INTO message_sequences (conversation_id, last_sequence, last_sent_at)
            VALUES ($1, 1, $2)
            ON CONFLICT (conversation_id) DO UPDATE
            SET last_sequence = message_sequences.last_sequence + 1,
                last_sent_at = GREATEST(message_sequences.last_sent_at, EXCLUDED.last_sent_at)
            RETURNING last_sequence, last_sent_at
            "#,
        )
        .bind(conversation_id)
        .bind(time::now())
        .fetch_one(&mut *tx)
        .await?;

        let id = Uuid::new_v4();
        let row = sqlx::query(
            r#"
            INSERT INTO messages (id, conversation_id, sender_account_id, content, sent_at, sequence, read, attachments)
            VALUES ($1, $2, $3, $4, $5, $6, false, $7)
            RETURNING id, conversation_id, sender_account_id, content, sent_at, sequence, read, attachments
            "#,
        )
        .bind(id)
        .bind(conversation_id)
        .bind(sender_account_id)
        .bind(content)
        .bind(position.get::<chrono::DateTime<chrono::Utc>, _>("last_sent_at"))
        .bind(position.get::<i64, _>("last_sequence"))
        .bind(Json(attachments))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(message_from_row(&row))
    }

    async fn list(
        &self,
        conversation_id: &str,
        cursor: Option<MessageCursor>,
        limit: usize,
    ) -> Result<MessagePage, BackendError> {
        let limit = limit.max(1);
        let rows = match cursor {
            Some(cursor) => {
                sqlx::query(
                    r#"
                    SELECT id, conversation_id, sender_account_id, content, sent_at, sequence, read, attachments
                    FROM messages
                    WHERE conversation_id = $1 AND (sent_at, sequence) > ($2, $3)
                    ORDER BY sent_at, sequence
                    LIMIT $4
                    "#,
                )
                .bind(conversation_id)
                .bind(cursor.sent_at)
                .bind(cursor.sequence)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT id, conversation_id, sender_account_id, content, sent_at, sequence, read, attachments
                    FROM messages
                    WHERE conversation_id = $1
                    ORDER BY sent_at, sequence
                    LIMIT $2
                    "#,
                )
                .bind(conversation_id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let messages = rows.iter().map(message_from_row).collect();
        Ok(page_from(messages, limit))
    }
}

const SELECT_CONVERSATION: &str = r#"
    SELECT c.id, c.conversation_type, c.last_message_preview, c.updated_at,
           COALESCE(array_agg(p.account_id) FILTER (WHERE p.account_id IS NOT NULL), '{}') AS participants
    FROM conversations c
    LEFT JOIN conversation_participants p ON p.conversation_id = c.id
"#;

async fn fetch_conversation<'e, E>(
    executor: E,
    conversation_id: &str,
) -> Result<Option<Conversation>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query(&format!("{} WHERE c.id = $1 GROUP BY c.id", SELECT_CONVERSATION))
        .bind(conversation_id)
        .fetch_optional(executor)
        .await?;
    Ok(row.as_ref().map(conversation_from_row))
}

/// Postgres-backed conversation directory
#[derive(Clone)]
pub struct PgConversationDirectory {
    pool: PgPool,
}

impl PgConversationDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationDirectory for PgConversationDirectory {
    async fn touch(&self, touch: ConversationTouch) -> Result<Conversation, BackendError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, conversation_type, last_message_preview, updated_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET last_message_preview = EXCLUDED.last_message_preview,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&touch.conversation_id)
        .bind(touch.conversation_type.as_str())
        .bind(&touch.last_message_preview)
        .bind(touch.updated_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO conversation_participants (conversation_id, account_id)
            SELECT $1, UNNEST($2::text[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&touch.conversation_id)
        .bind(&touch.participants)
        .execute(&mut *tx)
        .await?;

        let conversation = fetch_conversation(&mut *tx, &touch.conversation_id)
            .await?
            .ok_or_else(|| BackendError::store("conversation vanished during touch"))?;

        tx.commit().await?;
        Ok(conversation)
    }

    async fn get(&self, conversation_id: &str) -> Result<Option<Conversation>, BackendError> {
        Ok(fetch_conversation(&self.pool, conversation_id).await?)
    }

    async fn list_for_account(&self, account_id: &str) -> Result<Vec<Conversation>, BackendError> {
        let rows = sqlx::query(&format!(
            r#"{}
            WHERE c.id IN (SELECT conversation_id FROM conversation_participants WHERE account_id = $1)
            GROUP BY c.id
            ORDER BY c.updated_at DESC, c.id
            "#,
            SELECT_CONVERSATION
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(conversation_from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    //! Run with `DATABASE_URL` pointing at a scratch database:
    //! `cargo test -- --ignored`
    use super::*;
    use crate::shared::messaging::ConversationType;

    async fn pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = PgPool::connect(&url).await.expect("connect");
        sqlx::migrate!().run(&pool).await.expect("migrate");
        pool
    }

    #[tokio::test]
    #[ignore]
    async fn test_pg_append_and_page() {
        let store = PgMessageStore::new(pool().await);
        let conversation_id = format!("test-{}", Uuid::new_v4());
        for i in 1..=3 {
            store
                .append(&conversation_id, "alice", &format!("m{}", i), &["a".to_string()])
                .await
                .unwrap();
        }

        let first = store.list(&conversation_id, None, 2).await.unwrap();
        assert_eq!(first.messages.len(), 2);
        assert_eq!(first.messages[0].sequence, 1);
        assert_eq!(first.messages[0].attachments, vec!["a".to_string()]);

        let rest = store.list(&conversation_id, first.next_cursor, 2).await.unwrap();
        assert_eq!(rest.messages.len(), 1);
        assert_eq!(rest.messages[0].content, "m3");
        assert!(rest.next_cursor.is_none());
    }

    #[tokio::test]
    #[ignore]
    async fn test_pg_touch_unions_participants() {
        let directory = PgConversationDirectory::new(pool().await);
        let conversation_id = format!("test-{}", Uuid::new_v4());
        let touch = |participants: Vec<&str>, preview: &str| ConversationTouch {
            conversation_id: conversation_id.clone(),
            participants: participants.into_iter().map(String::from).collect(),
            last_message_preview: preview.to_string(),
            updated_at: time::now(),
            conversation_type: ConversationType::Direct,
        };

        directory.touch(touch(vec!["alice", "bob"], "one")).await.unwrap();
        let conversation = directory.touch(touch(vec!["carol"], "two")).await.unwrap();
        assert_eq!(conversation.participants.len(), 3);
        assert_eq!(conversation.last_message_preview, "two");

        let listed = directory.list_for_account("carol").await.unwrap();
        assert!(listed.iter().any(|c| c.id == conversation_id));
    }
}
