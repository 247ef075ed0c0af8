//! Database operations for presence
//!
//! One row per account in `presence`. Mutations lock the row
//! (`SELECT ... FOR UPDATE`) so concurrent heartbeats merge instead of
//! overwriting each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::backend::error::BackendError;
use crate::backend::presence::store::PresenceStore;
use crate::shared::messaging::{Activity, PresenceMutation, PresenceRecord, PresenceStatus};

const SELECT_PRESENCE: &str = r#"
    SELECT account_id, online, status, last_active_at, status_message, activity
    FROM presence
"#;

fn presence_from_row(row: &PgRow) -> PresenceRecord {
    let activity: Option<Json<Activity>> = row.get("activity");
    PresenceRecord {
        account_id: row.get("account_id"),
        online: row.get("online"),
        status: PresenceStatus::from_db(row.get::<String, _>("status").as_str()),
        last_active_at: row.get("last_active_at"),
        status_message: row.get("status_message"),
        activity: activity.map(|json| json.0),
    }
}

/// Postgres-backed presence store
#[derive(Clone)]
pub struct PgPresenceStore {
    pool: PgPool,
}

impl PgPresenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PresenceStore for PgPresenceStore {
    async fn apply(
        &self,
        account_id: &str,
        mutation: &PresenceMutation,
        at: DateTime<Utc>,
    ) -> Result<PresenceRecord, BackendError> {
        let mut tx = self.pool.begin().await?;

        // Materialise the implicit offline record first so the row lock below
        // covers first-time writers too.
        sqlx::query(
            r#"
            INSERT INTO presence (account_id, online, status, last_active_at, status_message, activity)
            VALUES ($1, false, 'offline', $2, '', NULL)
            ON CONFLICT (account_id) DO NOTHING
            "#,
        )
        .bind(account_id)
        .bind(at)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query(&format!("{} WHERE account_id = $1 FOR UPDATE", SELECT_PRESENCE))
            .bind(account_id)
            .fetch_one(&mut *tx)
            .await?;

        let mut record = presence_from_row(&row);
        record.apply(mutation, at);

        sqlx::query(
            r#"
            UPDATE presence
            SET online = $2, status = $3, last_active_at = $4, status_message = $5, activity = $6
            WHERE account_id = $1
            "#,
        )
        .bind(account_id)
        .bind(record.online)
        .bind(record.status.as_str())
        .bind(record.last_active_at)
        .bind(&record.status_message)
        .bind(record.activity.clone().map(Json))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(record)
    }

    async fn get(&self, account_id: &str) -> Result<Option<PresenceRecord>, BackendError> {
        let row = sqlx::query(&format!("{} WHERE account_id = $1", SELECT_PRESENCE))
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(presence_from_row))
    }

    async fn stale_online(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, BackendError> {
        let rows = sqlx::query(
            r#"
            SELECT account_id FROM presence
            WHERE online AND last_active_at < $1
            ORDER BY account_id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(|row| row.get("account_id")).collect())
    }

    async fn expire(
        &self,
        account_id: &str,
        cutoff: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<Option<PresenceRecord>, BackendError> {
        let row = sqlx::query(
            r#"
            UPDATE presence
            SET online = false, status = 'offline', last_active_at = $3
            WHERE account_id = $1 AND online AND last_active_at < $2
            RETURNING account_id, online, status, last_active_at, status_message, activity
            "#,
        )
        .bind(account_id)
        .bind(cutoff)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(presence_from_row))
    }
}
