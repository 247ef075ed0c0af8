//! Presence storage
//!
//! A `PresenceStore` applies one `PresenceMutation` atomically per call, so
//! the tracker never has to read-modify-write across an await point.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::backend::error::BackendError;
use crate::shared::messaging::{PresenceMutation, PresenceRecord};

#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Apply `mutation` to the account's record, creating it lazily
    async fn apply(
        &self,
        account_id: &str,
        mutation: &PresenceMutation,
        at: DateTime<Utc>,
    ) -> Result<PresenceRecord, BackendError>;

    async fn get(&self, account_id: &str) -> Result<Option<PresenceRecord>, BackendError>;

    /// Accounts that are online but have not been active since `cutoff`
    async fn stale_online(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, BackendError>;

    /// Mark the account offline if it is still online and idle since `cutoff`
    ///
    /// Returns the updated record, or `None` when the record was left alone.
    async fn expire(
        &self,
        account_id: &str,
        cutoff: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<Option<PresenceRecord>, BackendError>;
}

/// In-memory presence store
#[derive(Default)]
pub struct MemoryPresenceStore {
    records: RwLock<HashMap<String, PresenceRecord>>,
}

impl MemoryPresenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn apply(
        &self,
        account_id: &str,
        mutation: &PresenceMutation,
        at: DateTime<Utc>,
    ) -> Result<PresenceRecord, BackendError> {
        let mut records = self.records.write().await;
        let record = records
            .entry(account_id.to_string())
            .or_insert_with(|| PresenceRecord::offline(account_id, at));
        record.apply(mutation, at);
        Ok(record.clone())
    }

    async fn get(&self, account_id: &str) -> Result<Option<PresenceRecord>, BackendError> {
        Ok(self.records.read().await.get(account_id).cloned())
    }

    async fn stale_online(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, BackendError> {
        let records = self.records.read().await;
        let mut stale: Vec<String> = records
            .values()
            .filter(|record| record.online && record.last_active_at < cutoff)
            .map(|record| record.account_id.clone())
            .collect();
        stale.sort();
        Ok(stale)
    }

    async fn expire(
        &self,
        account_id: &str,
        cutoff: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> Result<Option<PresenceRecord>, BackendError> {
        let mut records = self.records.write().await;
        match records.get_mut(account_id) {
            Some(record) if record.online && record.last_active_at < cutoff => {
                record.apply(&PresenceMutation::Offline, at);
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }
}
