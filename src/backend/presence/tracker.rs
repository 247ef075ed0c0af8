//! Presence Tracker
//!
//! State machine per account: `unknown -> offline -> online <-> away -> offline`.
//! `offline` only comes from connection loss (driven by the broker's live
//! connection count) or from the idle sweep. Every mutation refreshes
//! `lastActiveAt`.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::backend::error::BackendError;
use crate::backend::presence::store::PresenceStore;
use crate::shared::messaging::{PresenceMutation, PresenceRecord, PresenceUpdate};
use crate::shared::time;

#[derive(Clone)]
pub struct PresenceTracker {
    store: Arc<dyn PresenceStore>,
}

impl PresenceTracker {
    pub fn new(store: Arc<dyn PresenceStore>) -> Self {
        Self { store }
    }

    pub async fn set_online(&self, account_id: &str) -> Result<PresenceRecord, BackendError> {
        let record = self
            .store
            .apply(account_id, &PresenceMutation::Online, time::now())
            .await?;
        tracing::debug!("[Presence] {} is online", account_id);
        Ok(record)
    }

    pub async fn set_offline(&self, account_id: &str) -> Result<PresenceRecord, BackendError> {
        let record = self
            .store
            .apply(account_id, &PresenceMutation::Offline, time::now())
            .await?;
        tracing::debug!("[Presence] {} is offline", account_id);
        Ok(record)
    }

    /// Refresh the account and merge the provided status fields
    pub async fn heartbeat(
        &self,
        account_id: &str,
        update: PresenceUpdate,
    ) -> Result<PresenceRecord, BackendError> {
        update.validate()?;
        self.store
            .apply(account_id, &PresenceMutation::Heartbeat(update), time::now())
            .await
    }

    pub async fn get(&self, account_id: &str) -> Result<PresenceRecord, BackendError> {
        self.store
            .get(account_id)
            .await?
            .ok_or_else(|| BackendError::not_found(format!("no presence for account '{}'", account_id)))
    }

    pub async fn stale_online(&self, cutoff: DateTime<Utc>) -> Result<Vec<String>, BackendError> {
        self.store.stale_online(cutoff).await
    }

    /// Mark the account offline if it is still idle since `cutoff`
    pub async fn expire_idle(
        &self,
        account_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<bool, BackendError> {
        let expired = self.store.expire(account_id, cutoff, time::now()).await?;
        if expired.is_some() {
            tracing::info!("[Presence] {} went idle, marked offline", account_id);
        }
        Ok(expired.is_some())
    }
}
