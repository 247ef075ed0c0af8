/**
 * Application State Management
 *
 * `AppState` is the central container handed to every Axum handler. It owns
 * the messaging service, the presence tracker, the realtime broker and the
 * session gate, plus the optional Postgres pool they were built from.
 *
 * The `FromRef` implementations let handlers extract just the piece they
 * need, e.g. `State(service): State<MessagingService>`.
 */

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::backend::auth::{JwtSessionGate, SessionGate};
use crate::backend::messaging::{
    ConversationDirectory, MemoryConversationDirectory, MemoryMessageStore, MessageStore,
    MessagingService, PgConversationDirectory, PgMessageStore,
};
use crate::backend::presence::{MemoryPresenceStore, PgPresenceStore, PresenceStore, PresenceTracker};
use crate::backend::realtime::{ConnectionRegistry, RealtimeBroker};
use crate::shared::AppConfig;

/// The storage backends a state is assembled from
pub struct Stores {
    pub messages: Arc<dyn MessageStore>,
    pub conversations: Arc<dyn ConversationDirectory>,
    pub presence: Arc<dyn PresenceStore>,
}

impl Stores {
    pub fn in_memory() -> Self {
        Self {
            messages: Arc::new(MemoryMessageStore::new()),
            conversations: Arc::new(MemoryConversationDirectory::new()),
            presence: Arc::new(MemoryPresenceStore::new()),
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            messages: Arc::new(PgMessageStore::new(pool.clone())),
            conversations: Arc::new(PgConversationDirectory::new(pool.clone())),
            presence: Arc::new(PgPresenceStore::new(pool)),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub messaging: MessagingService,
    pub presence: PresenceTracker,
    pub broker: RealtimeBroker,
    pub session_gate: Arc<dyn SessionGate>,
    /// `None` when running on in-memory stores
    pub db_pool: Option<PgPool>,
}

impl AppState {
    /// Wire the services together on top of `stores`
    pub fn from_stores(config: AppConfig, stores: Stores, db_pool: Option<PgPool>) -> Self {
        let session_gate: Arc<dyn SessionGate> = Arc::new(JwtSessionGate::new(&config.jwt_secret));
        Self::with_session_gate(config, stores, session_gate, db_pool)
    }

    pub fn with_session_gate(
        config: AppConfig,
        stores: Stores,
        session_gate: Arc<dyn SessionGate>,
        db_pool: Option<PgPool>,
    ) -> Self {
        let presence = PresenceTracker::new(stores.presence);
        let broker = RealtimeBroker::new(
            ConnectionRegistry::new(),
            presence.clone(),
            session_gate.clone(),
        );
        let messaging = MessagingService::new(
            stores.messages,
            stores.conversations,
            broker.clone(),
            config.messaging.clone(),
        );

        Self {
            config: Arc::new(config),
            messaging,
            presence,
            broker,
            session_gate,
            db_pool,
        }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        Self::from_stores(config, Stores::in_memory(), None)
    }
}

impl FromRef<AppState> for MessagingService {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.messaging.clone()
    }
}

impl FromRef<AppState> for PresenceTracker {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.presence.clone()
    }
}

impl FromRef<AppState> for RealtimeBroker {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.broker.clone()
    }
}

impl FromRef<AppState> for Arc<dyn SessionGate> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.session_gate.clone()
    }
}

impl FromRef<AppState> for Option<PgPool> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.db_pool.clone()
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.config.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_state_shares_one_broker() {
        let state = AppState::in_memory(AppConfig::builder().jwt_secret("secret").build().unwrap());
        assert!(state.db_pool.is_none());
        let extracted = RealtimeBroker::from_ref(&state);
        let (connection_id, _events) = extracted.register_connection().unwrap();
        assert!(state.broker.registry().contains(connection_id));
    }
}
