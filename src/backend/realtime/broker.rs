/**
 * Realtime Broker
 *
 * Owns the connection registry and the live connection count per account.
 *
 * # Presence
 *
 * An account is online while at least one of its connections is
 * authenticated. The count for an account lives in its own async mutex,
 * held across the presence store call, so a disconnect racing a new
 * connection for the same account always observes the other's increment
 * or decrement. Only the transition to zero marks the account offline.
 *
 * # Delivery
 *
 * `publish` is in-memory and never fails the caller. Events to a connection
 * whose socket is gone are dropped; clients catch up through history.
 */

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc::Receiver;

use crate::backend::auth::SessionGate;
use crate::backend::error::BackendError;
use crate::backend::presence::PresenceTracker;
use crate::backend::realtime::registry::{conversation_room, ConnectionId, ConnectionRegistry};
use crate::shared::messaging::Message;
use crate::shared::time;
use crate::shared::ServerEvent;

type AccountSlot = Arc<tokio::sync::Mutex<usize>>;

struct BrokerInner {
    registry: ConnectionRegistry,
    presence: PresenceTracker,
    session_gate: Arc<dyn SessionGate>,
    live_connections: Mutex<HashMap<String, AccountSlot>>,
}

#[derive(Clone)]
pub struct RealtimeBroker {
    inner: Arc<BrokerInner>,
}

impl RealtimeBroker {
    pub fn new(
        registry: ConnectionRegistry,
        presence: PresenceTracker,
        session_gate: Arc<dyn SessionGate>,
    ) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                registry,
                presence,
                session_gate,
                live_connections: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.inner.registry
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, AccountSlot>> {
        self.inner
            .live_connections
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(&self, account_id: &str) -> AccountSlot {
        self.slots()
            .entry(account_id.to_string())
            .or_default()
            .clone()
    }

    /// Forget the slot of an account with no live connections
    fn prune_slot(&self, account_id: &str, slot: AccountSlot) {
        let mut slots = self.slots();
        // The map and `slot` are the only holders; nobody can be waiting on it.
        if Arc::strong_count(&slot) == 2 {
            if let Ok(count) = slot.try_lock() {
                if *count == 0 {
                    slots.remove(account_id);
                }
            }
        }
    }

    /// Register a new, unauthenticated connection
    pub fn register_connection(
        &self,
    ) -> Result<(ConnectionId, Receiver<ServerEvent>), BackendError> {
        let (connection_id, receiver) = self
            .inner
            .registry
            .register()
            .ok_or_else(|| BackendError::internal("realtime broker is shut down"))?;
        tracing::debug!("[Realtime] Connection {} registered", connection_id);
        Ok((connection_id, receiver))
    }

    /// Verify `token` and bind the connection to its account
    ///
    /// On a verification failure the connection is closed and released, so
    /// an account it was already bound to loses that live connection.
    ///
    /// The binding runs on its own task and completes even if the caller is
    /// dropped, keeping presence and the live count in step.
    pub async fn authenticate_connection(
        &self,
        connection_id: ConnectionId,
        token: &str,
    ) -> Result<String, BackendError> {
        let account_id = match self.inner.session_gate.verify(token).await {
            Ok(account_id) => account_id,
            Err(e) => {
                tracing::warn!("[Realtime] Connection {} failed authentication", connection_id);
                self.inner.registry.send_to(connection_id, e.to_event());
                self.release_connection(connection_id).await;
                return Err(e);
            }
        };

        if let Some(existing) = self.inner.registry.account_of(connection_id) {
            if existing == account_id {
                return Ok(account_id);
            }
            return Err(BackendError::invalid_argument(
                "connection is already authenticated as another account",
            ));
        }

        let broker = self.clone();
        let result = tokio::spawn(async move { broker.bind_connection(connection_id, account_id).await })
            .await
            .map_err(|e| BackendError::internal(format!("authentication task failed: {}", e)))
            .and_then(|result| result);

        if let Ok(account_id) = &result {
            tracing::info!("[Realtime] Connection {} authenticated as {}", connection_id, account_id);
        }
        result
    }

    /// Mark the account online and bind it to the connection
    async fn bind_connection(
        &self,
        connection_id: ConnectionId,
        account_id: String,
    ) -> Result<String, BackendError> {
        let slot = self.slot(&account_id);
        let result = {
            let mut count = slot.lock().await;
            match self.inner.presence.set_online(&account_id).await {
                Err(e) => Err(e),
                Ok(_) if self.inner.registry.bind_account(connection_id, &account_id) => {
                    self.inner.registry.join(connection_id, &account_id);
                    *count += 1;
                    Ok(account_id.clone())
                }
                Ok(_) => {
                    // The connection was released before the binding ran.
                    if *count == 0 {
                        if let Err(e) = self.inner.presence.set_offline(&account_id).await {
                            tracing::error!("[Realtime] Failed to revert presence for {}: {}", account_id, e);
                        }
                    }
                    Err(BackendError::not_found("connection closed"))
                }
            }
        };
        self.prune_slot(&account_id, slot);
        result
    }

    /// Account bound to the connection, if it has authenticated
    pub fn connection_account(&self, connection_id: ConnectionId) -> Option<String> {
        self.inner.registry.account_of(connection_id)
    }

    /// Subscribe the connection to `conv:<conversation_id>`
    ///
    /// No participation check happens here; callers decide who may join.
    pub fn join_conversation(
        &self,
        connection_id: ConnectionId,
        conversation_id: &str,
    ) -> Result<(), BackendError> {
        if !self
            .inner
            .registry
            .join(connection_id, &conversation_room(conversation_id))
        {
            return Err(BackendError::not_found("connection closed"));
        }
        tracing::debug!("[Realtime] Connection {} joined {}", connection_id, conversation_id);
        Ok(())
    }

    pub fn leave_conversation(
        &self,
        connection_id: ConnectionId,
        conversation_id: &str,
    ) -> Result<(), BackendError> {
        if !self
            .inner
            .registry
            .leave(connection_id, &conversation_room(conversation_id))
        {
            return Err(BackendError::not_found("connection closed"));
        }
        tracing::debug!("[Realtime] Connection {} left {}", connection_id, conversation_id);
        Ok(())
    }

    /// Push `messageReceived` to every member of the conversation's room
    pub fn publish(&self, conversation_id: &str, message: &Message) -> usize {
        let event = ServerEvent::MessageReceived {
            conversation_id: conversation_id.to_string(),
            message: message.clone(),
        };
        let delivered = self
            .inner
            .registry
            .broadcast(&conversation_room(conversation_id), &event);
        tracing::debug!(
            "[Realtime] Published message {} to {} connection(s) in {}",
            message.id,
            delivered,
            conversation_id
        );
        delivered
    }

    /// Push an event to every connection of an account
    pub fn notify_account(&self, account_id: &str, event: &ServerEvent) -> usize {
        self.inner.registry.broadcast(account_id, event)
    }

    /// Push an event to a single connection
    pub fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        self.inner.registry.send_to(connection_id, event)
    }

    /// Run the release action of a closed connection
    ///
    /// Idempotent; the account goes offline only when its last live
    /// connection is released.
    pub async fn release_connection(&self, connection_id: ConnectionId) {
        let Some(removed) = self.inner.registry.remove(connection_id) else {
            return;
        };
        tracing::debug!(
            "[Realtime] Connection {} released ({} room(s))",
            connection_id,
            removed.rooms
        );

        let Some(account_id) = removed.account_id else {
            return;
        };

        let slot = self.slot(&account_id);
        {
            let mut count = slot.lock().await;
            *count = count.saturating_sub(1);
            if *count == 0 {
                match self.inner.presence.set_offline(&account_id).await {
                    Ok(_) => tracing::info!("[Realtime] {} has no live connections, now offline", account_id),
                    Err(e) => tracing::error!("[Realtime] Failed to mark {} offline: {}", account_id, e),
                }
            }
        }
        self.prune_slot(&account_id, slot);
    }

    /// Live authenticated connections of an account
    pub async fn account_connection_count(&self, account_id: &str) -> usize {
        let slot = self.slots().get(account_id).cloned();
        match slot {
            Some(slot) => *slot.lock().await,
            None => 0,
        }
    }

    /// Mark idle accounts offline unless they still hold a live connection
    pub async fn sweep_idle_presence(&self, idle_timeout: Duration) -> Result<usize, BackendError> {
        let idle_timeout = chrono::Duration::from_std(idle_timeout)
            .map_err(|e| BackendError::internal(format!("invalid idle timeout: {}", e)))?;
        let cutoff = time::now() - idle_timeout;

        let mut expired = 0;
        for account_id in self.inner.presence.stale_online(cutoff).await? {
            let slot = self.slot(&account_id);
            let result = {
                let count = slot.lock().await;
                if *count == 0 {
                    self.inner.presence.expire_idle(&account_id, cutoff).await
                } else {
                    Ok(false)
                }
            };
            self.prune_slot(&account_id, slot);
            if result? {
                expired += 1;
            }
        }
        Ok(expired)
    }

    /// Close the registry and release every live connection
    pub async fn shutdown(&self) -> usize {
        let connections = self.inner.registry.close();
        let count = connections.len();
        for connection_id in connections {
            self.release_connection(connection_id).await;
        }
        tracing::info!("[Realtime] Broker shut down, released {} connection(s)", count);
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::auth::{create_token, JwtSessionGate};
    use crate::backend::presence::MemoryPresenceStore;
    use assert_matches::assert_matches;
    use futures_util::FutureExt;

    const SECRET: &str = "broker-secret";

    fn broker() -> RealtimeBroker {
        RealtimeBroker::new(
            ConnectionRegistry::new(),
            PresenceTracker::new(Arc::new(MemoryPresenceStore::new())),
            Arc::new(JwtSessionGate::new(SECRET)),
        )
    }

    fn token(account_id: &str) -> String {
        create_token(SECRET, account_id, chrono::Duration::hours(1)).unwrap()
    }

    #[tokio::test]
    async fn test_failed_authentication_closes_connection() {
        let broker = broker();
        let (connection, mut events) = broker.register_connection().unwrap();

        let result = broker.authenticate_connection(connection, "garbage").await;
        assert_matches!(result, Err(BackendError::Unauthorized { .. }));
        assert_matches!(events.recv().await, Some(ServerEvent::Error { status: 401, .. }));
        assert!(events.recv().await.is_none());
        assert_eq!(broker.registry().connection_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_reauthentication_releases_account() {
        let broker = broker();
        let (connection, _events) = broker.register_connection().unwrap();
        broker.authenticate_connection(connection, &token("alice")).await.unwrap();
        assert_eq!(broker.account_connection_count("alice").await, 1);

        let result = broker.authenticate_connection(connection, "garbage").await;
        assert_matches!(result, Err(BackendError::Unauthorized { .. }));
        assert!(!broker.registry().contains(connection));
        assert_eq!(broker.account_connection_count("alice").await, 0);
        assert!(!broker.inner.presence.get("alice").await.unwrap().online);

        // The socket loop releases again on close; nothing changes.
        broker.release_connection(connection).await;
        assert_eq!(broker.account_connection_count("alice").await, 0);
    }

    #[tokio::test]
    async fn test_dropped_authentication_still_completes() {
        let broker = broker();
        let (connection, _events) = broker.register_connection().unwrap();

        // Polled once, then dropped while the binding is pending.
        let pending = broker
            .authenticate_connection(connection, &token("alice"))
            .now_or_never();
        assert!(pending.is_none());

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(broker.connection_account(connection).as_deref(), Some("alice"));
        assert_eq!(broker.account_connection_count("alice").await, 1);

        broker.release_connection(connection).await;
        assert!(!broker.inner.presence.get("alice").await.unwrap().online);
    }

    #[tokio::test]
    async fn test_release_during_dropped_authentication_leaves_account_offline() {
        let broker = broker();
        let (connection, _events) = broker.register_connection().unwrap();

        let pending = broker
            .authenticate_connection(connection, &token("alice"))
            .now_or_never();
        assert!(pending.is_none());
        broker.release_connection(connection).await;

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(broker.account_connection_count("alice").await, 0);
        assert!(!broker.inner.presence.get("alice").await.unwrap().online);
    }

    #[tokio::test]
    async fn test_authentication_joins_personal_room() {
        let broker = broker();
        let (connection, mut events) = broker.register_connection().unwrap();
        let account = broker
            .authenticate_connection(connection, &token("alice"))
            .await
            .unwrap();
        assert_eq!(account, "alice");
        assert_eq!(broker.account_connection_count("alice").await, 1);

        let event = ServerEvent::error(400, "ping");
        assert_eq!(broker.notify_account("alice", &event), 1);
        assert_eq!(events.recv().await, Some(event));
    }

    #[tokio::test]
    async fn test_reauthenticating_same_account_is_noop() {
        let broker = broker();
        let (connection, _events) = broker.register_connection().unwrap();
        broker.authenticate_connection(connection, &token("alice")).await.unwrap();
        broker.authenticate_connection(connection, &token("alice")).await.unwrap();
        assert_eq!(broker.account_connection_count("alice").await, 1);

        assert_matches!(
            broker.authenticate_connection(connection, &token("bob")).await,
            Err(BackendError::InvalidArgument { .. })
        );
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let broker = broker();
        let (connection, _events) = broker.register_connection().unwrap();
        broker.authenticate_connection(connection, &token("alice")).await.unwrap();

        broker.release_connection(connection).await;
        broker.release_connection(connection).await;
        assert_eq!(broker.account_connection_count("alice").await, 0);
        assert!(!broker.inner.presence.get("alice").await.unwrap().online);
    }

    #[tokio::test]
    async fn test_sweep_skips_connected_accounts() {
        let broker = broker();
        let (connection, _events) = broker.register_connection().unwrap();
        broker.authenticate_connection(connection, &token("alice")).await.unwrap();
        broker
            .inner
            .presence
            .heartbeat("bob", Default::default())
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        let expired = broker.sweep_idle_presence(Duration::ZERO).await.unwrap();
        assert_eq!(expired, 1);
        assert!(broker.inner.presence.get("alice").await.unwrap().online);
        assert!(!broker.inner.presence.get("bob").await.unwrap().online);
    }
}
