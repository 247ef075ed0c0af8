/**
 * Connection Registry
 *
 * Process-scoped registry of live realtime connections and the rooms they
 * have joined. It is created with the application state and closed on
 * shutdown; nothing reaches it except through the `RealtimeBroker`.
 *
 * # Rooms
 *
 * - `conv:<conversationId>` - members receive `messageReceived`
 * - `<accountId>` - personal room, joined on authentication
 *
 * Account ids never contain `:`, so the two kinds cannot collide.
 *
 * # Locking
 *
 * All state sits behind one `std::sync::Mutex`. Nothing awaits while it is
 * held, and broadcasting under the lock keeps delivery order per room equal
 * to publish order.
 *
 * # Backpressure
 *
 * Each connection has a bounded outbound queue. Enqueueing never waits: an
 * event for a connection whose queue is full is dropped for that connection.
 */

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{channel, Receiver, Sender};
use uuid::Uuid;

use crate::shared::ServerEvent;

/// Events a connection may have queued before further ones are dropped
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Prefix of conversation room names
pub const CONVERSATION_ROOM_PREFIX: &str = "conv:";

/// Room that receives the events of a conversation
pub fn conversation_room(conversation_id: &str) -> String {
    format!("{}{}", CONVERSATION_ROOM_PREFIX, conversation_id)
}

/// Unique identifier for a realtime connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

struct Connection {
    sender: Sender<ServerEvent>,
    account_id: Option<String>,
    rooms: HashSet<String>,
}

impl Connection {
    fn deliver(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("[Realtime] Outbound queue of {} is full, dropping event", connection_id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<ConnectionId, Connection>,
    rooms: HashMap<String, Vec<ConnectionId>>,
    closed: bool,
}

impl RegistryInner {
    fn leave_room(&mut self, connection_id: ConnectionId, room: &str) {
        if let Some(members) = self.rooms.get_mut(room) {
            members.retain(|member| *member != connection_id);
            if members.is_empty() {
                self.rooms.remove(room);
            }
        }
    }
}

/// A connection removed from the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedConnection {
    pub account_id: Option<String>,
    pub rooms: usize,
}

#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<Mutex<RegistryInner>>,
    queue_capacity: usize,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::with_capacity(OUTBOUND_QUEUE_CAPACITY)
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose connections queue at most `queue_capacity` events
    pub fn with_capacity(queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(RegistryInner::default())),
            queue_capacity: queue_capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a connection; `None` once the registry has been closed
    pub fn register(&self) -> Option<(ConnectionId, Receiver<ServerEvent>)> {
        let mut inner = self.lock();
        if inner.closed {
            return None;
        }
        let (sender, receiver) = channel(self.queue_capacity);
        let connection_id = ConnectionId::new();
        inner.connections.insert(
            connection_id,
            Connection {
                sender,
                account_id: None,
                rooms: HashSet::new(),
            },
        );
        Some((connection_id, receiver))
    }

    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.lock().connections.contains_key(&connection_id)
    }

    /// Bind an account to the connection; false if the connection is gone
    pub fn bind_account(&self, connection_id: ConnectionId, account_id: &str) -> bool {
        match self.lock().connections.get_mut(&connection_id) {
            Some(connection) => {
                connection.account_id = Some(account_id.to_string());
                true
            }
            None => false,
        }
    }

    pub fn account_of(&self, connection_id: ConnectionId) -> Option<String> {
        self.lock()
            .connections
            .get(&connection_id)
            .and_then(|connection| connection.account_id.clone())
    }

    /// Join a room; false if the connection is gone
    pub fn join(&self, connection_id: ConnectionId, room: &str) -> bool {
        let mut inner = self.lock();
        let Some(connection) = inner.connections.get_mut(&connection_id) else {
            return false;
        };
        if connection.rooms.insert(room.to_string()) {
            inner
                .rooms
                .entry(room.to_string())
                .or_default()
                .push(connection_id);
        }
        true
    }

    /// Leave a room; false if the connection is gone
    pub fn leave(&self, connection_id: ConnectionId, room: &str) -> bool {
        let mut inner = self.lock();
        let Some(connection) = inner.connections.get_mut(&connection_id) else {
            return false;
        };
        if connection.rooms.remove(room) {
            inner.leave_room(connection_id, room);
        }
        true
    }

    /// Deliver `event` to every member of `room`; returns how many accepted it
    pub fn broadcast(&self, room: &str, event: &ServerEvent) -> usize {
        let inner = self.lock();
        let Some(members) = inner.rooms.get(room) else {
            return 0;
        };
        members
            .iter()
            .filter_map(|member| inner.connections.get(member).map(|connection| (*member, connection)))
            .filter(|(member, connection)| connection.deliver(*member, event.clone()))
            .count()
    }

    /// Deliver `event` to one connection
    pub fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        self.lock()
            .connections
            .get(&connection_id)
            .map(|connection| connection.deliver(connection_id, event))
            .unwrap_or(false)
    }

    /// Drop the connection and all its memberships
    ///
    /// Dropping the sender ends the connection's outbound stream, which closes
    /// the socket once queued events are flushed.
    pub fn remove(&self, connection_id: ConnectionId) -> Option<RemovedConnection> {
        let mut inner = self.lock();
        let connection = inner.connections.remove(&connection_id)?;
        for room in &connection.rooms {
            inner.leave_room(connection_id, room);
        }
        Some(RemovedConnection {
            account_id: connection.account_id,
            rooms: connection.rooms.len(),
        })
    }

    /// Refuse new connections and return every live one
    pub fn close(&self) -> Vec<ConnectionId> {
        let mut inner = self.lock();
        inner.closed = true;
        inner.connections.keys().copied().collect()
    }

    pub fn connection_count(&self) -> usize {
        self.lock().connections.len()
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.lock().rooms.get(room).map(Vec::len).unwrap_or(0)
    }

    pub fn room_count(&self) -> usize {
        self.lock().rooms.len()
    }
}
