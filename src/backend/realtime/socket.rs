/**
 * Realtime WebSocket Endpoint
 *
 * `GET /ws` upgrades to a WebSocket carrying JSON `ClientEvent` /
 * `ServerEvent` text frames. Each socket is split into a writer task that
 * drains the connection's outbound queue and a reader loop that dispatches
 * client events. Whichever side ends first ends the other, and the broker
 * then runs the connection's release action.
 */

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;

use crate::backend::error::BackendError;
use crate::backend::realtime::registry::ConnectionId;
use crate::backend::server::state::AppState;
use crate::shared::{ClientEvent, ServerEvent};

const WRITER_FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// What the reader loop does after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketFlow {
    Continue,
    Close,
}

/// GET /ws
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (connection_id, mut events) = match state.broker.register_connection() {
        Ok(registered) => registered,
        Err(e) => {
            tracing::warn!("[Realtime] Refusing socket: {}", e);
            return;
        }
    };
    let (mut sender, mut receiver) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!("[Realtime] Failed to encode {} event: {}", event.name(), e);
                    continue;
                }
            };
            if sender.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sender.send(WsMessage::Close(None)).await;
    });

    let reader_state = state.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(frame)) = receiver.next().await {
            let flow = match frame {
                WsMessage::Text(text) => handle_frame(&reader_state, connection_id, text.as_str()).await,
                WsMessage::Close(_) => SocketFlow::Close,
                _ => SocketFlow::Continue,
            };
            if flow == SocketFlow::Close {
                break;
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => {
            // Removing the connection ends the writer once its queue is flushed.
            state.broker.release_connection(connection_id).await;
            if tokio::time::timeout(WRITER_FLUSH_TIMEOUT, &mut writer).await.is_err() {
                writer.abort();
            }
        }
    }

    state.broker.release_connection(connection_id).await;
}

/// Decode one text frame and dispatch it
pub async fn handle_frame(state: &AppState, connection_id: ConnectionId, text: &str) -> SocketFlow {
    match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => handle_client_event(state, connection_id, event).await,
        Err(e) => {
            tracing::debug!("[Realtime] Bad frame from {}: {}", connection_id, e);
            state.broker.send_to(
                connection_id,
                BackendError::invalid_argument(format!("malformed event: {}", e)).to_event(),
            );
            SocketFlow::Continue
        }
    }
}

fn require_account(state: &AppState, connection_id: ConnectionId) -> Result<String, BackendError> {
    state
        .broker
        .connection_account(connection_id)
        .ok_or_else(|| BackendError::unauthorized("connection is not authenticated"))
}

/// Dispatch one client event
///
/// Rejected events answer with an `error` event; only a failed
/// `authenticate` ends the connection.
pub async fn handle_client_event(
    state: &AppState,
    connection_id: ConnectionId,
    event: ClientEvent,
) -> SocketFlow {
    let result = match event {
        ClientEvent::Authenticate { token } => {
            match state.broker.authenticate_connection(connection_id, &token).await {
                Ok(account_id) => Ok(ServerEvent::Authenticated { account_id }),
                Err(BackendError::Unauthorized { .. }) => return SocketFlow::Close,
                Err(e) => Err(e),
            }
        }
        ClientEvent::JoinConversation { conversation_id } => {
            join(state, connection_id, conversation_id).await
        }
        ClientEvent::LeaveConversation { conversation_id } => state
            .broker
            .leave_conversation(connection_id, &conversation_id)
            .map(|_| ServerEvent::Left { conversation_id }),
        ClientEvent::SendMessage(request) => match require_account(state, connection_id) {
            Ok(account_id) => state.messaging.send(&account_id, request).await.map(|sent| {
                ServerEvent::MessageSent {
                    conversation_id: sent.conversation_id,
                    message: sent.message,
                    degraded: sent.degraded,
                }
            }),
            Err(e) => Err(e),
        },
        ClientEvent::Heartbeat(update) => match require_account(state, connection_id) {
            Ok(account_id) => match state.presence.heartbeat(&account_id, update).await {
                Ok(_) => return SocketFlow::Continue,
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        },
    };

    let reply = result.unwrap_or_else(|e| e.to_event());
    state.broker.send_to(connection_id, reply);
    SocketFlow::Continue
}

async fn join(
    state: &AppState,
    connection_id: ConnectionId,
    conversation_id: String,
) -> Result<ServerEvent, BackendError> {
    if state.messaging.config().enforce_participation {
        let account_id = require_account(state, connection_id)?;
        state
            .messaging
            .authorize_access(&account_id, &conversation_id)
            .await?;
    }
    state
        .broker
        .join_conversation(connection_id, &conversation_id)?;
    Ok(ServerEvent::Joined { conversation_id })
}
