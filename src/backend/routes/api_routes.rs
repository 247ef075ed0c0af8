/**
 * API Route Handlers
 *
 * ## Messaging
 * - `POST /api/messages` - Send a message
 * - `GET /api/conversations` - Conversations of the caller
 * - `GET /api/conversations/{conversation_id}/messages` - Message history
 *
 * ## Presence
 * - `POST /api/presence` - Heartbeat
 * - `GET /api/presence/{account_id}` - Presence of an account
 *
 * Every route here expects `auth_middleware` to run first.
 */

use axum::routing::{get, post};
use axum::Router;

use crate::backend::messaging::handlers::{list_conversations, list_messages, send_message};
use crate::backend::presence::handlers::{get_presence, post_presence};
use crate::backend::server::state::AppState;

/// Configure API routes
pub fn configure_api_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/messages", post(send_message))
        .route("/api/conversations", get(list_conversations))
        .route(
            "/api/conversations/{conversation_id}/messages",
            get(list_messages),
        )
        .route("/api/presence", post(post_presence))
        .route("/api/presence/{account_id}", get(get_presence))
}
