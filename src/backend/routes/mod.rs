//! Route Configuration
//!
//! - `POST /api/messages`
//! - `GET /api/conversations`
//! - `GET /api/conversations/{conversation_id}/messages`
//! - `POST /api/presence`
//! - `GET /api/presence/{account_id}`
//! - `GET /ws` - WebSocket upgrade for realtime events
//!
//! Anything else answers a JSON 404.

/// Main router creation
pub mod router;

/// API endpoint handlers
pub mod api_routes;

pub use router::create_router;
