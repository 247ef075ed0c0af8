//! Backend Module
//!
//! - **`server`** - Application state, database loading, initialization
//! - **`routes`** - Router assembly
//! - **`auth`** - Session Gate (JWT verification)
//! - **`middleware`** - Bearer-token authentication for API routes
//! - **`messaging`** - Identity Resolver, Message Store, Conversation
//!   Directory and the send/history service
//! - **`presence`** - Presence Tracker and its stores
//! - **`realtime`** - Connection registry, Realtime Broker, WebSocket endpoint
//! - **`error`** - `BackendError` and its HTTP mapping

/// Server initialization and state
pub mod server;

/// Route configuration
pub mod routes;

/// Backend error types
pub mod error;

/// Session verification
pub mod auth;

/// Middleware for request processing
pub mod middleware;

/// Messages and conversations
pub mod messaging;

/// Online/offline tracking
pub mod presence;

/// Realtime connections and rooms
pub mod realtime;

pub use error::BackendError;
pub use server::{create_app, AppState};
