//! Real-time Module
//!
//! Room-based push over WebSockets.
//!
//! # Module Structure
//!
//! ```text
//! realtime/
//! ├── mod.rs       - Module exports and documentation
//! ├── registry.rs  - Connections, rooms, fan-out
//! ├── broker.rs    - Authentication, live connection counts, publish
//! └── socket.rs    - GET /ws and client event dispatch
//! ```
//!
//! # Events
//!
//! Client: `authenticate`, `joinConversation`, `leaveConversation`,
//! `sendMessage`, `heartbeat`.
//!
//! Server: `authenticated`, `joined`, `left`, `messageReceived`,
//! `messageSent`, `conversationUpdated`, `error`.

pub mod broker;
pub mod registry;
pub mod socket;

pub use broker::RealtimeBroker;
pub use registry::{conversation_room, ConnectionId, ConnectionRegistry};
pub use socket::{handle_client_event, handle_frame, ws_handler, SocketFlow};
