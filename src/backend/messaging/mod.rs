//! Messaging Module
//!
//! Direct messaging: conversation identity, message history and the
//! send/read service behind the HTTP and realtime endpoints.
//!
//! - **`identity`** - Identity Resolver (`resolve(a, b)`)
//! - **`store`** - `MessageStore` trait and in-memory store
//! - **`directory`** - `ConversationDirectory` trait and in-memory directory
//! - **`db`** - Postgres implementations of both
//! - **`service`** - `MessagingService`: append, touch, publish
//! - **`handlers`** - HTTP handlers

pub mod db;
pub mod directory;
pub mod handlers;
pub mod identity;
pub mod service;
pub mod store;

pub use db::{PgConversationDirectory, PgMessageStore};
pub use directory::{ConversationDirectory, MemoryConversationDirectory};
pub use service::MessagingService;
pub use store::{MemoryMessageStore, MessageStore};
