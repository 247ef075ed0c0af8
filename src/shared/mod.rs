//! Shared Module
//!
//! This module contains types and data structures that are shared between
//! clients and the server. They travel as JSON over the HTTP API and the
//! realtime WebSocket channel.
//!
//! # Overview
//!
//! Nothing in here performs I/O. Stores, the broker and the HTTP layer all
//! live in `backend` and build on these types.

/// Realtime event protocol
pub mod event;

/// Shared error types
pub mod error;

/// Application configuration
pub mod config;

/// Messaging types: messages, conversations, presence
pub mod messaging;

/// Timestamp helpers
pub mod time;

/// Re-export commonly used types for convenience
pub use config::{AppConfig, AppConfigBuilder, ConfigError};
pub use error::SharedError;
pub use event::{ClientEvent, ServerEvent};
