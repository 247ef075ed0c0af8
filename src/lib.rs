//! vms-chat - Realtime Conversations and Presence
//!
//! Backend for direct messaging between accounts: stable conversation ids,
//! ordered and paginated history, room-based fan-out of new messages over
//! WebSockets, and online/offline presence that follows live connections.
//!
//! # Module Structure
//!
//! - **`shared`** - Wire and data types: messages, conversations, presence
//!   records, realtime events, configuration, validation errors
//! - **`backend`** - Axum server: stores, services, realtime broker, routes
//!
//! # Usage
//!
//! ```rust,no_run
//! use vms_chat::backend::server::create_app;
//! use vms_chat::shared::AppConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::from_env()?;
//! let (app, state) = create_app(config).await;
//! let listener = tokio::net::TcpListener::bind(state.config.bind_address()).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Without `DATABASE_URL` every store runs in memory.

/// Shared types and data structures
pub mod shared;

/// Backend server-side code
pub mod backend;
