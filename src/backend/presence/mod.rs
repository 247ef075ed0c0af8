//! Presence Module
//!
//! Online/offline/away tracking per account.
//!
//! - **`store`** - `PresenceStore` trait and the in-memory store
//! - **`db`** - Postgres store
//! - **`tracker`** - `PresenceTracker`, the API the broker and handlers use
//! - **`handlers`** - `POST /api/presence`, `GET /api/presence/{accountId}`
//!
//! The tracker does not count connections itself; the realtime broker owns
//! the per-account live connection count and only calls `set_offline` when
//! it reaches zero.

pub mod db;
pub mod handlers;
pub mod store;
pub mod tracker;

pub use db::PgPresenceStore;
pub use store::{MemoryPresenceStore, PresenceStore};
pub use tracker::PresenceTracker;
