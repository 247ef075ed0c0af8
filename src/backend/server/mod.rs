//! Server Module
//!
//! - **`state`** - `AppState` and its `FromRef` implementations
//! - **`config`** - Database loading
//! - **`init`** - State assembly, background tasks and app creation

/// Application state management
pub mod state;

/// Server configuration loading
pub mod config;

/// Server initialization
pub mod init;

pub use init::{build_state, create_app, spawn_presence_sweep};
pub use state::{AppState, Stores};
