//! Backend Error Module
//!
//! This module defines error types specific to the backend server.
//! These errors are used by stores, services and HTTP handlers and can be
//! converted to HTTP responses or realtime `error` events.
//!
//! # Module Structure
//!
//! ```text
//! error/
//! ├── mod.rs        - Module exports and documentation
//! ├── types.rs      - Error type definitions
//! └── conversion.rs - Error conversion implementations
//! ```
//!
//! # Error Types
//!
//! - `InvalidArgument` - 400, nothing was mutated
//! - `Unauthorized` - 401
//! - `NotFound` - 404
//! - `Store` / `Database` / `Internal` - 500 with an opaque body
//! - `SharedError` - validation errors from the shared module (400)

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

// Re-export commonly used types
pub use conversion::not_found_fallback;
pub use types::{BackendError, INTERNAL_ERROR_MESSAGE};
