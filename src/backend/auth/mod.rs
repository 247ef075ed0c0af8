//! Authentication Module
//!
//! The Session Gate: turns a bearer credential into an account id.
//!
//! # Module Structure
//!
//! ```text
//! auth/
//! ├── mod.rs          - Module exports and documentation
//! └── sessions.rs     - SessionGate trait, JWT implementation, token issuing
//! ```
//!
//! Account registration, login and password hashing are handled by a
//! separate service that issues tokens with the same shared secret.

/// JWT token generation and validation
pub mod sessions;

pub use sessions::{create_token, Claims, JwtSessionGate, SessionGate};
