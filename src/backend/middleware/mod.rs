//! Middleware Module
//!
//! HTTP middleware for the backend server.
//!
//! - **`auth`** - Bearer-token authentication for `/api` routes

pub mod auth;

pub use auth::{auth_middleware, bearer_token, AuthUser, AuthenticatedAccount};
