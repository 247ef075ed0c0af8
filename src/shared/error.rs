//! Shared Error Types
//!
//! This module defines error types that are shared between clients and the
//! server. They describe problems with the shape of data itself, independent
//! of where it is being processed.
//!
//! # Error Categories
//!
//! - `ValidationError` - Data validation failures (field-level)
//!
//! # Usage
//!
//! ```rust
//! use vms_chat::shared::error::SharedError;
//!
//! let error = SharedError::validation("content", "message content cannot be empty");
//! assert!(error.to_string().contains("content"));
//! ```
use thiserror::Error;

/// Shared error types that can occur on either side of the wire
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SharedError {
    /// Data validation error
    #[error("Validation error in field '{field}': {message}")]
    ValidationError {
        /// The field that failed validation
        field: String,
        /// Human-readable error message
        message: String,
    },
}

impl SharedError {
    /// Create a new validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }
}
