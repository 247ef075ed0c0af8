/**
 * Backend Error Types
 *
 * This module defines the error taxonomy of the backend server. The same
 * type is returned by stores, the messaging service, the presence tracker
 * and the realtime broker, and is converted to an HTTP response (or a
 * realtime `error` event) at the edge.
 *
 * # Error Categories
 *
 * ## Client Errors
 *
 * - `InvalidArgument` - empty content, malformed ids or cursors, self-messaging
 * - `NotFound` - unknown conversation or presence record
 * - `Unauthorized` - missing or invalid session credential
 *
 * ## Server Errors
 *
 * - `Store` - a store rejected or failed an operation
 * - `Database` - a Postgres error surfaced by sqlx
 * - `Internal` - anything else; detail is logged, never returned
 */

use thiserror::Error;
use axum::http::StatusCode;
use crate::shared::SharedError;

/// Message returned to clients for every 5xx error
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Backend-specific error types
///
/// # Usage
///
/// ```rust
/// use vms_chat::backend::error::BackendError;
///
/// let err = BackendError::invalid_argument("message content cannot be empty");
/// assert_eq!(err.status_code().as_u16(), 400);
///
/// let err = BackendError::store("connection reset");
/// assert_eq!(err.message(), "internal server error");
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request is malformed; nothing was mutated
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        message: String,
    },

    /// A referenced conversation or account record does not exist
    #[error("Not found: {message}")]
    NotFound {
        message: String,
    },

    /// Credential verification failed
    #[error("Unauthorized: {message}")]
    Unauthorized {
        message: String,
    },

    /// A store failed to complete an operation
    #[error("Store error: {message}")]
    Store {
        message: String,
    },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unexpected internal failure
    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },

    /// Shared error (from shared module)
    #[error(transparent)]
    SharedError(#[from] SharedError),
}

impl BackendError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    ///
    /// # Status Code Mapping
    ///
    /// - `InvalidArgument`, `SharedError::ValidationError` - 400 Bad Request
    /// - `Unauthorized` - 401 Unauthorized
    /// - `NotFound` - 404 Not Found
    /// - everything else - 500 Internal Server Error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Store { .. } | Self::Database(_) | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::SharedError(err) => match err {
                SharedError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            },
        }
    }

    /// Get the message that is safe to return to a client
    ///
    /// Server errors collapse to an opaque message.
    pub fn message(&self) -> String {
        if self.status_code().is_server_error() {
            return INTERNAL_ERROR_MESSAGE.to_string();
        }
        match self {
            Self::InvalidArgument { message }
            | Self::NotFound { message }
            | Self::Unauthorized { message } => message.clone(),
            other => other.to_string(),
        }
    }
}
