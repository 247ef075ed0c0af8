/**
 * Error Conversion
 *
 * This module provides conversion implementations for backend errors,
 * allowing them to be converted to HTTP responses and other formats.
 *
 * # Response Format
 *
 * Error responses are returned as JSON with the following structure:
 * ```json
 * {
 *   "error": "Error message",
 *   "status": 400
 * }
 * ```
 *
 * Axum extractor rejections are folded into `InvalidArgument` so malformed
 * bodies, queries and paths all answer 400 in the same shape.
 */

use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    response::{IntoResponse, Response},
    Json,
};
use crate::backend::error::types::BackendError;
use crate::shared::ServerEvent;

impl IntoResponse for BackendError {
    /// Convert a backend error into an HTTP response
    ///
    /// Server errors are logged with their full detail before the opaque
    /// body is produced.
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected ({}): {}", status.as_u16(), self);
        }

        let body = serde_json::json!({
            "error": self.message(),
            "status": status.as_u16(),
        });

        (status, Json(body)).into_response()
    }
}

impl BackendError {
    /// Convert into the realtime `error` event for a rejected client event
    pub fn to_event(&self) -> ServerEvent {
        if self.status_code().is_server_error() {
            tracing::error!("[Realtime] Event failed: {}", self);
        }
        ServerEvent::error(self.status_code().as_u16(), self.message())
    }
}

impl From<JsonRejection> for BackendError {
    fn from(rejection: JsonRejection) -> Self {
        BackendError::invalid_argument(rejection.body_text())
    }
}

impl From<QueryRejection> for BackendError {
    fn from(rejection: QueryRejection) -> Self {
        BackendError::invalid_argument(rejection.body_text())
    }
}

impl From<PathRejection> for BackendError {
    fn from(rejection: PathRejection) -> Self {
        BackendError::invalid_argument(rejection.body_text())
    }
}

/// Fallback handler for unknown routes
pub async fn not_found_fallback() -> BackendError {
    BackendError::not_found("route not found")
}
