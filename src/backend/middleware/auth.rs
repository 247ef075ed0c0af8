/**
 * Authentication Middleware
 *
 * This module provides middleware for protecting routes that require an
 * authenticated account. It extracts the bearer token from the
 * Authorization header, verifies it through the Session Gate and provides
 * the account id to handlers.
 */

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use crate::backend::error::BackendError;
use crate::backend::server::state::AppState;

/// Authenticated account extracted from the session token
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedAccount {
    pub account_id: String,
}

/// Pull the token out of a `Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware
///
/// This middleware:
/// 1. Extracts the token from the Authorization header
/// 2. Verifies it with the Session Gate
/// 3. Attaches the account to request extensions for use in handlers
///
/// Returns 401 Unauthorized if the token is missing or invalid
pub async fn auth_middleware(
    State(app_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, BackendError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("Missing Authorization header");
            BackendError::unauthorized("missing Authorization header")
        })?;

    let token = bearer_token(auth_header).ok_or_else(|| {
        tracing::warn!("Invalid Authorization header format");
        BackendError::unauthorized("expected a Bearer token")
    })?;

    let account_id = app_state.session_gate.verify(token).await?;

    request
        .extensions_mut()
        .insert(AuthenticatedAccount { account_id });

    Ok(next.run(request).await)
}

/// Axum extractor for the authenticated account
///
/// Only valid on routes behind `auth_middleware`.
#[derive(Clone, Debug)]
pub struct AuthUser(pub AuthenticatedAccount);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = BackendError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let account = parts
            .extensions
            .get::<AuthenticatedAccount>()
            .cloned()
            .ok_or_else(|| {
                tracing::warn!("AuthenticatedAccount not found in request extensions");
                BackendError::unauthorized("not authenticated")
            })?;

        Ok(AuthUser(account))
    }
}
