//! HTTP handlers for messaging

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};

use crate::backend::error::BackendError;
use crate::backend::messaging::MessagingService;
use crate::backend::middleware::AuthUser;
use crate::shared::messaging::{
    ListConversationsResponse, ListMessagesQuery, ListMessagesResponse, SendMessageRequest,
    SendMessageResponse,
};

/// POST /api/messages
///
/// Returns 201 with the stored message. `degraded` is set when the
/// conversation metadata could not be updated.
pub async fn send_message(
    State(messaging): State<MessagingService>,
    AuthUser(account): AuthUser,
    body: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SendMessageResponse>), BackendError> {
    let Json(request) = body?;
    let response = messaging.send(&account.account_id, request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/conversations/{conversation_id}/messages?limit=&cursor=
pub async fn list_messages(
    State(messaging): State<MessagingService>,
    AuthUser(account): AuthUser,
    path: Result<Path<String>, PathRejection>,
    query: Result<Query<ListMessagesQuery>, QueryRejection>,
) -> Result<Json<ListMessagesResponse>, BackendError> {
    let Path(conversation_id) = path?;
    let Query(query) = query?;
    let page = messaging
        .history(&account.account_id, &conversation_id, query)
        .await?;
    Ok(Json(page.into()))
}

/// GET /api/conversations
pub async fn list_conversations(
    State(messaging): State<MessagingService>,
    AuthUser(account): AuthUser,
) -> Result<Json<ListConversationsResponse>, BackendError> {
    let conversations = messaging.conversations_for(&account.account_id).await?;
    Ok(Json(ListConversationsResponse { conversations }))
}
