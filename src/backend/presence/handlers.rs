//! HTTP handlers for presence

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use crate::backend::error::BackendError;
use crate::backend::messaging::identity::validate_account_id;
use crate::backend::middleware::AuthUser;
use crate::backend::presence::PresenceTracker;
use crate::shared::messaging::{PresenceRecord, PresenceUpdate};

/// POST /api/presence - heartbeat for the calling account
pub async fn post_presence(
    State(presence): State<PresenceTracker>,
    AuthUser(account): AuthUser,
    body: Result<Json<PresenceUpdate>, JsonRejection>,
) -> Result<Json<PresenceRecord>, BackendError> {
    let Json(update) = body?;
    let record = presence.heartbeat(&account.account_id, update).await?;
    Ok(Json(record))
}

/// GET /api/presence/{account_id}
pub async fn get_presence(
    State(presence): State<PresenceTracker>,
    AuthUser(_account): AuthUser,
    Path(account_id): Path<String>,
) -> Result<Json<PresenceRecord>, BackendError> {
    validate_account_id(&account_id)?;
    Ok(Json(presence.get(&account_id).await?))
}
