//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum_test::TestServer;
use vms_chat::backend::auth::create_token;
use vms_chat::backend::error::BackendError;
use vms_chat::backend::messaging::ConversationDirectory;
use vms_chat::backend::routes::create_router;
use vms_chat::backend::server::{AppState, Stores};
use vms_chat::shared::messaging::{Conversation, ConversationTouch};
use vms_chat::shared::AppConfig;

pub const SECRET: &str = "integration-test-secret";

/// Configuration with fast retries, suitable for tests
pub fn test_config() -> AppConfig {
    AppConfig::builder()
        .jwt_secret(SECRET)
        .touch_retry_attempts(2)
        .touch_retry_backoff(Duration::from_millis(1))
        .build()
        .expect("valid test config")
}

pub fn token_for(account_id: &str) -> String {
    create_token(SECRET, account_id, chrono::Duration::hours(1)).expect("token")
}

pub fn memory_state() -> AppState {
    AppState::in_memory(test_config())
}

/// In-memory state that lets any account post to an existing conversation
pub fn unenforced_state() -> AppState {
    let config = AppConfig::builder()
        .jwt_secret(SECRET)
        .touch_retry_attempts(2)
        .touch_retry_backoff(Duration::from_millis(1))
        .enforce_participation(false)
        .build()
        .expect("valid test config");
    AppState::in_memory(config)
}

pub fn server_for(state: AppState) -> TestServer {
    TestServer::new(create_router(state)).expect("test server")
}

pub fn memory_server() -> (TestServer, AppState) {
    let state = memory_state();
    (server_for(state.clone()), state)
}

/// Directory whose writes always fail; reads see nothing
pub struct UnavailableDirectory;

#[async_trait]
impl ConversationDirectory for UnavailableDirectory {
    async fn touch(&self, _touch: ConversationTouch) -> Result<Conversation, BackendError> {
        Err(BackendError::store("directory unavailable"))
    }

    async fn get(&self, _conversation_id: &str) -> Result<Option<Conversation>, BackendError> {
        Ok(None)
    }

    async fn list_for_account(&self, _account_id: &str) -> Result<Vec<Conversation>, BackendError> {
        Ok(Vec::new())
    }
}

/// In-memory state whose conversation directory is unavailable
pub fn degraded_state() -> AppState {
    let mut stores = Stores::in_memory();
    stores.conversations = Arc::new(UnavailableDirectory);
    AppState::from_stores(test_config(), stores, None)
}
