//! HTTP tests for sending messages and reading history

mod common;

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use common::{degraded_state, memory_server, server_for, token_for, unenforced_state};

#[tokio::test]
async fn test_send_to_recipient_creates_direct_conversation() {
    let (server, _state) = memory_server();

    let response = server
        .post("/api/messages")
        .authorization_bearer(token_for("bob"))
        .json(&json!({ "recipientAccountId": "alice", "content": "hey" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["conversationId"], "alice_bob");
    assert_eq!(body["message"]["senderAccountId"], "bob");
    assert_eq!(body["message"]["sequence"], 1);
    assert_eq!(body["message"]["read"], false);
    assert_eq!(body["degraded"], false);

    let listed: Value = server
        .get("/api/conversations")
        .authorization_bearer(token_for("alice"))
        .await
        .json();
    let conversations = listed["conversations"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["id"], "alice_bob");
    assert_eq!(conversations[0]["lastMessagePreview"], "hey");
    assert_eq!(conversations[0]["participants"], json!(["alice", "bob"]));
}

#[tokio::test]
async fn test_both_directions_share_one_conversation() {
    let (server, _state) = memory_server();

    let first: Value = server
        .post("/api/messages")
        .authorization_bearer(token_for("alice"))
        .json(&json!({ "recipientAccountId": "bob", "content": "ping" }))
        .await
        .json();
    let second: Value = server
        .post("/api/messages")
        .authorization_bearer(token_for("bob"))
        .json(&json!({ "recipientAccountId": "alice", "content": "pong" }))
        .await
        .json();

    assert_eq!(first["conversationId"], second["conversationId"]);
    assert_eq!(second["message"]["sequence"], 2);
}

#[tokio::test]
async fn test_send_rejections() {
    let (server, _state) = memory_server();

    server
        .post("/api/messages")
        .authorization_bearer(token_for("alice"))
        .json(&json!({ "recipientAccountId": "bob", "content": "   " }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/api/messages")
        .authorization_bearer(token_for("alice"))
        .json(&json!({ "content": "no target" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    server
        .post("/api/messages")
        .authorization_bearer(token_for("alice"))
        .json(&json!({ "recipientAccountId": "alice", "content": "me" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let response = server
        .post("/api/messages")
        .authorization_bearer(token_for("alice"))
        .text("{not json")
        .content_type("application/json")
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn test_requires_session() {
    let (server, _state) = memory_server();

    let response = server
        .post("/api/messages")
        .json(&json!({ "recipientAccountId": "bob", "content": "hi" }))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["status"], 401);

    server
        .get("/api/conversations")
        .authorization_bearer("not-a-token")
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_history_pages_in_order() {
    let (server, _state) = memory_server();
    for i in 1..=5 {
        server
            .post("/api/messages")
            .authorization_bearer(token_for("alice"))
            .json(&json!({ "recipientAccountId": "bob", "content": format!("m{}", i) }))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let mut contents = Vec::new();
    let mut page_sizes = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let mut request = server
            .get("/api/conversations/alice_bob/messages")
            .authorization_bearer(token_for("bob"))
            .add_query_param("limit", 2);
        if let Some(cursor) = &cursor {
            request = request.add_query_param("cursor", cursor);
        }
        let page: Value = request.await.json();
        let messages = page["messages"].as_array().unwrap();
        page_sizes.push(messages.len());
        contents.extend(messages.iter().map(|m| m["content"].as_str().unwrap().to_string()));
        match page["nextCursor"].as_str() {
            Some(next) => cursor = Some(next.to_string()),
            None => break,
        }
    }

    assert_eq!(page_sizes, vec![2, 2, 1]);
    assert_eq!(contents, vec!["m1", "m2", "m3", "m4", "m5"]);
}

#[tokio::test]
async fn test_history_errors() {
    let (server, _state) = memory_server();
    server
        .post("/api/messages")
        .authorization_bearer(token_for("alice"))
        .json(&json!({ "recipientAccountId": "bob", "content": "private" }))
        .await
        .assert_status(StatusCode::CREATED);

    // Not a participant
    server
        .get("/api/conversations/alice_bob/messages")
        .authorization_bearer(token_for("carol"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // Never written to
    server
        .get("/api/conversations/alice_dave/messages")
        .authorization_bearer(token_for("alice"))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    server
        .get("/api/conversations/alice_bob/messages")
        .authorization_bearer(token_for("alice"))
        .add_query_param("cursor", "garbage")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_explicit_conversation_id_for_pair() {
    let (server, _state) = memory_server();

    let body: Value = server
        .post("/api/messages")
        .authorization_bearer(token_for("alice"))
        .json(&json!({ "conversationId": "alice_bob", "content": "by id" }))
        .await
        .json();
    assert_eq!(body["conversationId"], "alice_bob");

    // Bob was added as a participant and can read it.
    let page: Value = server
        .get("/api/conversations/alice_bob/messages")
        .authorization_bearer(token_for("bob"))
        .await
        .json();
    assert_eq!(page["messages"][0]["content"], "by id");

    server
        .post("/api/messages")
        .authorization_bearer(token_for("carol"))
        .json(&json!({ "conversationId": "alice_bob", "content": "intruder" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // Unknown ids that are not a pair cannot be created by id.
    server
        .post("/api/messages")
        .authorization_bearer(token_for("alice"))
        .json(&json!({ "conversationId": "squad-7", "content": "anyone?" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_id_is_not_created_without_enforcement() {
    let state = unenforced_state();
    let server = server_for(state.clone());

    server
        .post("/api/messages")
        .authorization_bearer(token_for("alice"))
        .json(&json!({ "conversationId": "squad-7", "content": "anyone?" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .post("/api/messages")
        .authorization_bearer(token_for("carol"))
        .json(&json!({ "conversationId": "alice_bob", "content": "not mine" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
    assert!(state.messaging.conversations_for("alice").await.unwrap().is_empty());

    server
        .post("/api/messages")
        .authorization_bearer(token_for("alice"))
        .json(&json!({ "conversationId": "alice_bob", "content": "by id" }))
        .await
        .assert_status(StatusCode::CREATED);
    let conversations = state.messaging.conversations_for("bob").await.unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].participants.len(), 2);
}

#[tokio::test]
async fn test_degraded_send_keeps_the_message() {
    let state = degraded_state();
    let server = server_for(state.clone());

    let response = server
        .post("/api/messages")
        .authorization_bearer(token_for("alice"))
        .json(&json!({ "recipientAccountId": "bob", "content": "still stored" }))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["degraded"], true);

    // The pair members can still read history through the derived id.
    let page: Value = server
        .get("/api/conversations/alice_bob/messages")
        .authorization_bearer(token_for("bob"))
        .await
        .json();
    assert_eq!(page["messages"][0]["content"], "still stored");
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let (server, _state) = memory_server();
    let response = server.get("/nope").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["status"], 404);
}
