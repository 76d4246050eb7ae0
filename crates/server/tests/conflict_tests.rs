//! Optimistic concurrency and token replay tests.

mod common;

use axum::http::StatusCode;
use bindery_core::TokenScope;
use bindery_metadata::repos::{BookRepo, TokenRepo};
use common::*;
use serde_json::json;
use tower::ServiceExt;

fn update_payload(title: &str, version: i64) -> serde_json::Value {
    json!({
        "title": title,
        "author": "Primo Levi",
        "year": 1975,
        "pages": 241,
        "genres": ["memoir"],
        "version": version,
    })
}

#[tokio::test]
async fn test_stale_version_update_conflicts() {
    let server = TestServer::new().await;
    let owner = create_user(&server.metadata(), "owner@example.com", true).await;
    let bearer = auth_token_for(&server.metadata(), owner.user_id).await;
    let book = create_book(&server.metadata(), owner.user_id).await;
    let uri = format!("/v1/books/{}", book.book_id);

    // First writer wins with version 0.
    let response = server
        .router
        .clone()
        .oneshot(json_request(
            "PUT",
            &uri,
            Some(&bearer),
            Some(update_payload("First Edit", 0)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["version"], 1);

    // A second writer still holding version 0 conflicts.
    let response = server
        .router
        .clone()
        .oneshot(json_request(
            "PUT",
            &uri,
            Some(&bearer),
            Some(update_payload("Second Edit", 0)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = body_json(response).await;
    assert_eq!(body["code"], "edit_conflict");

    // The losing write left no mark.
    let response = server
        .router
        .clone()
        .oneshot(json_request("GET", &uri, None, None))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["title"], "First Edit");
    assert_eq!(body["version"], 1);

    // Re-fetching and retrying with the fresh version succeeds.
    let response = server
        .router
        .clone()
        .oneshot(json_request(
            "PUT",
            &uri,
            Some(&bearer),
            Some(update_payload("Second Edit", 1)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["version"], 2);
}

#[tokio::test]
async fn test_concurrent_updates_have_exactly_one_winner() {
    let server = TestServer::new().await;
    let owner = create_user(&server.metadata(), "owner@example.com", true).await;
    let bearer = auth_token_for(&server.metadata(), owner.user_id).await;
    let book = create_book(&server.metadata(), owner.user_id).await;
    let uri = format!("/v1/books/{}", book.book_id);

    let (a, b) = tokio::join!(
        server.router.clone().oneshot(json_request(
            "PUT",
            &uri,
            Some(&bearer),
            Some(update_payload("Writer A", 0)),
        )),
        server.router.clone().oneshot(json_request(
            "PUT",
            &uri,
            Some(&bearer),
            Some(update_payload("Writer B", 0)),
        )),
    );

    let statuses = [a.unwrap().status(), b.unwrap().status()];
    assert!(statuses.contains(&StatusCode::OK), "one writer must win");
    assert!(
        statuses.contains(&StatusCode::CONFLICT),
        "one writer must conflict"
    );

    let stored = server
        .metadata()
        .get_book(book.book_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.version, 1);
}

#[tokio::test]
async fn test_activation_token_cannot_be_replayed() {
    let server = TestServer::new().await;
    let user = create_user(&server.metadata(), "new@example.com", false).await;
    let activation = token_for(&server.metadata(), user.user_id, TokenScope::Activation).await;

    let response = server
        .router
        .clone()
        .oneshot(json_request(
            "PUT",
            "/v1/users/activated",
            None,
            Some(json!({ "token": activation })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Activation revoked every outstanding activation token for the user.
    let count = server
        .metadata()
        .count_tokens_for_user(TokenScope::Activation, user.user_id)
        .await
        .unwrap();
    assert_eq!(count, 0);

    // Replaying the same plaintext now reads as an unknown token.
    let response = server
        .router
        .clone()
        .oneshot(json_request(
            "PUT",
            "/v1/users/activated",
            None,
            Some(json!({ "token": activation })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reset_token_cannot_be_replayed() {
    let server = TestServer::new().await;
    let user = create_user(&server.metadata(), "reset@example.com", true).await;
    let reset = token_for(&server.metadata(), user.user_id, TokenScope::PasswordReset).await;

    let response = server
        .router
        .clone()
        .oneshot(json_request(
            "PUT",
            "/v1/users/password",
            None,
            Some(json!({ "token": reset, "password": "first-new-pass" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = server
        .router
        .clone()
        .oneshot(json_request(
            "PUT",
            "/v1/users/password",
            None,
            Some(json!({ "token": reset, "password": "second-new-pass" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_activation_token_fails_validation() {
    let server = TestServer::new().await;

    let response = server
        .router
        .clone()
        .oneshot(json_request(
            "PUT",
            "/v1/users/activated",
            None,
            Some(json!({ "token": "too-short" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["fields"]["token"], "must be 26 bytes long");
}
