//! Test fixtures and request helpers.
#![allow(dead_code)]

use argon2::Argon2;
use argon2::password_hash::{PasswordHasher, SaltString, rand_core::OsRng};
use axum::body::Body;
use axum::http::{Request, Response, header};
use bindery_core::{Token, TokenScope};
use bindery_metadata::MetadataStore;
use bindery_metadata::models::{BookRow, TokenRow, UserRow};
use bindery_metadata::repos::{BookRepo, TokenRepo, UserRepo};
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// The password every fixture user gets.
pub const TEST_PASSWORD: &str = "pa55word1234";

/// Argon2 hash of [`TEST_PASSWORD`], computed once because hashing is
/// deliberately slow.
fn test_password_hash() -> String {
    static HASH: OnceLock<String> = OnceLock::new();
    HASH.get_or_init(|| {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(TEST_PASSWORD.as_bytes(), &salt)
            .expect("Failed to hash test password")
            .to_string()
    })
    .clone()
}

/// Insert a user directly into the store.
pub async fn create_user(store: &Arc<dyn MetadataStore>, email: &str, activated: bool) -> UserRow {
    let user = UserRow {
        user_id: Uuid::new_v4(),
        created_at: OffsetDateTime::now_utc(),
        name: "Test User".to_string(),
        email: email.to_string(),
        password_hash: test_password_hash(),
        activated,
        version: 0,
    };
    store.create_user(&user).await.expect("Failed to create user");
    user
}

/// Issue an Authentication token for a user, returning the plaintext.
pub async fn auth_token_for(store: &Arc<dyn MetadataStore>, user_id: Uuid) -> String {
    token_for(store, user_id, TokenScope::Authentication).await
}

/// Issue a token of any scope for a user, returning the plaintext.
pub async fn token_for(
    store: &Arc<dyn MetadataStore>,
    user_id: Uuid,
    scope: TokenScope,
) -> String {
    let token = Token::generate(user_id, Duration::hours(1), scope);
    store
        .insert_token(&TokenRow::from_token(&token))
        .await
        .expect("Failed to insert token");
    token.plaintext
}

/// Insert a book directly into the store.
pub async fn create_book(store: &Arc<dyn MetadataStore>, owner_id: Uuid) -> BookRow {
    let book = BookRow {
        book_id: Uuid::new_v4(),
        created_at: OffsetDateTime::now_utc(),
        owner_id,
        title: "If on a winter's night a traveler".to_string(),
        author: "Italo Calvino".to_string(),
        year: 1979,
        pages: 260,
        genres: r#"["fiction","postmodern"]"#.to_string(),
        version: 0,
    };
    store.create_book(&book).await.expect("Failed to create book");
    book
}

/// Build a JSON request, optionally authenticated.
pub fn json_request(
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("Failed to build request"),
        None => builder
            .body(Body::empty())
            .expect("Failed to build request"),
    }
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("Failed to read response body");
    serde_json::from_slice(&bytes).expect("Response body is not valid JSON")
}
