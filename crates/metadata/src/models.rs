//! Database models mapping to the entity schema.
//!
//! Every mutable entity carries a `version` column starting at 0; the only
//! path that changes it is the conditional update in [`crate::cas`].

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Account record.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
    pub name: String,
    pub email: String,
    /// Argon2id digest in PHC string format. Never exposed through the API.
    pub password_hash: String,
    pub activated: bool,
    pub version: i64,
}

/// Token record. The plaintext is never stored; only its SHA-256 digest.
#[derive(Debug, Clone, FromRow)]
pub struct TokenRow {
    pub token_hash: String,
    pub user_id: Uuid,
    pub scope: String,
    pub expires_at: OffsetDateTime,
}

impl TokenRow {
    /// The persistable part of a freshly issued token. The plaintext stays
    /// with the caller.
    pub fn from_token(token: &bindery_core::Token) -> Self {
        Self {
            token_hash: token.hash.clone(),
            user_id: token.user_id,
            scope: token.scope.as_str().to_string(),
            expires_at: token.expires_at,
        }
    }
}

/// Book record.
#[derive(Debug, Clone, FromRow)]
pub struct BookRow {
    pub book_id: Uuid,
    pub created_at: OffsetDateTime,
    pub owner_id: Uuid,
    pub title: String,
    pub author: String,
    pub year: i64,
    pub pages: i64,
    /// JSON-encoded array of genre strings.
    pub genres: String,
    pub version: i64,
}

/// Review of a book.
#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    pub review_id: Uuid,
    pub book_id: Uuid,
    pub owner_id: Uuid,
    pub rating: i64,
    pub body: String,
    pub created_at: OffsetDateTime,
    pub version: i64,
}

/// Comment on a review.
#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub comment_id: Uuid,
    pub review_id: Uuid,
    pub owner_id: Uuid,
    pub body: String,
    pub created_at: OffsetDateTime,
    pub version: i64,
}

/// Reading list record.
#[derive(Debug, Clone, FromRow)]
pub struct BooklistRow {
    pub booklist_id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub is_public: bool,
    pub created_at: OffsetDateTime,
    pub version: i64,
}

/// Book purchase request record.
#[derive(Debug, Clone, FromRow)]
pub struct RequestRow {
    pub request_id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub author: String,
    /// One of `pending`, `approved`, `rejected`.
    pub status: String,
    pub created_at: OffsetDateTime,
    pub version: i64,
}
