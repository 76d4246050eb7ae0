//! Common test utilities for the entity store.
//! Note: #[allow(dead_code)] because each test file compiles common/ separately.

#![allow(dead_code)]

use bindery_metadata::SqliteStore;
use bindery_metadata::models::{BookRow, BooklistRow, CommentRow, RequestRow, ReviewRow, UserRow};
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

/// Create a fresh store backed by a temporary database file.
pub async fn test_store() -> (TempDir, SqliteStore) {
    let temp_dir = tempfile::tempdir().expect("failed to create temp directory");
    let db_path = temp_dir.path().join("metadata.db");
    let store = SqliteStore::new(&db_path, None)
        .await
        .expect("failed to create sqlite store");
    (temp_dir, store)
}

pub fn user_row(email: &str, activated: bool) -> UserRow {
    UserRow {
        user_id: Uuid::new_v4(),
        created_at: OffsetDateTime::now_utc(),
        name: "Test Reader".to_string(),
        email: email.to_string(),
        // Not a real digest; password verification is not under test here.
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdHNhbHQ$AAAAAAAAAAA".to_string(),
        activated,
        version: 0,
    }
}

pub fn book_row(owner_id: Uuid) -> BookRow {
    BookRow {
        book_id: Uuid::new_v4(),
        created_at: OffsetDateTime::now_utc(),
        owner_id,
        title: "The Left Hand of Darkness".to_string(),
        author: "Ursula K. Le Guin".to_string(),
        year: 1969,
        pages: 304,
        genres: r#"["science fiction"]"#.to_string(),
        version: 0,
    }
}

pub fn review_row(book_id: Uuid, owner_id: Uuid) -> ReviewRow {
    ReviewRow {
        review_id: Uuid::new_v4(),
        book_id,
        owner_id,
        rating: 5,
        body: "A classic.".to_string(),
        created_at: OffsetDateTime::now_utc(),
        version: 0,
    }
}

pub fn comment_row(review_id: Uuid, owner_id: Uuid) -> CommentRow {
    CommentRow {
        comment_id: Uuid::new_v4(),
        review_id,
        owner_id,
        body: "Agreed.".to_string(),
        created_at: OffsetDateTime::now_utc(),
        version: 0,
    }
}

pub fn booklist_row(owner_id: Uuid) -> BooklistRow {
    BooklistRow {
        booklist_id: Uuid::new_v4(),
        owner_id,
        name: "Winter reading".to_string(),
        is_public: false,
        created_at: OffsetDateTime::now_utc(),
        version: 0,
    }
}

pub fn request_row(owner_id: Uuid) -> RequestRow {
    RequestRow {
        request_id: Uuid::new_v4(),
        owner_id,
        title: "Piranesi".to_string(),
        author: "Susanna Clarke".to_string(),
        status: "pending".to_string(),
        created_at: OffsetDateTime::now_utc(),
        version: 0,
    }
}
