//! Book repository.

use crate::error::MetadataResult;
use crate::models::BookRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for book operations.
#[async_trait]
pub trait BookRepo: Send + Sync {
    async fn create_book(&self, book: &BookRow) -> MetadataResult<()>;

    async fn get_book(&self, book_id: Uuid) -> MetadataResult<Option<BookRow>>;

    /// List all books, newest first.
    async fn list_books(&self) -> MetadataResult<Vec<BookRow>>;

    /// Version-stamped update of the mutable fields. `book.version` is the
    /// version the caller read; returns the new version or `EditConflict`.
    async fn update_book(&self, book: &BookRow) -> MetadataResult<i64>;

    /// Delete a book. Fails with `NotFound` if it does not exist.
    async fn delete_book(&self, book_id: Uuid) -> MetadataResult<()>;
}
