//! Booklist repository.

use crate::error::MetadataResult;
use crate::models::BooklistRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for reading list operations.
#[async_trait]
pub trait BooklistRepo: Send + Sync {
    async fn create_booklist(&self, booklist: &BooklistRow) -> MetadataResult<()>;

    async fn get_booklist(&self, booklist_id: Uuid) -> MetadataResult<Option<BooklistRow>>;

    /// Version-stamped update of name and visibility.
    async fn update_booklist(&self, booklist: &BooklistRow) -> MetadataResult<i64>;

    /// Delete a booklist. Fails with `NotFound` if it does not exist.
    async fn delete_booklist(&self, booklist_id: Uuid) -> MetadataResult<()>;
}
