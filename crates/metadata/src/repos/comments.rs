//! Comment repository.

use crate::error::MetadataResult;
use crate::models::CommentRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for comment operations.
#[async_trait]
pub trait CommentRepo: Send + Sync {
    async fn create_comment(&self, comment: &CommentRow) -> MetadataResult<()>;

    async fn get_comment(&self, comment_id: Uuid) -> MetadataResult<Option<CommentRow>>;

    /// Version-stamped update of the comment body.
    async fn update_comment(&self, comment: &CommentRow) -> MetadataResult<i64>;

    /// Delete a comment. Fails with `NotFound` if it does not exist.
    async fn delete_comment(&self, comment_id: Uuid) -> MetadataResult<()>;
}
