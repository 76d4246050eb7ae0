//! Review repository.

use crate::error::MetadataResult;
use crate::models::ReviewRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for review operations.
#[async_trait]
pub trait ReviewRepo: Send + Sync {
    async fn create_review(&self, review: &ReviewRow) -> MetadataResult<()>;

    async fn get_review(&self, review_id: Uuid) -> MetadataResult<Option<ReviewRow>>;

    /// Version-stamped update of rating and body.
    async fn update_review(&self, review: &ReviewRow) -> MetadataResult<i64>;

    /// Delete a review. Fails with `NotFound` if it does not exist.
    async fn delete_review(&self, review_id: Uuid) -> MetadataResult<()>;
}
