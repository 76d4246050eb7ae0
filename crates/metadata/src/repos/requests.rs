//! Purchase request repository.

use crate::error::MetadataResult;
use crate::models::RequestRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for book purchase requests.
#[async_trait]
pub trait RequestRepo: Send + Sync {
    async fn create_request(&self, request: &RequestRow) -> MetadataResult<()>;

    async fn get_request(&self, request_id: Uuid) -> MetadataResult<Option<RequestRow>>;

    /// Version-stamped update of the request status.
    async fn update_request(&self, request: &RequestRow) -> MetadataResult<i64>;
}
