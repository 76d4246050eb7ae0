//! Token repository.

use crate::error::MetadataResult;
use crate::models::{TokenRow, UserRow};
use async_trait::async_trait;
use bindery_core::TokenScope;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for token persistence and validation.
#[async_trait]
pub trait TokenRepo: Send + Sync {
    /// Persist an issued token (hash only, never the plaintext).
    async fn insert_token(&self, token: &TokenRow) -> MetadataResult<()>;

    /// Resolve the user owning an unexpired token of the given scope.
    ///
    /// Wrong hash, wrong scope, and expiry all read uniformly as `None` so
    /// callers cannot distinguish them.
    async fn user_for_token(
        &self,
        scope: TokenScope,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> MetadataResult<Option<UserRow>>;

    /// Delete every token of the given scope for a user. Idempotent.
    async fn delete_tokens_for_user(
        &self,
        scope: TokenScope,
        user_id: Uuid,
    ) -> MetadataResult<()>;

    /// Count tokens of the given scope for a user (test and audit hook).
    async fn count_tokens_for_user(
        &self,
        scope: TokenScope,
        user_id: Uuid,
    ) -> MetadataResult<u64>;
}
