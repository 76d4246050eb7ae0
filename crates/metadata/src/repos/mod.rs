//! Repository traits, one per entity plus owner resolution.

pub mod booklists;
pub mod books;
pub mod comments;
pub mod requests;
pub mod reviews;
pub mod tokens;
pub mod users;

pub use booklists::BooklistRepo;
pub use books::BookRepo;
pub use comments::CommentRepo;
pub use requests::RequestRepo;
pub use reviews::ReviewRepo;
pub use tokens::TokenRepo;
pub use users::UserRepo;

use crate::error::MetadataResult;
use async_trait::async_trait;
use bindery_core::ResourceKind;
use uuid::Uuid;

/// Owner resolution for ownable resources.
#[async_trait]
pub trait OwnershipRepo: Send + Sync {
    /// Resolve the owner of a resource, or `None` if it does not exist.
    async fn owner_of(&self, kind: ResourceKind, id: Uuid) -> MetadataResult<Option<Uuid>>;
}
