//! Entity store abstraction and implementations for Bindery.
//!
//! This crate provides the persistent data model:
//! - Users, books, reviews, comments, booklists, and purchase requests,
//!   all version-stamped for optimistic concurrency control
//! - Hashed token persistence, validation lookup, and scope-wide revocation
//! - Owner resolution for ownable resources
//! - A generic compare-and-swap update primitive shared by every entity

pub mod cas;
pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use store::{MetadataStore, SqliteStore};

use bindery_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    match config {
        MetadataConfig::Sqlite {
            path,
            query_timeout_secs,
        } => {
            let store = SqliteStore::new(path, *query_timeout_secs).await?;
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
