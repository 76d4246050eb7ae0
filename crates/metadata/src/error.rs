//! Entity store error types.

use thiserror::Error;

/// Entity store operation errors.
///
/// Raw database failures are classified here, at the boundary closest to the
/// store; callers branch on these variants, never on driver error strings.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A version-stamped update matched zero rows: the row changed (or was
    /// deleted) since the caller read it. The caller must re-fetch before
    /// retrying.
    #[error("edit conflict: {0}")]
    EditConflict(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("query deadline of {0:?} exceeded")]
    Timeout(std::time::Duration),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MetadataError {
    /// Reclassify a driver error as `AlreadyExists` when it reports a unique
    /// constraint violation, keeping the raw error otherwise.
    pub fn classify_unique(err: sqlx::Error, what: &str) -> Self {
        let is_unique = err
            .as_database_error()
            .is_some_and(|db| db.is_unique_violation());
        if is_unique {
            Self::AlreadyExists(what.to_string())
        } else {
            Self::Database(err)
        }
    }
}

/// Result type for entity store operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
