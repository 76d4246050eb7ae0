//! Ownable resource kinds.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The kinds of resources whose mutation is restricted to their owner.
///
/// Ownership caching is keyed by `(ResourceKind, id)` so entries for
/// resources of different kinds never collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Book,
    Review,
    Comment,
    Booklist,
}

impl ResourceKind {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Book => "book",
            Self::Review => "review",
            Self::Comment => "comment",
            Self::Booklist => "booklist",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
