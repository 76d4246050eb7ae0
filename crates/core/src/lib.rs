//! Core domain types and shared logic for Bindery.
//!
//! This crate defines the canonical types used across all other crates:
//! - Token scopes, generation, and hashing
//! - The per-request principal
//! - Ownable resource kinds
//! - Configuration

pub mod config;
pub mod principal;
pub mod resource;
pub mod token;

pub use principal::{AuthenticatedAccount, Principal};
pub use resource::ResourceKind;
pub use token::{Token, TokenScope};

/// Number of random bytes behind a token plaintext.
pub const TOKEN_SECRET_BYTES: usize = 16;

/// Length of a base32-encoded token plaintext (16 bytes, no padding).
pub const TOKEN_PLAINTEXT_LEN: usize = 26;
