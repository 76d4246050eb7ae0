//! HTTP API server for the Bindery book service.
//!
//! This crate provides the HTTP control plane:
//! - Account registration, activation, password reset
//! - Token issuance and bearer authentication
//! - Owner-guarded mutation of books, reviews, comments, and booklists
//! - Per-client rate limiting and background notification delivery

pub mod auth;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod ownership;
pub mod ratelimit;
pub mod routes;
pub mod state;
pub mod validation;

pub use auth::TraceId;
pub use error::ApiError;
pub use notify::{LogMailer, Mailer, Notifier};
pub use ownership::OwnershipCache;
pub use ratelimit::RateLimitState;
pub use routes::create_router;
pub use state::AppState;
