//! Application state shared across handlers.

use crate::notify::Notifier;
use crate::ownership::OwnershipCache;
use crate::ratelimit::RateLimitState;
use bindery_core::config::AppConfig;
use bindery_metadata::MetadataStore;
use std::sync::Arc;
use std::time::Duration;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Entity store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Rate limiting state.
    pub rate_limit: RateLimitState,
    /// Resource ownership memo cache.
    pub ownership: Arc<OwnershipCache>,
    /// Background notification queue.
    pub notifier: Notifier,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Validates configuration: warnings are logged, hard errors fail
    /// startup.
    ///
    /// # Panics
    ///
    /// Panics if rate limit or ownership cache configuration is invalid.
    pub fn new(config: AppConfig, metadata: Arc<dyn MetadataStore>, notifier: Notifier) -> Self {
        match config.rate_limit.validate() {
            Ok(warnings) => {
                for warning in warnings {
                    tracing::warn!("configuration warning: {}", warning);
                }
            }
            Err(error) => {
                panic!("invalid rate limit configuration: {error}");
            }
        }

        if let Err(error) = config.ownership_cache.validate() {
            panic!("invalid ownership cache configuration: {error}");
        }

        let rate_limit = RateLimitState::new(&config.rate_limit);
        let ownership = Arc::new(OwnershipCache::new(Duration::from_secs(
            config.ownership_cache.ttl_secs,
        )));

        Self {
            config: Arc::new(config),
            metadata,
            rate_limit,
            ownership,
            notifier,
        }
    }

    /// Cleanup interval for the rate limiter background task, if enabled.
    /// A zero interval falls back to 60 seconds so `tokio::time::interval`
    /// cannot panic.
    pub fn rate_limit_cleanup_interval(&self) -> Option<Duration> {
        if !self.rate_limit.is_enabled() {
            return None;
        }
        let interval_secs = self.config.rate_limit.cleanup_interval_secs;
        if interval_secs == 0 {
            tracing::warn!("rate_limit.cleanup_interval_secs is 0, using default of 60 seconds");
            Some(Duration::from_secs(60))
        } else {
            Some(Duration::from_secs(interval_secs))
        }
    }

    /// Sweep interval for the ownership cache background task.
    pub fn ownership_sweep_interval(&self) -> Duration {
        let interval_secs = self.config.ownership_cache.sweep_interval_secs;
        if interval_secs == 0 {
            tracing::warn!(
                "ownership_cache.sweep_interval_secs is 0, using default of 60 seconds"
            );
            Duration::from_secs(60)
        } else {
            Duration::from_secs(interval_secs)
        }
    }
}
