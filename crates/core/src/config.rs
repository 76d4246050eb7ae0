//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    Sqlite {
        path: PathBuf,
        /// Per-query deadline in seconds. Defaults to 3 seconds so a stalled
        /// query cannot exhaust the request-handling pool.
        query_timeout_secs: Option<u64>,
    },
}

/// Rate limiting configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether per-client rate limiting is enabled.
    #[serde(default = "default_rate_limit_enabled")]
    pub enabled: bool,
    /// Sustained refill rate, permits per second per client.
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    /// Instantaneous burst allowance per client.
    #[serde(default = "default_burst")]
    pub burst: u32,
    /// Maximum number of tracked clients before new keys are rejected.
    #[serde(default = "default_max_entries")]
    pub max_entries: u32,
    /// Seconds a client may stay idle before its entry is evicted.
    #[serde(default = "default_entry_ttl_secs")]
    pub entry_ttl_secs: u64,
    /// Interval of the background eviction sweep, in seconds.
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_rate_limit_enabled(),
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
            max_entries: default_max_entries(),
            entry_ttl_secs: default_entry_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl RateLimitConfig {
    /// Validate the configuration.
    ///
    /// Returns warnings for dubious but workable settings; hard errors make
    /// the limiter unusable and must fail startup.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        if !self.enabled {
            return Ok(Vec::new());
        }

        if self.requests_per_second == 0 {
            return Err("rate_limit.requests_per_second must be at least 1".to_string());
        }
        if self.burst == 0 {
            return Err("rate_limit.burst must be at least 1".to_string());
        }
        if self.max_entries == 0 {
            return Err("rate_limit.max_entries must be at least 1".to_string());
        }

        let mut warnings = Vec::new();
        if self.burst < self.requests_per_second {
            warnings.push(format!(
                "rate_limit.burst ({}) is below requests_per_second ({}); \
                 clients will be throttled harder than the sustained rate suggests",
                self.burst, self.requests_per_second
            ));
        }
        if self.entry_ttl_secs < self.cleanup_interval_secs {
            warnings.push(format!(
                "rate_limit.entry_ttl_secs ({}) is below cleanup_interval_secs ({}); \
                 most entries will be evicted on the first sweep after creation",
                self.entry_ttl_secs, self.cleanup_interval_secs
            ));
        }
        Ok(warnings)
    }
}

fn default_rate_limit_enabled() -> bool {
    true
}

fn default_requests_per_second() -> u32 {
    2
}

fn default_burst() -> u32 {
    4
}

fn default_max_entries() -> u32 {
    100_000
}

fn default_entry_ttl_secs() -> u64 {
    180 // 3 minutes idle before eviction
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

/// Ownership cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OwnershipCacheConfig {
    /// Seconds an owner memo stays valid. Staleness within this window is a
    /// documented limitation of the per-instance cache.
    #[serde(default = "default_ownership_ttl_secs")]
    pub ttl_secs: u64,
    /// Interval of the background sweep that drops expired entries.
    #[serde(default = "default_ownership_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl Default for OwnershipCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ownership_ttl_secs(),
            sweep_interval_secs: default_ownership_sweep_interval_secs(),
        }
    }
}

impl OwnershipCacheConfig {
    /// Validate the configuration, failing on values that disable the cache
    /// in surprising ways.
    pub fn validate(&self) -> Result<(), String> {
        if self.ttl_secs == 0 {
            return Err("ownership_cache.ttl_secs must be at least 1".to_string());
        }
        Ok(())
    }
}

fn default_ownership_ttl_secs() -> u64 {
    1800 // 30 minutes
}

fn default_ownership_sweep_interval_secs() -> u64 {
    60
}

/// Token time-to-live configuration, in seconds per scope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenConfig {
    #[serde(default = "default_activation_ttl_secs")]
    pub activation_ttl_secs: u64,
    #[serde(default = "default_password_reset_ttl_secs")]
    pub password_reset_ttl_secs: u64,
    #[serde(default = "default_authentication_ttl_secs")]
    pub authentication_ttl_secs: u64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            activation_ttl_secs: default_activation_ttl_secs(),
            password_reset_ttl_secs: default_password_reset_ttl_secs(),
            authentication_ttl_secs: default_authentication_ttl_secs(),
        }
    }
}

impl TokenConfig {
    pub fn activation_ttl(&self) -> Duration {
        seconds(self.activation_ttl_secs)
    }

    pub fn password_reset_ttl(&self) -> Duration {
        seconds(self.password_reset_ttl_secs)
    }

    pub fn authentication_ttl(&self) -> Duration {
        seconds(self.authentication_ttl_secs)
    }
}

fn seconds(secs: u64) -> Duration {
    // Saturate at i64::MAX to prevent overflow wrapping to negative.
    Duration::seconds(i64::try_from(secs).unwrap_or(i64::MAX))
}

fn default_activation_ttl_secs() -> u64 {
    72 * 3600
}

fn default_password_reset_ttl_secs() -> u64 {
    45 * 60
}

fn default_authentication_ttl_secs() -> u64 {
    24 * 3600
}

/// Background notifier configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Number of delivery workers.
    #[serde(default = "default_notify_workers")]
    pub workers: usize,
    /// Bounded queue depth; a full queue drops notifications rather than
    /// blocking the issuing request.
    #[serde(default = "default_notify_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            workers: default_notify_workers(),
            queue_capacity: default_notify_queue_capacity(),
        }
    }
}

fn default_notify_workers() -> usize {
    2
}

fn default_notify_queue_capacity() -> usize {
    256
}

/// Top-level application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub ownership_cache: OwnershipCacheConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

impl AppConfig {
    /// Create a test configuration backed by an in-memory-style SQLite path.
    ///
    /// **For testing only.** Rate limiting is disabled so tests compose a
    /// fresh limiter explicitly when they need one.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            metadata: MetadataConfig::Sqlite {
                path: PathBuf::from("metadata.db"),
                query_timeout_secs: None,
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                ..Default::default()
            },
            ownership_cache: OwnershipCacheConfig::default(),
            tokens: TokenConfig::default(),
            notify: NotifyConfig::default(),
        }
    }
}
