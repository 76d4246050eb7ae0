//! Per-client rate limiting middleware using a token bucket per client IP.
//!
//! Protection against memory exhaustion:
//! - Configurable maximum tracked clients (default: 100,000)
//! - Automatic eviction of idle entries based on TTL
//! - Background cleanup task that runs periodically
//!
//! Forwarded headers (X-Forwarded-For and the like) are never consulted; the
//! client key is always the direct connection IP from `ConnectInfo`.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use bindery_core::config::RateLimitConfig;
use dashmap::{DashMap, mapref::entry::Entry};
use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware, state::InMemoryState,
};
use std::{
    net::SocketAddr,
    num::NonZeroU32,
    sync::{
        Arc, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

/// Type alias for the keyed per-client rate limiter.
type KeyedLimiter =
    RateLimiter<String, DashMap<String, InMemoryState>, DefaultClock, NoOpMiddleware>;

/// Fraction of entries that must be evicted before the limiter is rebuilt.
const REBUILD_EVICTION_THRESHOLD_FRACTION: f64 = 0.10;

/// Minimum number of evictions to trigger a rebuild regardless of fraction.
const REBUILD_EVICTION_MIN_COUNT: usize = 100;

/// Minimum interval between rebuilds; memory is reclaimed at least this
/// often even when eviction stays under the threshold.
const REBUILD_MIN_INTERVAL: Duration = Duration::from_secs(300);

/// Rate limiter state shared across requests.
#[derive(Clone)]
pub struct RateLimitState {
    inner: Option<Arc<RateLimitStateInner>>,
}

/// Inner state, allocated only when rate limiting is enabled.
struct RateLimitStateInner {
    /// Keyed limiter, behind a RwLock so it can be rebuilt for memory cleanup.
    limiter: RwLock<KeyedLimiter>,
    /// Last access timestamps per client, for eviction.
    last_access: DashMap<String, Instant>,
    /// Maximum tracked clients before new keys are rejected.
    max_entries: u32,
    /// Idle time before a client entry is evicted.
    entry_ttl: Duration,
    /// Quota kept for rebuilding the limiter.
    quota: Quota,
    /// Timestamp of the last limiter rebuild.
    last_rebuild: RwLock<Instant>,
    /// Whether the missing-ConnectInfo warning has been logged.
    connect_info_warned: AtomicBool,
    /// Whether the at-capacity warning has been logged (prevents log spam
    /// while requests are being rejected).
    at_capacity_warned: AtomicBool,
}

impl RateLimitState {
    /// Create a new rate limit state from configuration.
    pub fn new(config: &RateLimitConfig) -> Self {
        if !config.enabled {
            return Self { inner: None };
        }

        let quota = Quota::per_second(
            NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::new(2).unwrap()),
        )
        .allow_burst(NonZeroU32::new(config.burst).unwrap_or(NonZeroU32::new(1).unwrap()));
        let limiter = RateLimiter::dashmap(quota);

        Self {
            inner: Some(Arc::new(RateLimitStateInner {
                limiter: RwLock::new(limiter),
                last_access: DashMap::new(),
                max_entries: config.max_entries,
                entry_ttl: Duration::from_secs(config.entry_ttl_secs),
                quota,
                last_rebuild: RwLock::new(Instant::now()),
                connect_info_warned: AtomicBool::new(false),
                at_capacity_warned: AtomicBool::new(false),
            })),
        }
    }

    /// Check whether a request from the given client is allowed.
    pub fn allow(&self, client: &str) -> Result<(), RateLimitError> {
        let inner = match &self.inner {
            Some(inner) => inner,
            None => return Ok(()),
        };

        let now = Instant::now();
        let key = client.to_string();

        // Capacity is checked before acquiring the entry lock; DashMap's
        // len() can deadlock while an entry lock is held. The check is
        // slightly racy, overshooting by at most the number of concurrent
        // threads.
        let current_len = inner.last_access.len();
        let at_capacity = current_len >= inner.max_entries as usize;

        match inner.last_access.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                entry.insert(now);
            }
            Entry::Vacant(entry) => {
                if at_capacity {
                    Self::warn_at_capacity(&inner.at_capacity_warned, current_len, inner.max_entries);
                    return Err(RateLimitError {
                        retry_after_secs: 60,
                        reason: RateLimitReason::AtCapacity,
                    });
                }
                entry.insert(now);
            }
        }

        let limiter = inner.limiter.read().unwrap_or_else(|poisoned| {
            tracing::warn!("limiter RwLock was poisoned, recovering with into_inner()");
            poisoned.into_inner()
        });
        match limiter.check_key(&key) {
            Ok(_) => Ok(()),
            Err(not_until) => {
                let wait_time =
                    not_until.wait_time_from(governor::clock::Clock::now(&DefaultClock::default()));
                Err(RateLimitError {
                    retry_after_secs: wait_time.as_secs() + 1,
                    reason: RateLimitReason::RateLimited,
                })
            }
        }
    }

    /// Check if rate limiting is enabled.
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Evict idle entries. Returns the number evicted.
    ///
    /// Eviction uses atomic `remove_if` so an entry refreshed between
    /// collection and removal survives. Governor's internal DashMap does not
    /// support key removal, so when enough entries are evicted the limiter is
    /// rebuilt to reclaim that memory.
    pub fn cleanup(&self) -> usize {
        let inner = match &self.inner {
            Some(inner) => inner,
            None => return 0,
        };

        let now = Instant::now();
        let ttl = inner.entry_ttl;

        let stale_keys: Vec<String> = inner
            .last_access
            .iter()
            .filter(|entry| now.duration_since(*entry.value()) > ttl)
            .map(|entry| entry.key().clone())
            .collect();

        let mut evicted = 0;
        for key in stale_keys {
            if inner
                .last_access
                .remove_if(&key, |_, last_access| {
                    now.duration_since(*last_access) > ttl
                })
                .is_some()
            {
                evicted += 1;
            }
        }

        if evicted > 0 {
            // Rebuilding resets bucket state for active clients, which
            // weakens throttling, so rebuilds are gated on an eviction
            // threshold with a minimum-interval fallback.
            let entries_before = inner.last_access.len() + evicted;
            if self.should_rebuild(evicted, entries_before, inner, now) {
                self.rebuild_limiter(inner);
                tracing::debug!(
                    evicted = evicted,
                    remaining = inner.last_access.len(),
                    "rebuilt rate limiter after cleanup"
                );
            } else {
                tracing::trace!(
                    evicted = evicted,
                    remaining = inner.last_access.len(),
                    "skipped rate limiter rebuild (below threshold)"
                );
            }

            // Allow the at-capacity warning to fire again after space frees.
            inner.at_capacity_warned.store(false, Ordering::Relaxed);
        }

        evicted
    }

    fn should_rebuild(
        &self,
        evicted: usize,
        entries_before_eviction: usize,
        inner: &RateLimitStateInner,
        now: Instant,
    ) -> bool {
        let threshold_by_fraction =
            (entries_before_eviction as f64 * REBUILD_EVICTION_THRESHOLD_FRACTION) as usize;
        let threshold = threshold_by_fraction.max(REBUILD_EVICTION_MIN_COUNT);

        if evicted >= threshold {
            return true;
        }

        let last = inner.last_rebuild.read().unwrap_or_else(|poisoned| {
            tracing::warn!("last_rebuild RwLock was poisoned, recovering");
            poisoned.into_inner()
        });
        now.duration_since(*last) >= REBUILD_MIN_INTERVAL
    }

    /// Replace the limiter with a fresh one built from the same quota.
    fn rebuild_limiter(&self, inner: &RateLimitStateInner) {
        let new_limiter = RateLimiter::dashmap(inner.quota);
        let mut limiter = inner.limiter.write().unwrap_or_else(|poisoned| {
            tracing::warn!("limiter RwLock was poisoned during rebuild, recovering");
            poisoned.into_inner()
        });
        *limiter = new_limiter;

        let mut last_rebuild = inner.last_rebuild.write().unwrap_or_else(|poisoned| {
            tracing::warn!("last_rebuild RwLock was poisoned, recovering");
            poisoned.into_inner()
        });
        *last_rebuild = Instant::now();
    }

    /// Get the current number of tracked clients.
    pub fn entry_count(&self) -> usize {
        match &self.inner {
            Some(inner) => inner.last_access.len(),
            None => 0,
        }
    }

    /// Log a warning if ConnectInfo is not available (only once).
    fn warn_connect_info_missing(&self) {
        if let Some(inner) = &self.inner
            && !inner.connect_info_warned.swap(true, Ordering::Relaxed)
        {
            tracing::warn!(
                "ConnectInfo not available for rate limiting; all requests share a single \
                 bucket. Serve the router with \
                 .into_make_service_with_connect_info::<SocketAddr>() to key by client IP."
            );
        }
    }

    fn warn_at_capacity(warned_flag: &AtomicBool, current_entries: usize, max_entries: u32) {
        if !warned_flag.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                current_entries = current_entries,
                max_entries = max_entries,
                "rate limiter at capacity, rejecting new clients (logged once per capacity event)"
            );
        }
    }
}

/// Reason for rate limit rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitReason {
    /// Request exceeded the client's token bucket.
    RateLimited,
    /// Rate limiter at capacity, cannot track new clients.
    AtCapacity,
}

/// Error returned when a request is rejected by the limiter.
#[derive(Debug)]
pub struct RateLimitError {
    /// Seconds to wait before retrying.
    pub retry_after_secs: u64,
    /// Reason for the rejection.
    pub reason: RateLimitReason,
}

impl IntoResponse for RateLimitError {
    fn into_response(self) -> Response {
        let (code, message) = match self.reason {
            RateLimitReason::RateLimited => (
                "rate_limit_exceeded",
                format!(
                    "rate limit exceeded, retry after {} seconds",
                    self.retry_after_secs
                ),
            ),
            RateLimitReason::AtCapacity => (
                "rate_limiter_at_capacity",
                "the server is experiencing high load, please retry later".to_string(),
            ),
        };

        let body = serde_json::json!({
            "code": code,
            "message": message,
            "retry_after": self.retry_after_secs,
        });

        (
            StatusCode::TOO_MANY_REQUESTS,
            [("Retry-After", self.retry_after_secs.to_string())],
            axum::Json(body),
        )
            .into_response()
    }
}

/// Extract the client key from the direct connection address.
fn extract_client(req: &Request<Body>, state: &RateLimitState) -> String {
    match req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
    {
        Some(ip) => ip,
        None => {
            state.warn_connect_info_missing();
            "unknown".to_string()
        }
    }
}

/// Per-client rate limiting middleware.
///
/// Applied as an outer layer, before authentication, so rejected requests
/// never reach the store.
pub async fn rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if !rate_limit.is_enabled() {
        return next.run(req).await;
    }

    let client = extract_client(&req, &rate_limit);

    match rate_limit.allow(&client) {
        Ok(_) => next.run(req).await,
        Err(e) => e.into_response(),
    }
}

/// Spawn a background task that periodically evicts idle client entries.
pub fn spawn_cleanup_task(
    state: RateLimitState,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let evicted = state.cleanup();
            if evicted > 0 {
                tracing::info!(evicted = evicted, "rate limiter cleanup evicted idle clients");
            }
        }
    })
}
