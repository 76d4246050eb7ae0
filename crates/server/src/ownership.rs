//! Ownership authorization with a TTL memo cache.

use crate::auth::require_activated;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use bindery_core::{Principal, ResourceKind};
use bindery_metadata::repos::OwnershipRepo;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// A cached owner resolution.
#[derive(Clone, Copy, Debug)]
struct CachedOwner {
    owner_id: Uuid,
    cached_at: Instant,
}

/// Per-instance cache of resource owners.
///
/// Keys are `(kind, id)` so resources of different kinds can never alias,
/// even if their identifiers collide. Ownership rarely changes (only create
/// and delete move it), so a stale window of one TTL is acceptable; deletes
/// invalidate eagerly to shrink that window.
pub struct OwnershipCache {
    entries: DashMap<(ResourceKind, Uuid), CachedOwner>,
    ttl: Duration,
}

impl OwnershipCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Look up a cached owner, dropping the entry if it has expired.
    pub fn get(&self, kind: ResourceKind, id: Uuid) -> Option<Uuid> {
        let key = (kind, id);
        let entry = self.entries.get(&key)?;
        if entry.cached_at.elapsed() > self.ttl {
            drop(entry);
            self.entries
                .remove_if(&key, |_, cached| cached.cached_at.elapsed() > self.ttl);
            return None;
        }
        Some(entry.owner_id)
    }

    pub fn insert(&self, kind: ResourceKind, id: Uuid, owner_id: Uuid) {
        self.entries.insert(
            (kind, id),
            CachedOwner {
                owner_id,
                cached_at: Instant::now(),
            },
        );
    }

    /// Drop a single entry. Called on resource deletion so a recreated ID
    /// cannot inherit the old owner for up to a TTL.
    pub fn invalidate(&self, kind: ResourceKind, id: Uuid) {
        self.entries.remove(&(kind, id));
    }

    /// Drop all expired entries. Returns the number evicted.
    ///
    /// Uses `remove_if` so an entry refreshed between collection and removal
    /// is kept.
    pub fn sweep(&self) -> usize {
        let ttl = self.ttl;
        let stale: Vec<(ResourceKind, Uuid)> = self
            .entries
            .iter()
            .filter(|entry| entry.value().cached_at.elapsed() > ttl)
            .map(|entry| *entry.key())
            .collect();

        let mut evicted = 0;
        for key in stale {
            if self
                .entries
                .remove_if(&key, |_, cached| cached.cached_at.elapsed() > ttl)
                .is_some()
            {
                evicted += 1;
            }
        }
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve the owner of a resource, via the cache when possible.
///
/// A nonexistent resource is `NotFound`; the store result is memoized only
/// when the resource exists.
pub async fn resolve_owner(state: &AppState, kind: ResourceKind, id: Uuid) -> ApiResult<Uuid> {
    if let Some(owner_id) = state.ownership.get(kind, id) {
        return Ok(owner_id);
    }

    let owner_id = state
        .metadata
        .owner_of(kind, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{kind} {id} not found")))?;

    state.ownership.insert(kind, id, owner_id);
    Ok(owner_id)
}

/// Middleware guarding mutation routes of ownable resources.
///
/// Runs after authentication: the caller must be an activated account and
/// must own the resource named by the single path parameter.
pub async fn require_owner(
    State((state, kind)): State<(AppState, ResourceKind)>,
    Path(id): Path<Uuid>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = req
        .extensions()
        .get::<Principal>()
        .cloned()
        .unwrap_or(Principal::Anonymous);
    let account = require_activated(&principal)?;

    let owner_id = resolve_owner(&state, kind, id).await?;
    if owner_id != account.user_id {
        return Err(ApiError::NotPermitted(format!(
            "you do not own this {kind}"
        )));
    }

    Ok(next.run(req).await)
}

/// Spawn a background task that periodically sweeps expired owner memos.
pub fn spawn_sweep_task(
    cache: std::sync::Arc<OwnershipCache>,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let evicted = cache.sweep();
            if evicted > 0 {
                tracing::debug!(
                    evicted = evicted,
                    remaining = cache.len(),
                    "swept expired ownership cache entries"
                );
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_round_trip() {
        let cache = OwnershipCache::new(Duration::from_secs(60));
        let id = Uuid::new_v4();
        let owner = Uuid::new_v4();

        assert!(cache.get(ResourceKind::Book, id).is_none());
        cache.insert(ResourceKind::Book, id, owner);
        assert_eq!(cache.get(ResourceKind::Book, id), Some(owner));
    }

    #[test]
    fn test_cache_keys_by_kind_and_id() {
        let cache = OwnershipCache::new(Duration::from_secs(60));
        let id = Uuid::new_v4();
        let book_owner = Uuid::new_v4();
        let review_owner = Uuid::new_v4();

        // Same UUID under two kinds stays two independent entries.
        cache.insert(ResourceKind::Book, id, book_owner);
        cache.insert(ResourceKind::Review, id, review_owner);

        assert_eq!(cache.get(ResourceKind::Book, id), Some(book_owner));
        assert_eq!(cache.get(ResourceKind::Review, id), Some(review_owner));
        assert!(cache.get(ResourceKind::Comment, id).is_none());
    }

    #[test]
    fn test_cache_invalidate() {
        let cache = OwnershipCache::new(Duration::from_secs(60));
        let id = Uuid::new_v4();
        cache.insert(ResourceKind::Booklist, id, Uuid::new_v4());

        cache.invalidate(ResourceKind::Booklist, id);
        assert!(cache.get(ResourceKind::Booklist, id).is_none());

        // Invalidating an absent entry is a no-op.
        cache.invalidate(ResourceKind::Booklist, id);
    }

    #[test]
    fn test_cache_expiry_on_read() {
        let cache = OwnershipCache::new(Duration::from_millis(0));
        let id = Uuid::new_v4();
        cache.insert(ResourceKind::Book, id, Uuid::new_v4());

        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get(ResourceKind::Book, id).is_none());
        // The expired entry was removed, not just hidden.
        assert!(cache.is_empty());
    }

    #[test]
    fn test_sweep_evicts_only_expired() {
        let cache = OwnershipCache::new(Duration::from_millis(50));
        let stale = Uuid::new_v4();
        cache.insert(ResourceKind::Book, stale, Uuid::new_v4());

        std::thread::sleep(Duration::from_millis(60));
        let fresh = Uuid::new_v4();
        cache.insert(ResourceKind::Book, fresh, Uuid::new_v4());

        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(ResourceKind::Book, fresh).is_some());
    }
}
