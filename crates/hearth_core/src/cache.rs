//! Single-flight result cache
//!
//! TTL-bounded memoization of per-device diagnostic passes, keyed by
//! `(device_id, window_size)`. Concurrent requests for the same key
//! attach to one in-flight computation instead of duplicating the work.
//! Failed computations are never cached; the next caller recomputes.
//! The entry count is LRU-bounded, and collaborators that learn of new
//! events for a device can call [`ResultCache::invalidate`] directly.

use hearth_common::{CacheConfig, DiagnosticError, DiagnosticReport};
use lru::LruCache;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub device_id: String,
    pub window_size: usize,
}

struct Slot {
    created_at: Instant,
    cell: Arc<OnceCell<DiagnosticReport>>,
}

impl Slot {
    fn new() -> Self {
        Self {
            created_at: Instant::now(),
            cell: Arc::new(OnceCell::new()),
        }
    }
}

pub struct ResultCache {
    config: CacheConfig,
    slots: Mutex<LruCache<CacheKey, Slot>>,
}

impl ResultCache {
    pub fn new(config: CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            slots: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Return the cached report for `key`, or run `compute` once and
    /// share its result with every concurrent caller for the same key.
    pub async fn get_or_compute<F, Fut>(
        &self,
        key: CacheKey,
        compute: F,
    ) -> Result<DiagnosticReport, DiagnosticError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<DiagnosticReport, DiagnosticError>>,
    {
        if !self.config.enabled {
            return compute().await;
        }

        let cell = {
            let mut slots = self.slots.lock().await;
            // A completed entry lives until its TTL; a pending entry is
            // an in-flight computation other callers attach to
            let reusable = match slots.get(&key) {
                Some(slot)
                    if slot.cell.get().is_none()
                        || slot.created_at.elapsed() < self.config.ttl() =>
                {
                    Some(Arc::clone(&slot.cell))
                }
                _ => None,
            };
            match reusable {
                Some(cell) => {
                    debug!("cache hit for {}:{}", key.device_id, key.window_size);
                    cell
                }
                None => {
                    debug!("cache miss for {}:{}", key.device_id, key.window_size);
                    let slot = Slot::new();
                    let cell = Arc::clone(&slot.cell);
                    slots.put(key.clone(), slot);
                    cell
                }
            }
        };

        cell.get_or_try_init(compute).await.cloned()
    }

    /// Drop every entry for a device, so the next request recomputes
    /// against fresh events.
    pub async fn invalidate(&self, device_id: &str) {
        let mut slots = self.slots.lock().await;
        let stale: Vec<CacheKey> = slots
            .iter()
            .filter(|(key, _)| key.device_id == device_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            slots.pop(&key);
        }
    }

    /// Drop entries past their TTL. Expiry also happens lazily on
    /// access; this is for hosts that want bounded memory between
    /// requests.
    pub async fn purge_expired(&self) {
        let mut slots = self.slots.lock().await;
        let ttl = self.config.ttl();
        let stale: Vec<CacheKey> = slots
            .iter()
            .filter(|(_, slot)| slot.cell.get().is_some() && slot.created_at.elapsed() >= ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            slots.pop(&key);
        }
    }
}
