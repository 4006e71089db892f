use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::Value;
use tokio::{sync::OnceCell, time::Instant};

use crate::{
    backend::{Resource, Tag},
    error::BackendError,
};

type CacheKey = (String, Resource);

struct Slot {
    cell: OnceCell<Value>,
    created: Instant,
}

/// ResourceCache
///
/// Per-session cache of backend reads, keyed by (access token, resource).
///
/// * Concurrent readers of the same key share a single in-flight fetch.
/// * A failed fetch leaves the slot empty; the next reader tries again.
/// * Entries expire after `ttl` and are dropped by tag when a mutation
///   succeeds. Expired entries of every session are swept whenever a new
///   entry is created.
///
/// The map lock is never held across an await.
pub struct ResourceCache {
    ttl: Duration,
    slots: Mutex<HashMap<CacheKey, Arc<Slot>>>,
}

impl ResourceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value for `(token, resource)` or runs `fetch` to
    /// populate it.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        token: &str,
        resource: Resource,
        fetch: F,
    ) -> Result<Value, BackendError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, BackendError>>,
    {
        let slot = self.slot(token, resource);
        slot.cell.get_or_try_init(fetch).await.cloned()
    }

    fn slot(&self, token: &str, resource: Resource) -> Arc<Slot> {
        let key = (token.to_string(), resource);
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(slot) = slots.get(&key) {
            if slot.created.elapsed() < self.ttl {
                return Arc::clone(slot);
            }
        }

        // Sessions that end without a logout never read their keys again.
        let ttl = self.ttl;
        slots.retain(|_, slot| slot.created.elapsed() < ttl);

        let slot = Arc::new(Slot {
            cell: OnceCell::new(),
            created: Instant::now(),
        });
        slots.insert(key, Arc::clone(&slot));
        slot
    }

    /// Drops every entry of this session carrying one of `tags`.
    pub fn invalidate(&self, token: &str, tags: &[Tag]) {
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.retain(|(owner, resource), _| {
            owner != token || !resource.tags().iter().any(|tag| tags.contains(tag))
        });
    }

    /// Drops every entry of this session (logout).
    pub fn clear_session(&self, token: &str) {
        let mut slots = match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        slots.retain(|(owner, _), _| owner != token);
    }

    pub fn len(&self) -> usize {
        self.slots.lock().map(|slots| slots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
