//! Content-addressable resource cache
//!
//! Holds the latest wrapped value of every resource id ever fetched, one map
//! per resource type. Every id owns a lock so that writers of the same id
//! serialize while writers of different ids run in parallel. A second set of
//! key locks serializes concurrent fetches of the same (kind, scope) pair.

use crate::identity::content_hash;
use crate::models::{ResourceType, WrappedResource};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Cached value of one resource id
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Hash of the value with all timestamp-like fields removed
    pub content_hash: String,
    pub value: WrappedResource,
}

/// What an upsert did to the entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// First time this id was seen
    Created,
    /// Content unchanged; only the timestamp moved
    Refreshed,
    /// Content changed and was replaced
    Updated,
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// Process-wide resource cache
pub struct ResourceCache {
    /// One map per [`ResourceType`], indexed by discriminant
    entries: [DashMap<String, Slot>; ResourceType::ALL.len()],
    /// Locks serializing fetches of the same key
    key_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Default for ResourceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceCache {
    pub fn new() -> Self {
        Self {
            entries: std::array::from_fn(|_| DashMap::new()),
            key_locks: DashMap::new(),
        }
    }

    fn shard(&self, kind: ResourceType) -> &DashMap<String, Slot> {
        &self.entries[kind as usize]
    }

    /// Lock handle for an id, created on first access
    fn slot(&self, kind: ResourceType, id: &str) -> Slot {
        // The shard guard is released before the caller awaits the slot lock.
        self.shard(kind).entry(id.to_string()).or_default().clone()
    }

    /// Insert or refresh a resource under its id lock.
    ///
    /// The timestamp is always refreshed. Properties and annotations are
    /// replaced only when the content hash changed. Returns the stored value
    /// as of this write.
    pub async fn upsert(&self, resource: WrappedResource) -> (WrappedResource, UpsertOutcome) {
        let hash = content_hash(&resource);
        let slot = self.slot(resource.kind, &resource.id);
        let mut guard = slot.lock().await;

        match guard.as_mut() {
            Some(entry) if entry.content_hash == hash => {
                entry.value.timestamp = resource.timestamp;
                (entry.value.clone(), UpsertOutcome::Refreshed)
            }
            Some(entry) => {
                debug!(kind = %resource.kind, id = %resource.id, "Resource content changed");
                entry.content_hash = hash;
                entry.value = resource;
                (entry.value.clone(), UpsertOutcome::Updated)
            }
            None => {
                let stored = resource.clone();
                *guard = Some(CacheEntry {
                    content_hash: hash,
                    value: resource,
                });
                (stored, UpsertOutcome::Created)
            }
        }
    }

    /// Latest cached entry for an id
    pub async fn get(&self, kind: ResourceType, id: &str) -> Option<CacheEntry> {
        let slot = self.shard(kind).get(id).map(|slot| slot.clone())?;
        let guard = slot.lock().await;
        guard.clone()
    }

    /// Acquire the lock for a fetch key, e.g. `Container@node-1`.
    ///
    /// The guard releases on drop, including when the fetch fails.
    pub async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self.key_locks.entry(key.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    /// Number of cached ids of the given kind
    pub fn len_of(&self, kind: ResourceType) -> usize {
        self.shard(kind).len()
    }

    /// Number of cached ids across all kinds
    pub fn len(&self) -> usize {
        self.entries.iter().map(DashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
