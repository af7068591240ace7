//! Cache of live device sessions.
//!
//! The cache is the authoritative record of which hosts are currently
//! connected. Reads are lock-free with respect to host locks, but every
//! mutation takes the host's [`HostGuard`], which keeps at most one session
//! per host even when discovery and commands race.

use std::collections::HashMap;
use std::sync::Arc;

use hearth_core::Host;
use parking_lot::RwLock;

use crate::locks::HostGuard;

/// A cache of live sessions keyed by host.
#[derive(Debug)]
pub struct ConnectionCache<D> {
    entries: RwLock<HashMap<Host, Arc<D>>>,
}

impl<D> Default for ConnectionCache<D> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<D> ConnectionCache<D> {
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the session for a host, if cached.
    #[must_use]
    pub fn get(&self, host: &Host) -> Option<Arc<D>> {
        self.entries.read().get(host).cloned()
    }

    /// Insert or replace the session for the guarded host.
    ///
    /// Returns the session that was replaced, which the caller must disconnect.
    pub fn insert(&self, guard: &HostGuard, handle: Arc<D>) -> Option<Arc<D>> {
        self.entries.write().insert(guard.host().clone(), handle)
    }

    /// Remove the session for the guarded host.
    pub fn remove(&self, guard: &HostGuard) -> Option<Arc<D>> {
        self.entries.write().remove(guard.host())
    }

    /// Remove the guarded host's session only if it is `handle`.
    ///
    /// Returns true if an entry was removed.
    pub fn remove_if_same(&self, guard: &HostGuard, handle: &Arc<D>) -> bool {
        let mut entries = self.entries.write();
        match entries.get(guard.host()) {
            Some(cached) if Arc::ptr_eq(cached, handle) => {
                entries.remove(guard.host());
                true
            }
            _ => false,
        }
    }

    /// Check if a host has a cached session.
    #[must_use]
    pub fn contains(&self, host: &Host) -> bool {
        self.entries.read().contains_key(host)
    }

    /// Get the number of cached sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Get all cached hosts.
    #[must_use]
    pub fn hosts(&self) -> Vec<Host> {
        self.entries.read().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locks::HostLockTable;

    fn host(s: &str) -> Host {
        Host::parse(s).unwrap()
    }

    #[tokio::test]
    async fn cache_insert_and_get() {
        let locks = HostLockTable::new();
        let cache = ConnectionCache::new();
        let target = host("10.0.0.1");

        assert!(cache.get(&target).is_none());

        let guard = locks.acquire(&target).await;
        assert!(cache.insert(&guard, Arc::new("session-1")).is_none());

        assert_eq!(cache.get(&target).as_deref(), Some(&"session-1"));
        assert!(cache.contains(&target));
    }

    #[tokio::test]
    async fn cache_replace_returns_previous() {
        let locks = HostLockTable::new();
        let cache = ConnectionCache::new();
        let guard = locks.acquire(&host("10.0.0.1")).await;

        cache.insert(&guard, Arc::new(1));
        let previous = cache.insert(&guard, Arc::new(2));

        assert_eq!(previous.as_deref(), Some(&1));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn remove_if_same_ignores_other_sessions() {
        let locks = HostLockTable::new();
        let cache = ConnectionCache::new();
        let guard = locks.acquire(&host("10.0.0.1")).await;

        let stale = Arc::new(1);
        let current = Arc::new(2);
        cache.insert(&guard, Arc::clone(&current));

        assert!(!cache.remove_if_same(&guard, &stale));
        assert!(cache.contains(guard.host()));
        assert!(cache.remove_if_same(&guard, &current));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn hosts_lists_every_entry() {
        let locks = HostLockTable::new();
        let cache = ConnectionCache::new();
        for h in ["10.0.0.1", "10.0.0.2"] {
            let guard = locks.acquire(&host(h)).await;
            cache.insert(&guard, Arc::new(()));
        }

        let mut hosts = cache.hosts();
        hosts.sort();
        assert_eq!(hosts, vec![host("10.0.0.1"), host("10.0.0.2")]);

        let guard = locks.acquire(&host("10.0.0.1")).await;
        assert!(cache.remove(&guard).is_some());
        assert_eq!(cache.len(), 1);
    }
}
