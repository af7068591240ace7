//! Per-host mutual exclusion.
//!
//! Every operation that touches a host's cached session (status reads,
//! commands, reconnect and evict sequences) runs while holding that host's
//! [`HostGuard`]. Locks are created lazily and never removed, so two
//! callers asking for the same host always contend on the same mutex.

use std::collections::HashMap;
use std::sync::Arc;

use hearth_core::Host;
use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Table of per-host async mutexes.
#[derive(Debug, Default)]
pub struct HostLockTable {
    locks: Mutex<HashMap<Host, Arc<AsyncMutex<()>>>>,
}

impl HostLockTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the lock for a host, creating it on first use.
    #[must_use]
    pub fn lock_for(&self, host: &Host) -> Arc<AsyncMutex<()>> {
        Arc::clone(
            self.locks
                .lock()
                .entry(host.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        )
    }

    /// Wait for exclusive access to a host.
    pub async fn acquire(&self, host: &Host) -> HostGuard {
        let lock = self.lock_for(host);
        let guard = lock.lock_owned().await;
        HostGuard {
            host: host.clone(),
            _guard: guard,
        }
    }

    /// Check whether a lock has been created for a host.
    #[must_use]
    pub fn contains(&self, host: &Host) -> bool {
        self.locks.lock().contains_key(host)
    }

    /// Number of hosts with a lock.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Check if no lock has been created yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

/// Proof of exclusive access to one host.
///
/// Connection cache mutations take a `&HostGuard`, so they can only happen
/// while the lock is held.
#[derive(Debug)]
pub struct HostGuard {
    host: Host,
    _guard: OwnedMutexGuard<()>,
}

impl HostGuard {
    /// The host this guard locks.
    #[must_use]
    pub const fn host(&self) -> &Host {
        &self.host
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn host(s: &str) -> Host {
        Host::parse(s).unwrap()
    }

    #[test]
    fn lock_for_returns_same_instance() {
        let table = HostLockTable::new();
        let a = table.lock_for(&host("10.0.0.1"));
        let b = table.lock_for(&host("10.0.0.1"));
        let c = table.lock_for(&host("10.0.0.2"));

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(table.len(), 2);
    }

    #[tokio::test]
    async fn same_host_is_exclusive() {
        let table = HostLockTable::new();
        let target = host("10.0.0.1");

        let guard = table.acquire(&target).await;
        assert_eq!(guard.host(), &target);
        assert!(table.lock_for(&target).try_lock().is_err());

        drop(guard);
        assert!(table.lock_for(&target).try_lock().is_ok());
    }

    #[tokio::test]
    async fn different_hosts_do_not_block() {
        let table = HostLockTable::new();
        let _first = table.acquire(&host("10.0.0.1")).await;

        let second = tokio::time::timeout(
            Duration::from_millis(100),
            table.acquire(&host("10.0.0.2")),
        )
        .await;
        assert!(second.is_ok());
    }
}
