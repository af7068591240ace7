//! Session resolution with a single retry.
//!
//! [`SessionResolver::run`] executes one operation against a host under the
//! host's lock. The session comes from the connection cache, or is opened from
//! the host's reconnect config on a miss. If the operation fails in a way a
//! fresh session could fix, the session is invalidated (disconnected and
//! evicted) and the operation is retried exactly once on a newly resolved
//! session. A second failure invalidates again and is returned.

use std::future::Future;
use std::sync::Arc;

use hearth_core::Host;
use hearth_device::{Device, DeviceLibrary};

use crate::configs::ConfigStore;
use crate::connections::ConnectionCache;
use crate::error::{FleetError, Result};
use crate::locks::{HostGuard, HostLockTable};

/// Owner of the shared session state and the retry protocol.
pub struct SessionResolver<L: DeviceLibrary> {
    library: Arc<L>,
    connections: ConnectionCache<L::Device>,
    configs: ConfigStore,
    locks: HostLockTable,
}

impl<L: DeviceLibrary> SessionResolver<L> {
    /// Create a resolver with empty tables.
    #[must_use]
    pub fn new(library: Arc<L>) -> Self {
        Self {
            library,
            connections: ConnectionCache::new(),
            configs: ConfigStore::new(),
            locks: HostLockTable::new(),
        }
    }

    /// The device library.
    #[must_use]
    pub fn library(&self) -> &L {
        &self.library
    }

    /// The live session cache.
    #[must_use]
    pub const fn connections(&self) -> &ConnectionCache<L::Device> {
        &self.connections
    }

    /// The reconnect config store.
    #[must_use]
    pub const fn configs(&self) -> &ConfigStore {
        &self.configs
    }

    /// The host lock table.
    #[must_use]
    pub const fn locks(&self) -> &HostLockTable {
        &self.locks
    }

    /// Return the cached session for the guarded host, connecting from its
    /// reconnect config on a miss.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::UnknownHost` if there is neither a session nor a
    /// config, or the library error if connecting fails.
    pub async fn resolve(&self, guard: &HostGuard) -> Result<Arc<L::Device>> {
        let host = guard.host();
        if let Some(handle) = self.connections.get(host) {
            return Ok(handle);
        }

        let config = self
            .configs
            .get(host)
            .ok_or_else(|| FleetError::UnknownHost(host.clone()))?;

        tracing::debug!(host = %host, "Session not cached, connecting");
        let handle = Arc::new(self.library.connect(&config).await?);
        self.connections.insert(guard, Arc::clone(&handle));
        Ok(handle)
    }

    /// Disconnect a session and evict it from the cache.
    ///
    /// Disconnect failures are logged and otherwise ignored.
    pub async fn invalidate(&self, guard: &HostGuard, handle: &Arc<L::Device>) {
        if let Err(err) = handle.disconnect().await {
            tracing::warn!(host = %guard.host(), error = %err, "Disconnect failed during invalidation");
        }
        self.connections.remove_if_same(guard, handle);
        tracing::debug!(host = %guard.host(), "Invalidated session");
    }

    /// Run `op` against the host's session, retrying once on a fresh session.
    ///
    /// The host lock is held across both attempts.
    ///
    /// # Errors
    ///
    /// Returns the first error if it is not retriable, otherwise the error of
    /// the second attempt.
    pub async fn run<T, F, Fut>(&self, host: &Host, op: F) -> Result<T>
    where
        T: Send,
        F: Fn(Arc<L::Device>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
    {
        let guard = self.locks.acquire(host).await;

        let first = match self.attempt(&guard, &op).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !first.is_retriable() {
            return Err(first);
        }

        tracing::warn!(host = %host, error = %first, "Operation failed, retrying on a fresh session");
        self.attempt(&guard, &op).await.map_err(|err| {
            tracing::error!(host = %host, error = %err, "Operation failed after retry");
            err
        })
    }

    async fn attempt<T, F, Fut>(&self, guard: &HostGuard, op: &F) -> Result<T>
    where
        F: Fn(Arc<L::Device>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let handle = self.resolve(guard).await?;
        match op(Arc::clone(&handle)).await {
            Ok(value) => Ok(value),
            Err(err) => {
                if err.is_retriable() {
                    self.invalidate(guard, &handle).await;
                }
                Err(err)
            }
        }
    }

    /// Disconnect and evict every cached session, each under its host lock.
    pub async fn close_all(&self) {
        let hosts = self.connections.hosts();
        futures::future::join_all(hosts.iter().map(|host| async move {
            let guard = self.locks.acquire(host).await;
            if let Some(handle) = self.connections.remove(&guard) {
                if let Err(err) = handle.disconnect().await {
                    tracing::warn!(host = %host, error = %err, "Disconnect failed");
                }
            }
        }))
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_core::DeviceConfig;
    use hearth_device::{DeviceError, DeviceSpec, Endpoint, SimulatedLibrary};

    fn host(s: &str) -> Host {
        Host::parse(s).unwrap()
    }

    fn setup(target: &Host) -> (SimulatedLibrary, SessionResolver<SimulatedLibrary>) {
        let library = SimulatedLibrary::with_devices([DeviceSpec::plug(target.clone(), "Lamp")]);
        let resolver = SessionResolver::new(Arc::new(library.clone()));
        resolver.configs().insert(DeviceConfig::new(target.clone()));
        (library, resolver)
    }

    async fn read_alias(device: Arc<hearth_device::SimulatedDevice>) -> Result<Option<String>> {
        device.update().await?;
        Ok(device.alias())
    }

    #[tokio::test]
    async fn cache_miss_connects_from_config() {
        let target = host("10.0.0.1");
        let (library, resolver) = setup(&target);

        let alias = resolver.run(&target, read_alias).await.unwrap();
        assert_eq!(alias.as_deref(), Some("Lamp"));
        assert!(resolver.connections().contains(&target));

        resolver.run(&target, read_alias).await.unwrap();
        assert_eq!(library.session_stats(&target).opened, 1);
    }

    #[tokio::test]
    async fn unknown_host_is_not_retried() {
        let (library, resolver) = setup(&host("10.0.0.1"));
        let stranger = host("10.0.0.99");

        let err = resolver.run(&stranger, read_alias).await.unwrap_err();
        assert!(matches!(err, FleetError::UnknownHost(_)));
        assert_eq!(library.session_stats(&stranger).opened, 0);
    }

    #[tokio::test]
    async fn stale_session_is_replaced_once() {
        let target = host("10.0.0.1");
        let (library, resolver) = setup(&target);
        resolver.run(&target, read_alias).await.unwrap();

        library.invalidate_sessions(&target);
        let alias = resolver.run(&target, read_alias).await.unwrap();

        assert_eq!(alias.as_deref(), Some("Lamp"));
        let stats = library.session_stats(&target);
        assert_eq!(stats.opened, 2);
        assert_eq!(stats.live, 1);
    }

    #[tokio::test]
    async fn second_failure_is_terminal() {
        let target = host("10.0.0.1");
        let (library, resolver) = setup(&target);
        resolver.run(&target, read_alias).await.unwrap();

        library.fail_next_calls(&target, 10);
        let err = resolver.run(&target, read_alias).await.unwrap_err();

        assert!(err.is_retriable());
        // One failed update on the cached session, one on the reconnect.
        assert_eq!(library.pending_failures(&target), 8);
        assert!(!resolver.connections().contains(&target));
        assert_eq!(library.session_stats(&target).live, 0);
    }

    #[tokio::test]
    async fn non_retriable_failure_keeps_session() {
        let target = host("10.0.0.1");
        let (library, resolver) = setup(&target);

        let err = resolver
            .run(&target, |_device| async {
                Err::<(), _>(FleetError::Device(DeviceError::NotSupported("fan")))
            })
            .await
            .unwrap_err();

        assert!(!err.is_retriable());
        assert!(resolver.connections().contains(&target));
        assert_eq!(library.session_stats(&target).opened, 1);
    }

    #[tokio::test]
    async fn close_all_disconnects_everything() {
        let target = host("10.0.0.1");
        let (library, resolver) = setup(&target);
        resolver.run(&target, read_alias).await.unwrap();

        resolver.close_all().await;

        assert!(resolver.connections().is_empty());
        assert_eq!(library.live_sessions(), 0);
    }
}
