//! Reconnect configs.
//!
//! A config is written the first time a device classifies successfully and
//! is only dropped by a fleet-wide reset. Writes are last-write-wins and need
//! no host lock.

use std::collections::HashMap;

use hearth_core::{DeviceConfig, Host};
use parking_lot::RwLock;

/// Store of reconnect configs keyed by host.
#[derive(Debug, Default)]
pub struct ConfigStore {
    configs: RwLock<HashMap<Host, DeviceConfig>>,
}

impl ConfigStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the config for a host.
    #[must_use]
    pub fn get(&self, host: &Host) -> Option<DeviceConfig> {
        self.configs.read().get(host).cloned()
    }

    /// Record a config, replacing any previous one for the same host.
    pub fn insert(&self, config: DeviceConfig) {
        self.configs.write().insert(config.host.clone(), config);
    }

    /// Check if a host is known.
    #[must_use]
    pub fn contains(&self, host: &Host) -> bool {
        self.configs.read().contains_key(host)
    }

    /// Snapshot of every stored config.
    #[must_use]
    pub fn entries(&self) -> Vec<DeviceConfig> {
        self.configs.read().values().cloned().collect()
    }

    /// Number of known hosts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.configs.read().len()
    }

    /// Check if no host is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.configs.read().is_empty()
    }

    /// Forget every config.
    pub fn clear(&self) {
        self.configs.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_write_wins() {
        let store = ConfigStore::new();
        let host = Host::parse("10.0.0.3").unwrap();

        store.insert(DeviceConfig::new(host.clone()));
        let mut updated = DeviceConfig::new(host.clone());
        updated.port_override = Some(9999);
        store.insert(updated);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&host).unwrap().port_override, Some(9999));
        assert!(store.contains(&host));
    }

    #[test]
    fn clear_forgets_everything() {
        let store = ConfigStore::new();
        store.insert(DeviceConfig::new(Host::parse("10.0.0.3").unwrap()));
        store.insert(DeviceConfig::new(Host::parse("10.0.0.4").unwrap()));
        assert_eq!(store.entries().len(), 2);

        store.clear();
        assert!(store.is_empty());
    }
}
