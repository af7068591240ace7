//! Discovery sweeps.
//!
//! A [`Sweep`] is one point-in-time survey of the fleet:
//!
//! 1. Close every cached session.
//! 2. Query all broadcast targets and manual hosts concurrently. Broadcast
//!    answers from hosts that already have a reconnect config are dropped;
//!    those hosts are reached through their config instead.
//! 3. Update each new device as it arrives; failures are dropped.
//! 4. Reconnect every known host that did not turn up in this sweep.
//! 5. Update again, apply the bridge and device-type filters, and cache the
//!    survivors under their host locks.
//! 6. Classify survivors concurrently, storing reconnect configs for the ones
//!    that succeed.
//! 7. Disconnect everything the sweep opened. The cache ends empty.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{join, join_all};
use futures::StreamExt;
use hearth_core::{Credentials, DeviceConfig, Host};
use hearth_device::{Device, DeviceLibrary, ModuleKind};
use parking_lot::Mutex;

use crate::classify::{classify, StatusSnapshot};
use crate::resolver::SessionResolver;
use crate::types::{DiscoveryRequest, FleetConfig};

/// Result of a sweep: one snapshot per reported host.
pub type DiscoveryReport = BTreeMap<Host, StatusSnapshot>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Broadcast,
    Manual,
}

/// One discovery pass over the fleet.
pub struct Sweep<'a, L: DeviceLibrary> {
    resolver: &'a SessionResolver<L>,
    config: &'a FleetConfig,
    credentials: Option<&'a Credentials>,
    found: Mutex<BTreeMap<Host, L::Device>>,
}

impl<'a, L: DeviceLibrary> Sweep<'a, L> {
    /// Prepare a sweep over the resolver's shared state.
    #[must_use]
    pub fn new(
        resolver: &'a SessionResolver<L>,
        config: &'a FleetConfig,
        credentials: Option<&'a Credentials>,
    ) -> Self {
        Self {
            resolver,
            config,
            credentials,
            found: Mutex::new(BTreeMap::new()),
        }
    }

    /// Run the sweep.
    ///
    /// Per-device failures are logged and leave that device out of the
    /// report; they never abort the sweep. The sweep must be driven to
    /// completion: dropping it part-way leaves opened sessions behind, so
    /// callers that can be cancelled run it on its own task (see
    /// [`FleetService`](crate::FleetService)).
    pub async fn run(&self, request: &DiscoveryRequest) -> DiscoveryReport {
        if !self.resolver.connections().is_empty() {
            self.resolver.close_all().await;
            tracing::info!("Closed existing device connections before discovery");
        }

        let targets: Vec<&str> = std::iter::once(self.config.default_broadcast.as_str())
            .chain(request.additional_broadcasts.iter().map(String::as_str))
            .collect();
        let manual: Vec<Host> = request
            .manual_devices
            .iter()
            .filter_map(|raw| match Host::parse(raw) {
                Ok(host) => Some(host),
                Err(err) => {
                    tracing::warn!(host = %raw, error = %err, "Ignoring invalid manual device");
                    None
                }
            })
            .collect();

        join(
            join_all(targets.iter().map(|target| self.broadcast(target))),
            join_all(manual.iter().map(|host| self.connect_manual(host))),
        )
        .await;

        self.reconnect_known().await;

        let survivors = self.admit_survivors().await;
        let described = join_all(
            survivors
                .iter()
                .map(|(host, device)| async move { (host, device, self.describe(host, device).await) }),
        )
        .await;

        let mut report = DiscoveryReport::new();
        let mut opened = Vec::with_capacity(described.len());
        for (host, device, snapshot) in described {
            if let Some(snapshot) = snapshot {
                report.insert(host.clone(), snapshot);
                opened.push((host, device));
            }
        }

        join_all(opened.into_iter().map(|(host, device)| self.release(host, device))).await;
        tracing::info!(devices = report.len(), "Discovery complete");
        report
    }

    async fn broadcast(&self, target: &str) {
        tracing::debug!(broadcast = target, "Discovering on broadcast");
        self.resolver
            .library()
            .discover(target, self.credentials)
            .for_each_concurrent(None, |result| async move {
                match result {
                    Ok(device) => self.admit(device, Origin::Broadcast).await,
                    Err(err) => {
                        tracing::warn!(broadcast = target, error = %err, "Broadcast discovery failed");
                    }
                }
            })
            .await;
    }

    async fn connect_manual(&self, host: &Host) {
        let already_found = self.found.lock().contains_key(host);
        if already_found || self.resolver.configs().contains(host) {
            return;
        }

        tracing::debug!(host = %host, "Discovering manual device");
        match self
            .resolver
            .library()
            .discover_single(host, self.credentials)
            .await
        {
            Ok(device) => self.admit(device, Origin::Manual).await,
            Err(err) => {
                tracing::warn!(host = %host, error = %err, "Manual device discovery failed");
            }
        }
    }

    /// Update a freshly discovered device and add it to the working set.
    async fn admit(&self, device: L::Device, origin: Origin) {
        let host = device.host().clone();
        if origin == Origin::Broadcast && self.resolver.configs().contains(&host) {
            tracing::debug!(host = %host, "Known host answered broadcast, using its reconnect config");
            disconnect(&device).await;
            return;
        }

        if let Err(err) = device.update().await {
            if err.is_authentication() || err.is_unsupported() {
                tracing::warn!(host = %host, error = %err, "Rejecting discovered device");
            } else {
                tracing::warn!(host = %host, error = %err, "Update of discovered device failed");
            }
            disconnect(&device).await;
            return;
        }

        self.keep(device).await;
    }

    /// Add a device to the working set; a second session for the same host
    /// is disconnected.
    async fn keep(&self, device: L::Device) {
        let duplicate = {
            let mut found = self.found.lock();
            match found.entry(device.host().clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(device);
                    None
                }
                Entry::Occupied(_) => Some(device),
            }
        };
        if let Some(duplicate) = duplicate {
            tracing::debug!(host = %duplicate.host(), "Dropping duplicate session");
            disconnect(&duplicate).await;
        }
    }

    async fn reconnect_known(&self) {
        let pending: Vec<DeviceConfig> = {
            let found = self.found.lock();
            self.resolver
                .configs()
                .entries()
                .into_iter()
                .filter(|config| {
                    let live = found.contains_key(&config.host);
                    if live {
                        tracing::debug!(host = %config.host, "Skipping reconnect, already connected");
                    }
                    !live
                })
                .collect()
        };

        join_all(pending.iter().map(|config| async move {
            match self.resolver.library().connect(config).await {
                Ok(device) => self.keep(device).await,
                Err(err) => {
                    tracing::warn!(host = %config.host, error = %err, "Reconnect of known device failed");
                }
            }
        }))
        .await;
    }

    /// Refresh and filter the working set, caching the survivors.
    async fn admit_survivors(&self) -> Vec<(Host, Arc<L::Device>)> {
        let found = std::mem::take(&mut *self.found.lock());
        join_all(found.into_values().map(|device| self.vet(device)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    async fn vet(&self, device: L::Device) -> Option<(Host, Arc<L::Device>)> {
        let host = device.host().clone();

        if let Err(err) = device.update().await {
            tracing::warn!(host = %host, error = %err, "Device check failed");
            disconnect(&device).await;
            return None;
        }

        if self.config.hide_homekit_matter
            && (device.has_module(ModuleKind::HomeKit) || device.has_module(ModuleKind::Matter))
        {
            tracing::info!(host = %host, "Skipping device with native HomeKit or Matter support");
            disconnect(&device).await;
            return None;
        }

        let device_type = device.info().device_type;
        if !self.config.is_supported(device_type) {
            tracing::info!(host = %host, device_type = %device_type, "Skipping unsupported device");
            disconnect(&device).await;
            return None;
        }

        let device = Arc::new(device);
        let guard = self.resolver.locks().acquire(&host).await;
        if let Some(previous) = self
            .resolver
            .connections()
            .insert(&guard, Arc::clone(&device))
        {
            disconnect(&*previous).await;
        }
        Some((host, device))
    }

    async fn describe(&self, host: &Host, device: &Arc<L::Device>) -> Option<StatusSnapshot> {
        match classify(&**device) {
            Ok(snapshot) => {
                self.resolver.configs().insert(device.config());
                tracing::debug!(host = %host, "Device info created");
                Some(snapshot)
            }
            Err(err) => {
                tracing::error!(host = %host, error = %err, "Error creating device info");
                let guard = self.resolver.locks().acquire(host).await;
                self.resolver.invalidate(&guard, device).await;
                None
            }
        }
    }

    async fn release(&self, host: &Host, device: &Arc<L::Device>) {
        let guard = self.resolver.locks().acquire(host).await;
        self.resolver.connections().remove_if_same(&guard, device);
        disconnect(&**device).await;
    }
}

async fn disconnect<D: Device>(device: &D) {
    if let Err(err) = device.disconnect().await {
        tracing::warn!(host = %device.host(), error = %err, "Disconnect failed");
    }
}
