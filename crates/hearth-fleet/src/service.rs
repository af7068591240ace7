//! Fleet service implementation.
//!
//! This module provides the `Fleet` trait and the `FleetService`
//! implementation that ties discovery, session resolution, classification
//! and command dispatch together over one device library.

use std::sync::Arc;

use async_trait::async_trait;
use hearth_core::{Credentials, Host};
use hearth_device::{Device, DeviceLibrary};

use crate::classify::{self, SysInfo};
use crate::command::{self, Command};
use crate::discovery::{DiscoveryReport, Sweep};
use crate::error::{FleetError, Result};
use crate::resolver::SessionResolver;
use crate::types::{ControlRequest, DiscoveryRequest, FleetConfig};

/// Trait defining the fleet operations exposed to the gateway.
#[async_trait]
pub trait Fleet: Send + Sync {
    // =========================================================================
    // Discovery
    // =========================================================================

    /// Sweep the network and report every supported device.
    ///
    /// Individual device failures are logged and leave the device out of the
    /// report.
    async fn discover(
        &self,
        request: DiscoveryRequest,
        credentials: Option<Credentials>,
    ) -> Result<DiscoveryReport>;

    // =========================================================================
    // Device Operations
    // =========================================================================

    /// Refresh a device and return its `sys_info`.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::UnknownHost` if the host was never discovered, or
    /// the device error after the single retry.
    async fn sys_info(&self, host: &Host) -> Result<SysInfo>;

    /// Run one command against a device or one of its children.
    ///
    /// # Errors
    ///
    /// Returns `FleetError::InvalidCommand` / `FleetError::InvalidValue`
    /// without touching the device, or the device error after the single
    /// retry.
    async fn control(&self, request: &ControlRequest) -> Result<()>;

    // =========================================================================
    // Operational
    // =========================================================================

    /// Disconnect every session and forget every reconnect config.
    ///
    /// Host locks are kept, so a request still in flight keeps serializing
    /// with any that follow.
    async fn shutdown(&self);
}

/// The main fleet service implementation.
///
/// Sweeps run one at a time on their own task, so a caller that gives up
/// on `discover` never leaves a sweep half done.
pub struct FleetService<L: DeviceLibrary> {
    resolver: Arc<SessionResolver<L>>,
    config: FleetConfig,
    sweeps: Arc<tokio::sync::Mutex<()>>,
}

impl<L: DeviceLibrary> FleetService<L> {
    /// Create a new fleet service.
    #[must_use]
    pub fn new(library: Arc<L>, config: FleetConfig) -> Self {
        Self {
            resolver: Arc::new(SessionResolver::new(library)),
            config,
            sweeps: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(library: Arc<L>) -> Self {
        Self::new(library, FleetConfig::default())
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &FleetConfig {
        &self.config
    }

    /// Get the session resolver and the tables it owns.
    #[must_use]
    pub fn resolver(&self) -> &SessionResolver<L> {
        &self.resolver
    }
}

#[async_trait]
impl<L: DeviceLibrary> Fleet for FleetService<L> {
    async fn discover(
        &self,
        request: DiscoveryRequest,
        credentials: Option<Credentials>,
    ) -> Result<DiscoveryReport> {
        tracing::info!(
            additional_broadcasts = request.additional_broadcasts.len(),
            manual_devices = request.manual_devices.len(),
            authenticated = credentials.is_some(),
            "Starting discovery"
        );

        let resolver = Arc::clone(&self.resolver);
        let config = self.config.clone();
        let sweeps = Arc::clone(&self.sweeps);
        let task = tokio::spawn(async move {
            let _running = sweeps.lock().await;
            let sweep = Sweep::new(&resolver, &config, credentials.as_ref());
            let report = sweep.run(&request).await;
            report
        });

        task.await
            .map_err(|err| FleetError::Internal(format!("discovery task failed: {err}")))
    }

    async fn sys_info(&self, host: &Host) -> Result<SysInfo> {
        tracing::debug!(host = %host, "Getting sys_info");
        self.resolver
            .run(host, |device| async move {
                device.update().await?;
                classify::sys_info(&*device)
            })
            .await
    }

    async fn control(&self, request: &ControlRequest) -> Result<()> {
        let command = Command::parse(&request.feature, &request.action, &request.value)?;
        let child = request.child_num;

        tracing::info!(
            host = %request.host,
            feature = command.feature(),
            action = command.action(),
            child = ?child,
            "Controlling device"
        );
        self.resolver
            .run(&request.host, |device| {
                let command = &command;
                async move { command::dispatch(&*device, command, child).await }
            })
            .await
    }

    async fn shutdown(&self) {
        tracing::info!(
            sessions = self.resolver.connections().len(),
            "Disconnecting all devices"
        );
        self.resolver.close_all().await;
        self.resolver.configs().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FleetError;
    use crate::SysInfoBody;
    use hearth_device::{Call, DeviceSpec, SimulatedLibrary};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn host(s: &str) -> Host {
        Host::parse(s).unwrap()
    }

    async fn setup(specs: Vec<DeviceSpec>) -> (SimulatedLibrary, FleetService<SimulatedLibrary>) {
        let library = SimulatedLibrary::with_devices(specs);
        let service = FleetService::with_defaults(Arc::new(library.clone()));
        service
            .discover(DiscoveryRequest::default(), None)
            .await
            .unwrap();
        (library, service)
    }

    fn control(target: &Host, feature: &str, action: &str, value: Value) -> ControlRequest {
        ControlRequest {
            host: target.clone(),
            feature: feature.to_string(),
            action: action.to_string(),
            value,
            child_num: None,
        }
    }

    #[tokio::test]
    async fn discover_then_sys_info() {
        let lamp = host("10.0.0.1");
        let (library, service) = setup(vec![DeviceSpec::plug(lamp.clone(), "Lamp")]).await;

        let info = service.sys_info(&lamp).await.unwrap();
        assert_eq!(info.alias, "Lamp");
        assert!(matches!(info.body, SysInfoBody::Inline(ref s) if !s.state));

        assert!(service.resolver().connections().contains(&lamp));
        assert_eq!(library.session_stats(&lamp).live, 1);
    }

    #[tokio::test]
    async fn sys_info_unknown_host() {
        let (_, service) = setup(vec![]).await;
        let err = service.sys_info(&host("10.0.0.9")).await.unwrap_err();
        assert!(matches!(err, FleetError::UnknownHost(_)));
    }

    #[tokio::test]
    async fn control_changes_device_state() {
        let desk = host("10.0.0.2");
        let (library, service) = setup(vec![DeviceSpec::bulb(desk.clone(), "Desk")]).await;

        service
            .control(&control(&desk, "state", "turn_on", Value::Null))
            .await
            .unwrap();
        service
            .control(&control(&desk, "brightness", "set_brightness", json!(40)))
            .await
            .unwrap();

        let spec = library.device(&desk).unwrap();
        assert_eq!(spec.endpoint.state, Some(true));
        assert_eq!(spec.endpoint.light.unwrap().brightness, Some(40));
    }

    #[tokio::test]
    async fn invalid_command_never_connects() {
        let desk = host("10.0.0.2");
        let (library, service) = setup(vec![DeviceSpec::bulb(desk.clone(), "Desk")]).await;
        let opened = library.session_stats(&desk).opened;

        let err = service
            .control(&control(&desk, "state", "self_destruct", Value::Null))
            .await
            .unwrap_err();

        assert!(matches!(err, FleetError::InvalidCommand { .. }));
        assert_eq!(library.session_stats(&desk).opened, opened);
    }

    #[tokio::test]
    async fn control_retries_once_after_failure() {
        let lamp = host("10.0.0.1");
        let (library, service) = setup(vec![DeviceSpec::plug(lamp.clone(), "Lamp")]).await;
        service.sys_info(&lamp).await.unwrap();

        library.fail_next_calls(&lamp, 1);
        service
            .control(&control(&lamp, "state", "turn_on", Value::Null))
            .await
            .unwrap();

        assert_eq!(library.calls_for(&lamp).last().map(|r| r.call), Some(Call::TurnOn));
        assert_eq!(library.session_stats(&lamp).live, 1);
    }

    #[tokio::test]
    async fn control_gives_up_after_second_failure() {
        let lamp = host("10.0.0.1");
        let (library, service) = setup(vec![DeviceSpec::plug(lamp.clone(), "Lamp")]).await;
        service.sys_info(&lamp).await.unwrap();

        library.fail_next_calls(&lamp, 5);
        let err = service
            .control(&control(&lamp, "state", "turn_on", Value::Null))
            .await
            .unwrap_err();

        assert!(matches!(err, FleetError::Device(_)));
        assert_eq!(library.pending_failures(&lamp), 3);
        assert!(library.calls_for(&lamp).is_empty());
        assert_eq!(library.session_stats(&lamp).live, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_share_one_session() {
        let lamp = host("10.0.0.1");
        let (library, service) = setup(vec![DeviceSpec::plug(lamp.clone(), "Lamp")]).await;
        let service = Arc::new(service);
        let before = library.session_stats(&lamp).opened;

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let service = Arc::clone(&service);
                let lamp = lamp.clone();
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        service.sys_info(&lamp).await.map(|_| ())
                    } else {
                        service
                            .control(&control(&lamp, "state", "turn_on", Value::Null))
                            .await
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let stats = library.session_stats(&lamp);
        assert_eq!(stats.opened - before, 1);
        assert_eq!(stats.max_live, 1);
    }

    #[tokio::test]
    async fn child_control_targets_one_outlet() {
        let strip = host("10.0.0.3");
        let (library, service) = setup(vec![DeviceSpec::strip(strip.clone(), "Bench", 3)]).await;

        let mut request = control(&strip, "state", "turn_on", Value::Null);
        request.child_num = Some(1);
        service.control(&request).await.unwrap();

        let spec = library.device(&strip).unwrap();
        let states: Vec<_> = spec.children.iter().map(|c| c.state).collect();
        assert_eq!(states, vec![Some(false), Some(true), Some(false)]);

        request.child_num = Some(7);
        let err = service.control(&request).await.unwrap_err();
        assert!(matches!(err, FleetError::ChildOutOfRange { .. }));
        assert_eq!(library.session_stats(&strip).live, 1);
    }

    #[tokio::test]
    async fn shutdown_disconnects_and_forgets_configs() {
        let lamp = host("10.0.0.1");
        let (library, service) = setup(vec![DeviceSpec::plug(lamp.clone(), "Lamp")]).await;
        service.sys_info(&lamp).await.unwrap();

        service.shutdown().await;

        assert_eq!(library.live_sessions(), 0);
        assert!(service.resolver().connections().is_empty());
        assert!(service.resolver().configs().is_empty());
        assert!(service.resolver().locks().contains(&lamp));
        assert!(matches!(
            service.sys_info(&lamp).await,
            Err(FleetError::UnknownHost(_))
        ));
    }

    #[tokio::test]
    async fn abandoned_discovery_still_releases_sessions() {
        let lamp = host("10.0.0.1");
        let fan = host("10.0.0.2");
        let library = SimulatedLibrary::with_devices([
            DeviceSpec::plug(lamp.clone(), "Lamp"),
            DeviceSpec::plug(fan.clone(), "Fan"),
        ]);
        let service = FleetService::with_defaults(Arc::new(library.clone()));

        // The sweep stalls on the busy host until the caller has given up.
        let busy = service.resolver().locks().acquire(&fan).await;
        let abandoned = tokio::time::timeout(
            Duration::from_millis(100),
            service.discover(DiscoveryRequest::default(), None),
        )
        .await;
        assert!(abandoned.is_err());
        drop(busy);

        // Sweeps run one at a time, so this one starts after the first ends.
        let report = service
            .discover(DiscoveryRequest::default(), None)
            .await
            .unwrap();

        assert!(report.contains_key(&lamp));
        assert!(report.contains_key(&fan));
        assert!(service.resolver().connections().is_empty());
        assert_eq!(library.live_sessions(), 0);
        assert_eq!(library.session_stats(&lamp).live, 0);
        assert_eq!(library.session_stats(&fan).live, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn discovery_and_control_on_one_host_never_interleave() {
        let lamp = host("10.0.0.1");
        let (library, service) = setup(vec![DeviceSpec::plug(lamp.clone(), "Lamp")]).await;
        let service = Arc::new(service);

        let sweeps: Vec<_> = (0..4)
            .map(|_| {
                let service = Arc::clone(&service);
                tokio::spawn(async move { service.discover(DiscoveryRequest::default(), None).await })
            })
            .collect();
        let controls: Vec<_> = (0..16)
            .map(|i| {
                let service = Arc::clone(&service);
                let lamp = lamp.clone();
                let action = if i % 2 == 0 { "turn_on" } else { "turn_off" };
                tokio::spawn(async move {
                    service
                        .control(&control(&lamp, "state", action, Value::Null))
                        .await
                })
            })
            .collect();

        for task in sweeps {
            let report = task.await.unwrap().unwrap();
            assert!(report.contains_key(&lamp));
        }
        for task in controls {
            task.await.unwrap().unwrap();
        }
        assert_eq!(library.calls_for(&lamp).len(), 16);

        let report = service
            .discover(DiscoveryRequest::default(), None)
            .await
            .unwrap();
        assert!(report.contains_key(&lamp));
        assert!(service.resolver().connections().is_empty());
        assert_eq!(library.live_sessions(), 0);
    }
}
