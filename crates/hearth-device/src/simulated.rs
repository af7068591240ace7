//! In-memory device fleet.
//!
//! [`SimulatedLibrary`] implements [`DeviceLibrary`] over a set of
//! [`DeviceSpec`]s held in memory. Every session is tracked, so callers can
//! assert how many sessions were opened and how many are still live. Faults
//! (unreachable hosts, failing calls, stale sessions) can be injected per host.
//!
//! The gateway binary loads a fleet from a JSON fixture with
//! [`SimulatedLibrary::from_fixture`].

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use hearth_core::{ConnectionParameters, Credentials, DeviceConfig, DeviceType, Host};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::library::{Device, DeviceLibrary, Endpoint, Fan, Light};
use crate::types::{ColorTempRange, DeviceInfo, Hsv, LightFeature, ModuleKind};
use crate::{DeviceError, Result};

/// Broadcast address devices answer on unless told otherwise.
pub const DEFAULT_BROADCAST: &str = "255.255.255.255";

/// Light module state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightSpec {
    /// Brightness, present when the light dims.
    #[serde(default)]
    pub brightness: Option<u8>,
    /// Colour temperature, present when the light is tunable.
    #[serde(default)]
    pub color_temp: Option<u16>,
    /// Accepted colour temperature range.
    #[serde(default)]
    pub color_temp_range: ColorTempRange,
    /// Colour, present when the light supports colour.
    #[serde(default)]
    pub hsv: Option<Hsv>,
}

/// Fan module state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanSpec {
    /// Current speed level.
    pub speed_level: u8,
}

/// Switchable state shared by devices and their children.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    /// User-assigned name.
    #[serde(default)]
    pub alias: Option<String>,
    /// Child identifier; unused on the parent.
    #[serde(default)]
    pub id: String,
    /// Power state; `None` when the endpoint has no state feature.
    #[serde(default)]
    pub state: Option<bool>,
    /// Light module.
    #[serde(default)]
    pub light: Option<LightSpec>,
    /// Fan module.
    #[serde(default)]
    pub fan: Option<FanSpec>,
}

/// One simulated device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Device address.
    pub host: Host,
    /// Device kind.
    pub device_type: DeviceType,
    /// Hardware model.
    pub model: String,
    /// MAC address.
    pub mac: String,
    /// Library-level identifier.
    pub device_id: String,
    /// Raw hardware `deviceId`.
    #[serde(default)]
    pub hardware_id: Option<String>,
    /// Hardware version.
    #[serde(default = "DeviceSpec::default_version")]
    pub hw_ver: String,
    /// Firmware version.
    #[serde(default = "DeviceSpec::default_version")]
    pub sw_ver: String,
    /// Broadcast address the device answers on; `None` if it ignores broadcasts.
    #[serde(default = "DeviceSpec::default_broadcast")]
    pub broadcast: Option<String>,
    /// Optional bridge modules.
    #[serde(default)]
    pub modules: Vec<ModuleKind>,
    /// Credentials the device requires, if any.
    #[serde(default)]
    pub credentials: Option<Credentials>,
    /// Protocol hints handed out in reconnect configs.
    #[serde(default)]
    pub connection_type: ConnectionParameters,
    /// Reject every update as an unsupported device.
    #[serde(default)]
    pub unsupported: bool,
    /// The device's own switchable state.
    #[serde(flatten)]
    pub endpoint: EndpointSpec,
    /// Child outlets or bulbs.
    #[serde(default)]
    pub children: Vec<EndpointSpec>,
}

impl DeviceSpec {
    fn default_version() -> String {
        "1.0".to_string()
    }

    #[allow(clippy::unnecessary_wraps)]
    fn default_broadcast() -> Option<String> {
        Some(DEFAULT_BROADCAST.to_string())
    }

    fn base(host: Host, device_type: DeviceType, model: &str, alias: &str) -> Self {
        let seed = host
            .as_str()
            .bytes()
            .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
        let [_, a, b, c] = seed.to_be_bytes();
        Self {
            mac: format!("50:C7:BF:{a:02X}:{b:02X}:{c:02X}"),
            device_id: format!("8006{seed:08X}"),
            host,
            device_type,
            model: model.to_string(),
            hardware_id: None,
            hw_ver: Self::default_version(),
            sw_ver: Self::default_version(),
            broadcast: Self::default_broadcast(),
            modules: Vec::new(),
            credentials: None,
            connection_type: ConnectionParameters::default(),
            unsupported: false,
            endpoint: EndpointSpec {
                alias: Some(alias.to_string()),
                id: String::new(),
                state: Some(false),
                light: None,
                fan: None,
            },
            children: Vec::new(),
        }
    }

    /// A single-outlet plug, switched off.
    #[must_use]
    pub fn plug(host: Host, alias: &str) -> Self {
        Self::base(host, DeviceType::Plug, "HS103", alias)
    }

    /// A colour bulb with brightness, colour temperature and HSV.
    #[must_use]
    pub fn bulb(host: Host, alias: &str) -> Self {
        let mut spec = Self::base(host, DeviceType::Bulb, "KL130", alias);
        spec.connection_type.device_family = "IOT.SMARTBULB".to_string();
        spec.endpoint.light = Some(LightSpec {
            brightness: Some(50),
            color_temp: Some(2700),
            color_temp_range: ColorTempRange {
                min: 2500,
                max: 9000,
            },
            hsv: Some(Hsv::new(120, 80, 50)),
        });
        spec
    }

    /// A dimmer with brightness only.
    #[must_use]
    pub fn dimmer(host: Host, alias: &str) -> Self {
        let mut spec = Self::base(host, DeviceType::Dimmer, "HS220", alias);
        spec.endpoint.light = Some(LightSpec {
            brightness: Some(30),
            ..LightSpec::default()
        });
        spec
    }

    /// A power strip with `outlets` switched-off children.
    #[must_use]
    pub fn strip(host: Host, alias: &str, outlets: usize) -> Self {
        let mut spec = Self::base(host, DeviceType::Strip, "HS300", alias);
        spec.endpoint.state = Some(false);
        spec.children = (0..outlets)
            .map(|i| EndpointSpec {
                alias: Some(format!("{alias} outlet {}", i + 1)),
                id: format!("{}_{i:02}", spec.device_id),
                state: Some(false),
                light: None,
                fan: None,
            })
            .collect();
        spec
    }

    /// A device of the given type with only a power state.
    #[must_use]
    pub fn of_type(host: Host, device_type: DeviceType, alias: &str) -> Self {
        Self::base(host, device_type, "GENERIC", alias)
    }

    /// Add a fan module to the device itself.
    #[must_use]
    pub fn with_fan(mut self, speed_level: u8) -> Self {
        self.endpoint.fan = Some(FanSpec { speed_level });
        self
    }

    /// Add optional bridge modules.
    #[must_use]
    pub fn with_modules(mut self, modules: &[ModuleKind]) -> Self {
        self.modules.extend_from_slice(modules);
        self
    }

    /// Require credentials.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Answer on a specific broadcast address instead of the default one.
    #[must_use]
    pub fn on_broadcast(mut self, target: &str) -> Self {
        self.broadcast = Some(target.to_string());
        self
    }

    /// Ignore broadcasts entirely; only direct connections reach the device.
    #[must_use]
    pub fn without_broadcast(mut self) -> Self {
        self.broadcast = None;
        self
    }

    /// Fail every update as unsupported.
    #[must_use]
    pub fn unsupported(mut self) -> Self {
        self.unsupported = true;
        self
    }

    fn slot(&self, slot: Slot) -> Option<&EndpointSpec> {
        match slot {
            Slot::Parent => Some(&self.endpoint),
            Slot::Child(index) => self.children.get(index),
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> Option<&mut EndpointSpec> {
        match slot {
            Slot::Parent => Some(&mut self.endpoint),
            Slot::Child(index) => self.children.get_mut(index),
        }
    }
}

/// A state-changing call that reached a simulated device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    /// `turn_on`.
    TurnOn,
    /// `turn_off`.
    TurnOff,
    /// `set_brightness`.
    SetBrightness(u8),
    /// `set_color_temp`.
    SetColorTemp(u16),
    /// `set_hsv`.
    SetHsv(Hsv),
    /// `set_fan_speed_level`.
    SetFanSpeedLevel(u8),
}

/// A recorded call, with the host and child it targeted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// Target device.
    pub host: Host,
    /// Child index, or `None` for the device itself.
    pub child: Option<usize>,
    /// The call.
    pub call: Call,
}

/// Session counters for one host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Sessions ever opened.
    pub opened: u64,
    /// Sessions currently open.
    pub live: u64,
    /// Highest number of simultaneously open sessions.
    pub max_live: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    unreachable: bool,
    failing_calls: u32,
    stale_before: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Parent,
    Child(usize),
}

impl Slot {
    const fn child_index(self) -> Option<usize> {
        match self {
            Self::Parent => None,
            Self::Child(index) => Some(index),
        }
    }
}

#[derive(Default)]
struct FleetState {
    devices: RwLock<BTreeMap<Host, DeviceSpec>>,
    faults: Mutex<HashMap<Host, Faults>>,
    sessions: Mutex<HashMap<Host, SessionStats>>,
    calls: Mutex<Vec<CallRecord>>,
    next_session: AtomicU64,
}

impl FleetState {
    fn reachable_spec(&self, host: &Host) -> Result<DeviceSpec> {
        let unreachable = self
            .faults
            .lock()
            .get(host)
            .is_some_and(|faults| faults.unreachable);
        let spec = self.devices.read().get(host).cloned();
        match spec {
            Some(spec) if !unreachable => Ok(spec),
            _ => Err(DeviceError::Transport(format!("no response from {host}"))),
        }
    }

    fn open_session(&self, host: &Host) -> u64 {
        let id = self.next_session.fetch_add(1, Ordering::SeqCst) + 1;
        let mut sessions = self.sessions.lock();
        let stats = sessions.entry(host.clone()).or_default();
        stats.opened += 1;
        stats.live += 1;
        stats.max_live = stats.max_live.max(stats.live);
        id
    }

    fn close_session(&self, host: &Host) {
        if let Some(stats) = self.sessions.lock().get_mut(host) {
            stats.live = stats.live.saturating_sub(1);
        }
    }

    /// Gate every call made on an open session.
    fn check_call(&self, host: &Host, session: u64) -> Result<()> {
        let mut faults = self.faults.lock();
        let entry = faults.entry(host.clone()).or_default();
        if entry.unreachable || !self.devices.read().contains_key(host) {
            return Err(DeviceError::Transport(format!("no response from {host}")));
        }
        if session <= entry.stale_before {
            return Err(DeviceError::Transport("connection reset by peer".to_string()));
        }
        if entry.failing_calls > 0 {
            entry.failing_calls -= 1;
            return Err(DeviceError::Transport("connection reset by peer".to_string()));
        }
        Ok(())
    }
}

/// In-memory [`DeviceLibrary`].
#[derive(Clone, Default)]
pub struct SimulatedLibrary {
    fleet: Arc<FleetState>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Fixture {
    Wrapped { devices: Vec<DeviceSpec> },
    Bare(Vec<DeviceSpec>),
}

impl SimulatedLibrary {
    /// Create an empty fleet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fleet from device specs.
    #[must_use]
    pub fn with_devices(devices: impl IntoIterator<Item = DeviceSpec>) -> Self {
        let library = Self::new();
        for spec in devices {
            library.add_device(spec);
        }
        library
    }

    /// Load a fleet from a JSON file: either an array of device specs or an
    /// object with a `devices` array.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_fixture(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let devices = match serde_json::from_str::<Fixture>(&raw)? {
            Fixture::Wrapped { devices } | Fixture::Bare(devices) => devices,
        };
        tracing::info!(
            path = %path.as_ref().display(),
            devices = devices.len(),
            "Loaded simulated fleet"
        );
        Ok(Self::with_devices(devices))
    }

    /// Add or replace a device.
    pub fn add_device(&self, spec: DeviceSpec) {
        self.fleet.devices.write().insert(spec.host.clone(), spec);
    }

    /// Current authoritative state of a device.
    #[must_use]
    pub fn device(&self, host: &Host) -> Option<DeviceSpec> {
        self.fleet.devices.read().get(host).cloned()
    }

    /// Make a host stop (or resume) answering anything.
    pub fn set_unreachable(&self, host: &Host, unreachable: bool) {
        self.fleet
            .faults
            .lock()
            .entry(host.clone())
            .or_default()
            .unreachable = unreachable;
    }

    /// Fail the next `count` calls on any session to `host`.
    pub fn fail_next_calls(&self, host: &Host, count: u32) {
        self.fleet
            .faults
            .lock()
            .entry(host.clone())
            .or_default()
            .failing_calls = count;
    }

    /// Injected failures not yet consumed.
    #[must_use]
    pub fn pending_failures(&self, host: &Host) -> u32 {
        self.fleet
            .faults
            .lock()
            .get(host)
            .map_or(0, |faults| faults.failing_calls)
    }

    /// Make every session currently open to `host` stale.
    ///
    /// Sessions opened afterwards work normally.
    pub fn invalidate_sessions(&self, host: &Host) {
        let current = self.fleet.next_session.load(Ordering::SeqCst);
        self.fleet
            .faults
            .lock()
            .entry(host.clone())
            .or_default()
            .stale_before = current;
    }

    /// Session counters for a host.
    #[must_use]
    pub fn session_stats(&self, host: &Host) -> SessionStats {
        self.fleet
            .sessions
            .lock()
            .get(host)
            .copied()
            .unwrap_or_default()
    }

    /// Sessions currently open across the whole fleet.
    #[must_use]
    pub fn live_sessions(&self) -> u64 {
        self.fleet.sessions.lock().values().map(|s| s.live).sum()
    }

    /// Every state-changing call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<CallRecord> {
        self.fleet.calls.lock().clone()
    }

    /// State-changing calls made against one host.
    #[must_use]
    pub fn calls_for(&self, host: &Host) -> Vec<CallRecord> {
        self.fleet
            .calls
            .lock()
            .iter()
            .filter(|record| &record.host == host)
            .cloned()
            .collect()
    }

    fn open(&self, spec: DeviceSpec, config: DeviceConfig) -> SimulatedDevice {
        let id = self.fleet.open_session(&spec.host);
        tracing::trace!(host = %spec.host, session = id, "Opened simulated session");
        SimulatedDevice::new(id, spec, config, Arc::clone(&self.fleet))
    }

    fn config_for(spec: &DeviceSpec, credentials: Option<&Credentials>) -> DeviceConfig {
        let mut config =
            DeviceConfig::new(spec.host.clone()).with_credentials(credentials.cloned());
        config.connection_type = spec.connection_type.clone();
        config
    }
}

#[async_trait]
impl DeviceLibrary for SimulatedLibrary {
    type Device = SimulatedDevice;

    async fn connect(&self, config: &DeviceConfig) -> Result<SimulatedDevice> {
        let spec = self.fleet.reachable_spec(&config.host)?;
        let device = self.open(spec, config.clone());
        if let Err(err) = device.update().await {
            device.close();
            return Err(err);
        }
        Ok(device)
    }

    fn discover<'a>(
        &'a self,
        target: &'a str,
        credentials: Option<&'a Credentials>,
    ) -> BoxStream<'a, Result<SimulatedDevice>> {
        let responders: Vec<DeviceSpec> = self
            .fleet
            .devices
            .read()
            .values()
            .filter(|spec| spec.broadcast.as_deref() == Some(target))
            .cloned()
            .collect();

        stream::iter(responders)
            .filter_map(move |spec| async move {
                let spec = self.fleet.reachable_spec(&spec.host).ok()?;
                let config = Self::config_for(&spec, credentials);
                Some(Ok(self.open(spec, config)))
            })
            .boxed()
    }

    async fn discover_single(
        &self,
        host: &Host,
        credentials: Option<&Credentials>,
    ) -> Result<SimulatedDevice> {
        let spec = self.fleet.reachable_spec(host)?;
        let config = Self::config_for(&spec, credentials);
        Ok(self.open(spec, config))
    }
}

struct Session {
    id: u64,
    host: Host,
    config: DeviceConfig,
    fleet: Arc<FleetState>,
    closed: AtomicBool,
    snapshot: RwLock<DeviceSpec>,
}

impl Session {
    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DeviceError::SessionClosed);
        }
        self.fleet.check_call(&self.host, self.id)
    }

    fn read<R>(&self, slot: Slot, f: impl FnOnce(&EndpointSpec) -> R) -> Option<R> {
        self.snapshot.read().slot(slot).map(f)
    }

    /// Apply a state change to both the device and this session's view.
    fn apply(
        &self,
        slot: Slot,
        call: Call,
        mutate: impl Fn(&mut EndpointSpec) -> Result<()>,
    ) -> Result<()> {
        self.ensure_open()?;
        {
            let mut devices = self.fleet.devices.write();
            let endpoint = devices
                .get_mut(&self.host)
                .and_then(|spec| spec.slot_mut(slot))
                .ok_or_else(|| DeviceError::Transport(format!("no response from {}", self.host)))?;
            mutate(endpoint)?;
        }
        if let Some(endpoint) = self.snapshot.write().slot_mut(slot) {
            mutate(endpoint)?;
        }
        self.fleet.calls.lock().push(CallRecord {
            host: self.host.clone(),
            child: slot.child_index(),
            call,
        });
        Ok(())
    }
}

/// A session handle produced by [`SimulatedLibrary`].
pub struct SimulatedDevice {
    session: Arc<Session>,
    root: SimulatedEndpoint,
    children: Vec<SimulatedEndpoint>,
}

impl SimulatedDevice {
    fn new(id: u64, spec: DeviceSpec, config: DeviceConfig, fleet: Arc<FleetState>) -> Self {
        let child_count = spec.children.len();
        let session = Arc::new(Session {
            id,
            host: spec.host.clone(),
            config,
            fleet,
            closed: AtomicBool::new(false),
            snapshot: RwLock::new(spec),
        });
        let root = SimulatedEndpoint::new(&session, Slot::Parent);
        let children = (0..child_count)
            .map(|index| SimulatedEndpoint::new(&session, Slot::Child(index)))
            .collect();
        Self {
            session,
            root,
            children,
        }
    }

    fn close(&self) {
        if !self.session.closed.swap(true, Ordering::SeqCst) {
            self.session.fleet.close_session(&self.session.host);
            tracing::trace!(host = %self.session.host, session = self.session.id, "Closed simulated session");
        }
    }
}

#[async_trait]
impl Endpoint for SimulatedDevice {
    fn alias(&self) -> Option<String> {
        self.root.alias()
    }

    fn device_id(&self) -> String {
        self.session.snapshot.read().device_id.clone()
    }

    fn is_on(&self) -> Option<bool> {
        self.root.is_on()
    }

    fn light(&self) -> Option<&dyn Light> {
        self.root.light()
    }

    fn fan(&self) -> Option<&dyn Fan> {
        self.root.fan()
    }

    async fn turn_on(&self) -> Result<()> {
        self.root.turn_on().await
    }

    async fn turn_off(&self) -> Result<()> {
        self.root.turn_off().await
    }
}

#[async_trait]
impl Device for SimulatedDevice {
    fn host(&self) -> &Host {
        &self.session.host
    }

    fn info(&self) -> DeviceInfo {
        let spec = self.session.snapshot.read();
        DeviceInfo {
            alias: spec.endpoint.alias.clone(),
            device_type: spec.device_type,
            model: spec.model.clone(),
            mac: spec.mac.clone(),
            device_id: spec.device_id.clone(),
            hardware_id: spec.hardware_id.clone(),
            hw_ver: spec.hw_ver.clone(),
            sw_ver: spec.sw_ver.clone(),
        }
    }

    fn config(&self) -> DeviceConfig {
        self.session.config.clone()
    }

    fn children(&self) -> Vec<&dyn Endpoint> {
        self.children
            .iter()
            .map(|child| child as &dyn Endpoint)
            .collect()
    }

    fn has_module(&self, module: ModuleKind) -> bool {
        self.session.snapshot.read().modules.contains(&module)
    }

    async fn update(&self) -> Result<()> {
        self.session.ensure_open()?;
        let spec = self.session.fleet.reachable_spec(&self.session.host)?;
        if let Some(required) = &spec.credentials {
            if self.session.config.credentials.as_ref() != Some(required) {
                return Err(DeviceError::Authentication {
                    host: spec.host.clone(),
                    message: "credentials rejected".to_string(),
                });
            }
        }
        if spec.unsupported {
            return Err(DeviceError::Unsupported(spec.host));
        }
        *self.session.snapshot.write() = spec;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.close();
        Ok(())
    }
}

/// A device or child endpoint within a simulated session.
pub struct SimulatedEndpoint {
    session: Arc<Session>,
    slot: Slot,
    light: Option<SimulatedLight>,
    fan: Option<SimulatedFan>,
}

impl SimulatedEndpoint {
    fn new(session: &Arc<Session>, slot: Slot) -> Self {
        let (has_light, has_fan) = session
            .read(slot, |endpoint| (endpoint.light.is_some(), endpoint.fan.is_some()))
            .unwrap_or_default();
        Self {
            session: Arc::clone(session),
            slot,
            light: has_light.then(|| SimulatedLight {
                session: Arc::clone(session),
                slot,
            }),
            fan: has_fan.then(|| SimulatedFan {
                session: Arc::clone(session),
                slot,
            }),
        }
    }

    fn set_state(&self, on: bool) -> Result<()> {
        let call = if on { Call::TurnOn } else { Call::TurnOff };
        self.session.apply(self.slot, call, |endpoint| {
            if endpoint.state.is_none() {
                return Err(DeviceError::NotSupported("state"));
            }
            endpoint.state = Some(on);
            Ok(())
        })
    }
}

#[async_trait]
impl Endpoint for SimulatedEndpoint {
    fn alias(&self) -> Option<String> {
        self.session
            .read(self.slot, |endpoint| endpoint.alias.clone())
            .flatten()
    }

    fn device_id(&self) -> String {
        self.session
            .read(self.slot, |endpoint| endpoint.id.clone())
            .unwrap_or_default()
    }

    fn is_on(&self) -> Option<bool> {
        self.session.read(self.slot, |endpoint| endpoint.state).flatten()
    }

    fn light(&self) -> Option<&dyn Light> {
        self.light.as_ref().map(|light| light as &dyn Light)
    }

    fn fan(&self) -> Option<&dyn Fan> {
        self.fan.as_ref().map(|fan| fan as &dyn Fan)
    }

    async fn turn_on(&self) -> Result<()> {
        self.set_state(true)
    }

    async fn turn_off(&self) -> Result<()> {
        self.set_state(false)
    }
}

/// Light module of a simulated endpoint.
pub struct SimulatedLight {
    session: Arc<Session>,
    slot: Slot,
}

impl SimulatedLight {
    fn spec(&self) -> Option<LightSpec> {
        self.session
            .read(self.slot, |endpoint| endpoint.light.clone())
            .flatten()
    }

    fn modify(&self, call: Call, f: impl Fn(&mut LightSpec) -> Result<()>) -> Result<()> {
        self.session.apply(self.slot, call, |endpoint| {
            let light = endpoint
                .light
                .as_mut()
                .ok_or(DeviceError::NotSupported("light"))?;
            f(light)
        })
    }
}

#[async_trait]
impl Light for SimulatedLight {
    fn has_feature(&self, feature: LightFeature) -> bool {
        self.spec().is_some_and(|light| match feature {
            LightFeature::Brightness => light.brightness.is_some(),
            LightFeature::ColorTemp => light.color_temp.is_some(),
            LightFeature::Hsv => light.hsv.is_some(),
        })
    }

    fn brightness(&self) -> Option<u8> {
        self.spec().and_then(|light| light.brightness)
    }

    fn color_temp(&self) -> Option<u16> {
        self.spec().and_then(|light| light.color_temp)
    }

    fn valid_temperature_range(&self) -> ColorTempRange {
        self.spec()
            .map(|light| light.color_temp_range)
            .unwrap_or_default()
    }

    fn hsv(&self) -> Option<Hsv> {
        self.spec().and_then(|light| light.hsv)
    }

    async fn set_brightness(&self, brightness: u8) -> Result<()> {
        self.modify(Call::SetBrightness(brightness), |light| {
            if light.brightness.is_none() {
                return Err(DeviceError::NotSupported("brightness"));
            }
            if brightness > 100 {
                return Err(DeviceError::InvalidValue(format!(
                    "brightness {brightness} out of range 0-100"
                )));
            }
            light.brightness = Some(brightness);
            Ok(())
        })
    }

    async fn set_color_temp(&self, kelvin: u16) -> Result<()> {
        self.modify(Call::SetColorTemp(kelvin), |light| {
            if light.color_temp.is_none() {
                return Err(DeviceError::NotSupported("color_temp"));
            }
            if !light.color_temp_range.contains(kelvin) {
                return Err(DeviceError::InvalidValue(format!(
                    "color temperature {kelvin} out of range {}-{}",
                    light.color_temp_range.min, light.color_temp_range.max
                )));
            }
            light.color_temp = Some(kelvin);
            Ok(())
        })
    }

    async fn set_hsv(&self, hsv: Hsv) -> Result<()> {
        self.modify(Call::SetHsv(hsv), |light| {
            if light.hsv.is_none() {
                return Err(DeviceError::NotSupported("hsv"));
            }
            if hsv.hue > 360 || hsv.saturation > 100 || hsv.value > 100 {
                return Err(DeviceError::InvalidValue(format!("hsv {hsv:?} out of range")));
            }
            light.hsv = Some(hsv);
            Ok(())
        })
    }
}

/// Fan module of a simulated endpoint.
pub struct SimulatedFan {
    session: Arc<Session>,
    slot: Slot,
}

#[async_trait]
impl Fan for SimulatedFan {
    fn fan_speed_level(&self) -> u8 {
        self.session
            .read(self.slot, |endpoint| endpoint.fan.map(|fan| fan.speed_level))
            .flatten()
            .unwrap_or_default()
    }

    async fn set_fan_speed_level(&self, level: u8) -> Result<()> {
        self.session
            .apply(self.slot, Call::SetFanSpeedLevel(level), |endpoint| {
                let fan = endpoint
                    .fan
                    .as_mut()
                    .ok_or(DeviceError::NotSupported("fan"))?;
                if level > 100 {
                    return Err(DeviceError::InvalidValue(format!(
                        "fan speed {level} out of range 0-100"
                    )));
                }
                fan.speed_level = level;
                Ok(())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn host(s: &str) -> Host {
        Host::parse(s).unwrap()
    }

    #[tokio::test]
    async fn connect_and_disconnect_track_sessions() {
        let plug = host("10.0.0.10");
        let library = SimulatedLibrary::with_devices([DeviceSpec::plug(plug.clone(), "Lamp")]);

        let device = library.connect(&DeviceConfig::new(plug.clone())).await.unwrap();
        assert_eq!(device.alias().as_deref(), Some("Lamp"));
        assert_eq!(library.session_stats(&plug).live, 1);

        device.disconnect().await.unwrap();
        device.disconnect().await.unwrap();
        assert_eq!(library.session_stats(&plug).live, 0);
        assert_eq!(library.session_stats(&plug).opened, 1);
        assert!(matches!(device.update().await, Err(DeviceError::SessionClosed)));
    }

    #[tokio::test]
    async fn connect_unknown_host_fails() {
        let library = SimulatedLibrary::new();
        let result = library.connect(&DeviceConfig::new(host("10.9.9.9"))).await;
        assert!(matches!(result, Err(DeviceError::Transport(_))));
        assert_eq!(library.live_sessions(), 0);
    }

    #[tokio::test]
    async fn discover_filters_by_broadcast_target() {
        let library = SimulatedLibrary::with_devices([
            DeviceSpec::plug(host("10.0.0.1"), "Default"),
            DeviceSpec::plug(host("10.1.0.1"), "Other").on_broadcast("10.1.255.255"),
            DeviceSpec::plug(host("10.0.0.2"), "Silent").without_broadcast(),
        ]);

        let found: Vec<SimulatedDevice> = library
            .discover(DEFAULT_BROADCAST, None)
            .try_collect()
            .await
            .unwrap();
        let hosts: Vec<&str> = found.iter().map(|d| d.host().as_str()).collect();
        assert_eq!(hosts, vec!["10.0.0.1"]);

        let other: Vec<SimulatedDevice> = library
            .discover("10.1.255.255", None)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(other.len(), 1);

        let silent = library.discover_single(&host("10.0.0.2"), None).await.unwrap();
        assert_eq!(silent.host().as_str(), "10.0.0.2");
    }

    #[tokio::test]
    async fn update_requires_matching_credentials() {
        let bulb = host("10.0.0.20");
        let creds = Credentials::new("me@example.com", "pw");
        let library = SimulatedLibrary::with_devices([
            DeviceSpec::bulb(bulb.clone(), "Desk").with_credentials(creds.clone())
        ]);

        let anonymous = library.discover_single(&bulb, None).await.unwrap();
        assert!(anonymous.update().await.unwrap_err().is_authentication());

        let authed = library.discover_single(&bulb, Some(&creds)).await.unwrap();
        authed.update().await.unwrap();
        assert_eq!(authed.config().credentials, Some(creds));
    }

    #[tokio::test]
    async fn stale_sessions_fail_until_reconnected() {
        let plug = host("10.0.0.30");
        let library = SimulatedLibrary::with_devices([DeviceSpec::plug(plug.clone(), "Fan")]);
        let old = library.connect(&DeviceConfig::new(plug.clone())).await.unwrap();

        library.invalidate_sessions(&plug);
        assert!(old.turn_on().await.unwrap_err().is_transport());

        let fresh = library.connect(&DeviceConfig::new(plug.clone())).await.unwrap();
        fresh.turn_on().await.unwrap();
        assert_eq!(library.device(&plug).unwrap().endpoint.state, Some(true));
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_in_order() {
        let plug = host("10.0.0.31");
        let library = SimulatedLibrary::with_devices([DeviceSpec::plug(plug.clone(), "Heater")]);
        let device = library.connect(&DeviceConfig::new(plug.clone())).await.unwrap();

        library.fail_next_calls(&plug, 2);
        assert!(device.update().await.is_err());
        assert!(device.turn_on().await.is_err());
        assert_eq!(library.pending_failures(&plug), 0);
        device.turn_on().await.unwrap();
        assert_eq!(library.calls_for(&plug).len(), 1);
    }

    #[tokio::test]
    async fn child_calls_touch_only_that_child() {
        let strip = host("10.0.0.40");
        let library = SimulatedLibrary::with_devices([DeviceSpec::strip(strip.clone(), "Bench", 3)]);
        let device = library.connect(&DeviceConfig::new(strip.clone())).await.unwrap();

        device.children()[1].turn_on().await.unwrap();

        let spec = library.device(&strip).unwrap();
        let states: Vec<Option<bool>> = spec.children.iter().map(|c| c.state).collect();
        assert_eq!(states, vec![Some(false), Some(true), Some(false)]);
        assert_eq!(spec.endpoint.state, Some(false));
        assert_eq!(library.calls()[0].child, Some(1));
    }

    #[tokio::test]
    async fn light_setters_validate_ranges() {
        let bulb = host("10.0.0.50");
        let library = SimulatedLibrary::with_devices([DeviceSpec::bulb(bulb.clone(), "Hall")]);
        let device = library.connect(&DeviceConfig::new(bulb)).await.unwrap();
        let light = device.light().unwrap();

        assert!(light.has_feature(LightFeature::Hsv));
        light.set_brightness(80).await.unwrap();
        assert_eq!(light.brightness(), Some(80));
        assert!(matches!(
            light.set_brightness(120).await,
            Err(DeviceError::InvalidValue(_))
        ));
        assert!(matches!(
            light.set_color_temp(1000).await,
            Err(DeviceError::InvalidValue(_))
        ));
        light.set_hsv(Hsv::new(10, 20, 30)).await.unwrap();
        assert_eq!(light.hsv(), Some(Hsv::new(10, 20, 30)));
    }

    #[test]
    fn fixture_accepts_wrapped_and_bare_lists() {
        let dir = tempfile::tempdir().unwrap();
        let wrapped = dir.path().join("wrapped.json");
        std::fs::write(
            &wrapped,
            r#"{"devices":[{"host":"10.0.0.7","device_type":"plug","model":"HS103",
                "mac":"AA:BB:CC:DD:EE:FF","device_id":"800600","alias":"Porch","state":true}]}"#,
        )
        .unwrap();
        let library = SimulatedLibrary::from_fixture(&wrapped).unwrap();
        let spec = library.device(&host("10.0.0.7")).unwrap();
        assert_eq!(spec.endpoint.alias.as_deref(), Some("Porch"));
        assert_eq!(spec.broadcast.as_deref(), Some(DEFAULT_BROADCAST));

        let bare = dir.path().join("bare.json");
        std::fs::write(
            &bare,
            r#"[{"host":"10.0.0.8","device_type":"bulb","model":"KL125",
                "mac":"AA:BB:CC:DD:EE:00","device_id":"800601","broadcast":null,
                "light":{"brightness":10}}]"#,
        )
        .unwrap();
        let library = SimulatedLibrary::from_fixture(&bare).unwrap();
        let spec = library.device(&host("10.0.0.8")).unwrap();
        assert!(spec.broadcast.is_none());
        assert_eq!(spec.endpoint.light.unwrap().brightness, Some(10));
    }
}
