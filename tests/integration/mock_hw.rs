//! Mock adapters for integration tests.
//!
//! Every port has a mock here that records what the service asked of it,
//! so tests can assert on call counts and payloads without real flash,
//! radio or UART.

use std::cell::Cell;
use std::collections::{HashMap, VecDeque};

use airnode::app::events::AppEvent;
use airnode::app::ports::{
    BackendPort, BrokerCredentials, ByteSource, Clock, EventSink, LinkError, LinkStatus,
    RegistrationError, RegistrationGrant, RegistrationRequest, StationPort, StorageError,
    StoragePort, SystemPort,
};
use airnode::app::service::NodeService;
use airnode::config::{NodeSettings, ProvisioningForm};
use airnode::sensors::pms5003::encode_frame;
use embedded_hal::delay::DelayNs;

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    pub writes: u32,
    pub fail_writes: bool,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw value, bypassing the write counter.
    pub fn seed(&mut self, namespace: &str, key: &str, data: &[u8]) {
        self.store.insert(format!("{}::{}", namespace, key), data.to_vec());
    }

    pub fn raw(&self, namespace: &str, key: &str) -> Option<&[u8]> {
        self.store
            .get(&format!("{}::{}", namespace, key))
            .map(Vec::as_slice)
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.get(&format!("{}::{}", namespace, key)) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.writes += 1;
        if self.fail_writes {
            return Err(StorageError::IoError);
        }
        self.store
            .insert(format!("{}::{}", namespace, key), data.to_vec());
        Ok(())
    }
}

// ── MockStation ───────────────────────────────────────────────

pub struct MockStation {
    status: LinkStatus,
    /// Status reported after each `begin_join`.
    pub join_result: LinkStatus,
    pub joins: u32,
    pub disconnects: u32,
}

#[allow(dead_code)]
impl MockStation {
    pub fn new(join_result: LinkStatus) -> Self {
        Self {
            status: LinkStatus::Down,
            join_result,
            joins: 0,
            disconnects: 0,
        }
    }

    pub fn reachable() -> Self {
        Self::new(LinkStatus::Up)
    }

    pub fn unreachable() -> Self {
        Self::new(LinkStatus::Failed)
    }

    /// Simulate the AP disappearing under an established link.
    pub fn drop_link(&mut self) {
        self.status = LinkStatus::Down;
    }
}

impl StationPort for MockStation {
    fn begin_join(&mut self, _ssid: &str, _passphrase: &str) -> Result<(), LinkError> {
        self.joins += 1;
        self.status = self.join_result;
        Ok(())
    }

    fn status(&self) -> LinkStatus {
        self.status
    }

    fn disconnect(&mut self) {
        self.disconnects += 1;
        self.status = LinkStatus::Down;
    }

    fn rssi(&self) -> Option<i8> {
        (self.status == LinkStatus::Up).then_some(-58)
    }
}

// ── MockBackend ───────────────────────────────────────────────

pub struct MockBackend {
    pub requires_station: bool,
    pub registration: Result<RegistrationGrant, RegistrationError>,
    pub registrations: u32,
    pub refuse_broker: bool,
    pub broker_connects: u32,
    pub connected: bool,
    pub published: Vec<(String, String)>,
}

pub fn demo_grant() -> RegistrationGrant {
    RegistrationGrant {
        node_id: "00000000-0000-0000-0000-000000000001".into(),
        broker_host: "mqtt.example.local".into(),
        broker_port: 1883,
        broker_username: "demo-user".into(),
        broker_password: "demo-pass".into(),
        first_sensor_id: "00000000-0000-0000-0000-00000000SENS".into(),
        first_sensor_serial: "PMS5003-EDU".into(),
    }
}

#[allow(dead_code)]
impl MockBackend {
    pub fn offline() -> Self {
        Self {
            requires_station: false,
            registration: Ok(demo_grant()),
            registrations: 0,
            refuse_broker: false,
            broker_connects: 0,
            connected: false,
            published: Vec::new(),
        }
    }

    pub fn networked() -> Self {
        Self {
            requires_station: true,
            ..Self::offline()
        }
    }
}

impl BackendPort for MockBackend {
    fn requires_station(&self) -> bool {
        self.requires_station
    }

    fn perform_registration(
        &mut self,
        _request: &RegistrationRequest<'_>,
    ) -> Result<RegistrationGrant, RegistrationError> {
        self.registrations += 1;
        self.registration.clone()
    }

    fn connect_broker(&mut self, _credentials: &BrokerCredentials<'_>) -> Result<(), LinkError> {
        self.broker_connects += 1;
        if self.refuse_broker {
            return Err(LinkError::BrokerRefused);
        }
        self.connected = true;
        Ok(())
    }

    fn broker_connected(&self) -> bool {
        self.connected
    }

    fn disconnect_broker(&mut self) {
        self.connected = false;
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), LinkError> {
        if !self.connected {
            return Err(LinkError::NotConnected);
        }
        self.published
            .push((topic.to_owned(), String::from_utf8_lossy(payload).into_owned()));
        Ok(())
    }
}

// ── ScriptedSerial ────────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedSerial {
    bytes: VecDeque<u8>,
}

#[allow(dead_code)]
impl ScriptedSerial {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend(bytes.iter().copied());
    }

    pub fn push_frame(&mut self, words: &[u16]) {
        self.push_bytes(&frame(words));
    }
}

impl ByteSource for ScriptedSerial {
    fn read_byte(&mut self) -> Option<u8> {
        self.bytes.pop_front()
    }
}

/// A complete frame carrying `words`.
pub fn frame(words: &[u16]) -> Vec<u8> {
    let mut buf = [0u8; 68];
    let n = encode_frame(words, &mut buf).expect("frame length in range");
    buf[..n].to_vec()
}

/// The reference frame: CF1 10/20/30, ATM 11/21/31.
pub fn reference_words() -> [u16; 13] {
    [10, 20, 30, 11, 21, 31, 0, 0, 0, 0, 0, 0, 0]
}

// ── SimClock ──────────────────────────────────────────────────

/// Clock that only moves when something sleeps or a test advances it.
#[derive(Default)]
pub struct SimClock {
    now_ms: Cell<u64>,
}

#[allow(dead_code)]
impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }
}

impl DelayNs for SimClock {
    fn delay_ns(&mut self, ns: u32) {
        self.advance(u64::from(ns.div_ceil(1_000_000)));
    }
}

impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }
}

// ── MockSystem ────────────────────────────────────────────────

#[derive(Default)]
pub struct MockSystem {
    pub restarts: u32,
}

impl SystemPort for MockSystem {
    fn free_heap(&self) -> u32 {
        200_000
    }

    fn restart(&mut self) {
        self.restarts += 1;
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Fixtures ──────────────────────────────────────────────────

pub type TestNode = NodeService<MockNvs, MockStation, MockBackend>;

/// Everything a test needs around a booted node.
pub struct Rig {
    pub node: TestNode,
    pub serial: ScriptedSerial,
    pub clock: SimClock,
    pub system: MockSystem,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Rig {
    pub fn boot(nvs: MockNvs, station: MockStation, backend: MockBackend) -> Self {
        let mut clock = SimClock::new();
        let mut sink = RecordingSink::new();
        let node = NodeService::boot(
            nvs,
            station,
            backend,
            NodeSettings::default(),
            &mut clock,
            &mut sink,
        )
        .expect("boot");
        Self {
            node,
            serial: ScriptedSerial::new(),
            clock,
            system: MockSystem::default(),
            sink,
        }
    }

    pub fn fresh() -> Self {
        Self::boot(MockNvs::new(), MockStation::reachable(), MockBackend::offline())
    }

    pub fn poll(&mut self) {
        self.node
            .poll(&mut self.serial, &mut self.clock, &self.system, &mut self.sink);
    }

    pub fn command(
        &mut self,
        cmd: airnode::app::commands::PortalCommand,
    ) -> airnode::app::commands::CommandOutcome {
        self.node
            .handle_command(cmd, &mut self.clock, &mut self.system, &mut self.sink)
    }

    pub fn submit(&mut self, form: ProvisioningForm) -> airnode::app::commands::CommandOutcome {
        self.command(airnode::app::commands::PortalCommand::SubmitProvisioning(form))
    }
}

/// A full submission with the given one-time key.
pub fn form_with_key(key: &str) -> ProvisioningForm {
    ProvisioningForm {
        wifi_ssid: Some("HomeWiFi".into()),
        wifi_pass: Some("password1".into()),
        user_email: Some("me@example.com".into()),
        device_name: Some("Node-Kitchen".into()),
        one_time_key: Some(key.into()),
    }
}

/// Storage pre-loaded with `config` as a valid record.  The write counter
/// starts at zero.
pub fn nvs_with(config: &airnode::config::DeviceConfig) -> MockNvs {
    let mut store = airnode::config_store::ConfigStore::new(MockNvs::new());
    store.save(config).expect("seed record");
    let mut nvs = store.into_storage();
    nvs.writes = 0;
    nvs
}

/// A record with station credentials only.
pub fn station_config() -> airnode::config::DeviceConfig {
    let mut config = airnode::config::DeviceConfig::default();
    config.apply_submission(&form_with_key(""));
    config
}
