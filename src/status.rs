//! Periodic heartbeat.
//!
//! [`StatusReporter`] decides *when* a heartbeat is due and builds a
//! read-only [`StatusSnapshot`].  It never touches links, the config or the
//! reading slot; the service emits the snapshot through the event sink.

use crate::config::{DeviceConfig, IdField, NodeSettings, TextField};
use crate::link::station::StationState;
use crate::link::telemetry::BrokerState;
use crate::sensors::{ReadingSlot, SensorReading};

/// Registration view without secrets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationSummary {
    pub complete: bool,
    pub node_id: IdField,
    pub broker_host: TextField,
    pub broker_port: u16,
    pub broker_username: TextField,
}

impl RegistrationSummary {
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            complete: config.registration_complete,
            node_id: config.node_id.clone(),
            broker_host: config.broker_host.clone(),
            broker_port: config.broker_port,
            broker_username: config.broker_username.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub uptime_ms: u64,
    pub station: StationState,
    pub rssi: Option<i8>,
    pub broker: BrokerState,
    pub reading: Option<SensorReading>,
    pub reading_age_ms: Option<u64>,
    pub free_heap: u32,
    pub registration: RegistrationSummary,
}

/// Everything a snapshot is built from, borrowed from the service.
pub struct StatusInputs<'a> {
    pub config: &'a DeviceConfig,
    pub station: StationState,
    pub rssi: Option<i8>,
    pub broker: BrokerState,
    pub readings: &'a ReadingSlot,
    pub free_heap: u32,
}

#[derive(Debug, Clone)]
pub struct StatusReporter {
    boot_ms: u64,
    interval_ms: u32,
    last_emit_ms: Option<u64>,
}

impl StatusReporter {
    pub fn new(settings: &NodeSettings, boot_ms: u64) -> Self {
        Self {
            boot_ms,
            interval_ms: settings.heartbeat_interval_ms,
            last_emit_ms: None,
        }
    }

    /// True when a heartbeat is due at `now_ms`; arms the next period.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        let due = self
            .last_emit_ms
            .is_none_or(|last| now_ms.saturating_sub(last) >= u64::from(self.interval_ms));
        if due {
            self.last_emit_ms = Some(now_ms);
        }
        due
    }

    pub fn snapshot(&self, now_ms: u64, inputs: &StatusInputs<'_>) -> StatusSnapshot {
        StatusSnapshot {
            uptime_ms: now_ms.saturating_sub(self.boot_ms),
            station: inputs.station,
            rssi: inputs.rssi,
            broker: inputs.broker,
            reading: inputs.readings.latest().copied(),
            reading_age_ms: inputs.readings.age_ms(now_ms),
            free_heap: inputs.free_heap,
            registration: RegistrationSummary::from_config(inputs.config),
        }
    }
}
