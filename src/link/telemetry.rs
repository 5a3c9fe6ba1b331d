//! Telemetry broker session and publish cadence.
//!
//! The link is only ever attempted for a fully registered record.  A record
//! that loses its registration (new submission, clear) drops the session on
//! the next poll.  Reconnects use the same capped linear backoff as the
//! station link.
//!
//! Published topic and payload:
//! ```text
//!   measurements/{node_id}/{first_sensor_id}
//!   {"measurement":{"pm1":11.0,"pm25":21.0,"pm10":31.0}}
//! ```
//! Values are the atmospheric-basis concentrations.

use log::{debug, info, warn};
use serde::Serialize;

use crate::app::ports::{BackendPort, BrokerCredentials, LinkError};
use crate::config::{DeviceConfig, NodeSettings};
use crate::sensors::SensorReading;

use super::backoff::Backoff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    Disconnected,
    Connected,
}

impl BrokerState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    SkippedLinkDown,
    SkippedNoReading,
    SkippedCadence,
    Published { topic: String },
    Failed(LinkError),
}

// ───────────────────────────────────────────────────────────────
// Payload
// ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Measurement {
    pm1: f32,
    pm25: f32,
    pm10: f32,
}

#[derive(Serialize)]
struct Envelope {
    measurement: Measurement,
}

pub fn topic_for(config: &DeviceConfig) -> String {
    format!(
        "measurements/{}/{}",
        config.node_id, config.first_sensor_id
    )
}

pub fn payload_for(reading: &SensorReading) -> Result<Vec<u8>, LinkError> {
    let envelope = Envelope {
        measurement: Measurement {
            pm1: f32::from(reading.pm1_atm),
            pm25: f32::from(reading.pm25_atm),
            pm10: f32::from(reading.pm10_atm),
        },
    };
    serde_json::to_vec(&envelope).map_err(|_| LinkError::PublishFailed)
}

// ───────────────────────────────────────────────────────────────
// TelemetryLink
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TelemetryLink {
    state: BrokerState,
    backoff: Backoff,
    publish_interval_ms: u32,
    last_publish_ms: Option<u64>,
}

impl TelemetryLink {
    pub fn new(settings: &NodeSettings) -> Self {
        Self {
            state: BrokerState::Disconnected,
            backoff: Backoff::new(settings.backoff_step_ms, settings.backoff_ceiling_ms),
            publish_interval_ms: settings.publish_interval_ms,
            last_publish_ms: None,
        }
    }

    pub fn state(&self) -> BrokerState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == BrokerState::Connected
    }

    pub fn backoff_ms(&self) -> u32 {
        self.backoff.interval_ms()
    }

    /// Tear the session down and forget the backoff.
    pub fn drop_link(&mut self, backend: &mut impl BackendPort) {
        if self.state == BrokerState::Connected {
            backend.disconnect_broker();
        }
        self.state = BrokerState::Disconnected;
        self.backoff.reset();
    }

    /// Connect or reconnect as needed.  Returns the new state if it changed.
    pub fn poll(
        &mut self,
        now_ms: u64,
        config: &DeviceConfig,
        station_up: bool,
        backend: &mut impl BackendPort,
    ) -> Option<BrokerState> {
        let before = self.state;

        let allowed =
            config.has_broker_credentials() && (station_up || !backend.requires_station());

        if !allowed {
            if self.state == BrokerState::Connected {
                info!("Broker: dropping session (link prerequisites lost)");
                backend.disconnect_broker();
                self.state = BrokerState::Disconnected;
            }
        } else {
            match self.state {
                BrokerState::Connected => {
                    if !backend.broker_connected() {
                        warn!("Broker: session lost");
                        self.state = BrokerState::Disconnected;
                    }
                }
                BrokerState::Disconnected => {
                    if self.backoff.ready(now_ms) {
                        self.connect(now_ms, config, backend);
                    }
                }
            }
        }

        (self.state != before).then_some(self.state)
    }

    /// Publish `reading` if the session is up and the cadence has elapsed.
    pub fn maybe_publish(
        &mut self,
        now_ms: u64,
        config: &DeviceConfig,
        reading: Option<&SensorReading>,
        backend: &mut impl BackendPort,
    ) -> PublishOutcome {
        if self.state != BrokerState::Connected || !config.has_broker_credentials() {
            return PublishOutcome::SkippedLinkDown;
        }
        let Some(reading) = reading.filter(|r| r.valid) else {
            return PublishOutcome::SkippedNoReading;
        };
        if let Some(last) = self.last_publish_ms {
            if now_ms.saturating_sub(last) < u64::from(self.publish_interval_ms) {
                return PublishOutcome::SkippedCadence;
            }
        }

        // The cadence counts from the attempt, successful or not.
        self.last_publish_ms = Some(now_ms);

        let topic = topic_for(config);
        let result =
            payload_for(reading).and_then(|payload| backend.publish(&topic, &payload));
        match result {
            Ok(()) => {
                debug!("Broker: published to '{}'", topic);
                PublishOutcome::Published { topic }
            }
            Err(e) => {
                warn!("Broker: publish to '{}' failed: {}", topic, e);
                PublishOutcome::Failed(e)
            }
        }
    }

    fn connect(&mut self, now_ms: u64, config: &DeviceConfig, backend: &mut impl BackendPort) {
        self.backoff.record_attempt(now_ms);
        let credentials = BrokerCredentials {
            host: &config.broker_host,
            port: config.broker_port,
            client_id: &config.node_id,
            username: &config.broker_username,
            password: &config.broker_password,
        };
        info!(
            "Broker: connecting to {}:{} as '{}'",
            credentials.host, credentials.port, credentials.client_id
        );
        match backend.connect_broker(&credentials) {
            Ok(()) => {
                self.backoff.reset();
                self.state = BrokerState::Connected;
                info!("Broker: connected");
            }
            Err(e) => {
                self.backoff.record_failure();
                warn!(
                    "Broker: connect failed: {} (next attempt in {} ms)",
                    e,
                    self.backoff.interval_ms()
                );
            }
        }
    }
}
