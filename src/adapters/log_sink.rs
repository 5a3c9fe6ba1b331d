//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! A portal status page would implement the same trait.

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::app::registration::RegistrationOutcome;
use crate::status::StatusSnapshot;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Booted {
                registered,
                station_joined,
            } => {
                info!(
                    "BOOT | registered={} station_joined={}",
                    registered, station_joined
                );
            }
            AppEvent::ReadingDecoded(r) => {
                debug!(
                    "PMS | CF1 pm1={} pm25={} pm10={} | ATM pm1={} pm25={} pm10={}",
                    r.pm1_cf1, r.pm25_cf1, r.pm10_cf1, r.pm1_atm, r.pm25_atm, r.pm10_atm
                );
            }
            AppEvent::FrameRejected(e) => {
                warn!("PMS | frame dropped: {}", e);
            }
            AppEvent::StationChanged { from, to } => {
                info!("WIFI | {} -> {}", from.label(), to.label());
            }
            AppEvent::BrokerChanged { from, to } => {
                info!("BROKER | {} -> {}", from.label(), to.label());
            }
            AppEvent::Registration(outcome) => match outcome {
                RegistrationOutcome::Registered => info!("REG | registered"),
                RegistrationOutcome::Skipped => info!("REG | skipped (no key)"),
                RegistrationOutcome::Failed(e) => warn!("REG | failed: {}", e),
            },
            AppEvent::PersistFailed(e) => {
                warn!("CONFIG | commit failed: {}", e);
            }
            AppEvent::Published { topic } => {
                info!("PUB | {}", topic);
            }
            AppEvent::PublishFailed(e) => {
                warn!("PUB | failed: {}", e);
            }
            AppEvent::Heartbeat(s) => {
                info!(
                    "HB | up={}s | wifi={} rssi={:?} | broker={} | heap={} | {} | registered={}",
                    s.uptime_ms / 1_000,
                    s.station.label(),
                    s.rssi,
                    s.broker.label(),
                    s.free_heap,
                    pms_summary(s),
                    s.registration.complete,
                );
            }
            AppEvent::ConfigCleared => {
                info!("CONFIG | cleared to defaults");
            }
        }
    }
}

/// Sensor part of the heartbeat line.
fn pms_summary(s: &StatusSnapshot) -> String {
    match (s.reading, s.reading_age_ms) {
        (Some(r), Some(age)) => format!(
            "PMS pm1={} pm25={} pm10={} age={}ms",
            r.pm1_atm, r.pm25_atm, r.pm10_atm, age
        ),
        _ => "PMS waiting...".to_owned(),
    }
}
