//! Outbound application events.
//!
//! The [`NodeService`](super::service::NodeService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, forward to a portal
//! status page, etc.

use crate::app::ports::{LinkError, StorageError};
use crate::app::registration::RegistrationOutcome;
use crate::link::station::StationState;
use crate::link::telemetry::BrokerState;
use crate::sensors::SensorReading;
use crate::sensors::pms5003::FrameError;
use crate::status::StatusSnapshot;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Boot finished.
    Booted {
        registered: bool,
        station_joined: bool,
    },

    /// A frame decoded and was stored in the reading slot.
    ReadingDecoded(SensorReading),

    /// A frame failed an integrity check and was dropped.
    FrameRejected(FrameError),

    StationChanged { from: StationState, to: StationState },

    BrokerChanged { from: BrokerState, to: BrokerState },

    /// A provisioning submission finished.
    Registration(RegistrationOutcome),

    /// The record could not be committed; the in-memory copy stays in use.
    PersistFailed(StorageError),

    Published { topic: String },

    PublishFailed(LinkError),

    /// Periodic status snapshot.
    Heartbeat(StatusSnapshot),

    /// The stored record was reset to defaults.
    ConfigCleared,
}
