//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ NodeService (domain)
//! ```
//!
//! Driven adapters (flash, radio, backend, UART, clock) implement these
//! traits.  The [`NodeService`](super::service::NodeService) consumes them via
//! generics, so the domain core never touches hardware directly and every
//! state machine can be driven from host tests.
//!
//! ## Timing contract
//!
//! No port call may block indefinitely.  The only suspensions allowed in the
//! core are bounded reads on [`ByteSource`] (through [`Clock`] delays) and the
//! bounded station join wait.

use core::fmt;

use embedded_hal::delay::DelayNs;

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent blob storage.
///
/// Write operations MUST be atomic: a record is committed in full or not
/// at all.  The ESP-IDF NVS API guarantees this per `nvs_commit()`; the
/// in-memory simulation achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Station port (driven adapter: domain → WiFi STA)
// ───────────────────────────────────────────────────────────────

/// Link state as observed by polling the radio driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// No association and no attempt in flight.
    Down,
    /// An attempt started by `begin_join` is still in flight.
    Connecting,
    /// Associated and addressed.
    Up,
    /// The driver reported a terminal failure for the current attempt.
    Failed,
}

/// The station side of the radio.  Joins are started, never awaited: the
/// [`StationLink`](crate::link::station::StationLink) polls [`status`](Self::status).
pub trait StationPort {
    /// Start associating with `ssid`.  Must return promptly.
    fn begin_join(&mut self, ssid: &str, passphrase: &str) -> Result<(), LinkError>;

    fn status(&self) -> LinkStatus;

    fn disconnect(&mut self);

    /// Signal strength of the current association, if any.
    fn rssi(&self) -> Option<i8>;
}

// ───────────────────────────────────────────────────────────────
// Backend port (driven adapter: registration + telemetry transport)
// ───────────────────────────────────────────────────────────────

/// What the device sends when redeeming a one-time key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationRequest<'a> {
    pub one_time_key: &'a str,
    pub user_email: &'a str,
    pub device_name: &'a str,
}

/// Identity handed back by the backend on a successful registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationGrant {
    pub node_id: String,
    pub broker_host: String,
    pub broker_port: u16,
    pub broker_username: String,
    pub broker_password: String,
    pub first_sensor_id: String,
    pub first_sensor_serial: String,
}

impl RegistrationGrant {
    /// A grant is only usable when every field is populated.
    pub fn is_complete(&self) -> bool {
        !self.node_id.is_empty()
            && !self.broker_host.is_empty()
            && self.broker_port != 0
            && !self.broker_username.is_empty()
            && !self.broker_password.is_empty()
            && !self.first_sensor_id.is_empty()
            && !self.first_sensor_serial.is_empty()
    }
}

/// Broker session parameters, borrowed from the persisted config.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BrokerCredentials<'a> {
    pub host: &'a str,
    pub port: u16,
    pub client_id: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

impl fmt::Debug for BrokerCredentials<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Registration and telemetry transport.
///
/// The offline stub and a networked implementation are interchangeable;
/// [`RegistrationFlow`](super::registration::RegistrationFlow) and
/// [`TelemetryLink`](crate::link::telemetry::TelemetryLink) only see this trait.
pub trait BackendPort {
    /// Whether registration and broker traffic need the station link up.
    fn requires_station(&self) -> bool;

    fn perform_registration(
        &mut self,
        request: &RegistrationRequest<'_>,
    ) -> Result<RegistrationGrant, RegistrationError>;

    fn connect_broker(&mut self, credentials: &BrokerCredentials<'_>) -> Result<(), LinkError>;

    fn broker_connected(&self) -> bool;

    fn disconnect_broker(&mut self);

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), LinkError>;
}

// ───────────────────────────────────────────────────────────────
// Byte source (driven adapter: sensor UART → domain)
// ───────────────────────────────────────────────────────────────

/// Non-blocking byte stream.  `None` means nothing is buffered right now;
/// the caller decides how long to keep polling.
pub trait ByteSource {
    fn read_byte(&mut self) -> Option<u8>;
}

// ───────────────────────────────────────────────────────────────
// Clock (monotonic time + bounded waits)
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock.  The [`DelayNs`] supertrait provides the
/// short sleeps used while waiting inside a bounded read.
pub trait Clock: DelayNs {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// System port (heap metrics, restart)
// ───────────────────────────────────────────────────────────────

pub trait SystemPort {
    /// Free heap in bytes.
    fn free_heap(&self) -> u32;

    /// Restart the chip.  On the device this does not return.
    fn restart(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`NodeSettings`](crate::config::NodeSettings) validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A setting failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// The medium rejected the read or the commit.
    IoError,
    /// The record could not be encoded into its fixed-size slot.
    Encoding,
}

/// Transient link errors (station and broker).  Always retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    InvalidSsid,
    InvalidPassphrase,
    JoinFailed,
    BrokerRefused,
    NotConnected,
    PublishFailed,
}

/// Reasons a registration attempt did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationError {
    /// The backend needs the station link and it did not come up in time.
    StationDown,
    /// The backend answered but refused the one-time key.
    Rejected,
    /// The request could not be delivered or the reply could not be parsed.
    Transport,
    /// The reply was missing a derived field or carried port 0.
    IncompleteGrant,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Encoding => write!(f, "record encoding failed"),
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 bytes)"),
            Self::InvalidPassphrase => write!(f, "passphrase invalid for the driver"),
            Self::JoinFailed => write!(f, "station join failed"),
            Self::BrokerRefused => write!(f, "broker refused the session"),
            Self::NotConnected => write!(f, "not connected"),
            Self::PublishFailed => write!(f, "publish failed"),
        }
    }
}

impl fmt::Display for RegistrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StationDown => write!(f, "station link not connected"),
            Self::Rejected => write!(f, "one-time key rejected"),
            Self::Transport => write!(f, "registration transport error"),
            Self::IncompleteGrant => write!(f, "registration reply incomplete"),
        }
    }
}
