//! Device configuration and runtime tunables.
//!
//! [`DeviceConfig`] is the single persisted record: the fields the user types
//! into the provisioning portal plus the identity handed back by a successful
//! registration.  Every text field has a fixed capacity and oversized input is
//! truncated, never rejected, so the persisted record stays bounded.
//!
//! [`NodeSettings`] holds compile-time timing parameters for the state
//! machines.  They are not persisted.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::app::ports::{ConfigError, RegistrationGrant};

/// Byte capacity of user-entered and broker text fields (63 + terminator in
/// the on-flash layout of earlier firmware).
pub const TEXT_FIELD_CAP: usize = 63;

/// Byte capacity of UUID-shaped identifiers (36 + terminator).
pub const ID_FIELD_CAP: usize = 36;

pub type TextField = heapless::String<TEXT_FIELD_CAP>;
pub type IdField = heapless::String<ID_FIELD_CAP>;

/// Copy `src` into `dst`, cutting at the first NUL and then at the largest
/// char boundary that fits the capacity.
pub fn assign_truncated<const N: usize>(dst: &mut heapless::String<N>, src: &str) {
    let src = src.find('\0').map_or(src, |nul| &src[..nul]);
    let mut end = src.len().min(N);
    while !src.is_char_boundary(end) {
        end -= 1;
    }
    dst.clear();
    // Cannot overflow: `end <= N`.
    let _ = dst.push_str(&src[..end]);
}

/// Build a bounded field from `src` with [`assign_truncated`] semantics.
pub fn bounded<const N: usize>(src: &str) -> heapless::String<N> {
    let mut s = heapless::String::new();
    assign_truncated(&mut s, src);
    s
}

/// Keep the first `keep` chars of a secret and star the rest.
pub fn mask(secret: &str, keep: usize) -> String {
    if secret.chars().count() <= keep {
        return secret.to_owned();
    }
    secret
        .chars()
        .enumerate()
        .map(|(i, c)| if i < keep { c } else { '*' })
        .collect()
}

// ───────────────────────────────────────────────────────────────
// Provisioning submission
// ───────────────────────────────────────────────────────────────

/// Values posted by the provisioning portal.
///
/// `None` means the field was absent from the submission; the stored value
/// is kept.  `Some("")` explicitly clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningForm {
    pub wifi_ssid: Option<String>,
    pub wifi_pass: Option<String>,
    pub user_email: Option<String>,
    pub device_name: Option<String>,
    pub one_time_key: Option<String>,
}

// ───────────────────────────────────────────────────────────────
// DeviceConfig
// ───────────────────────────────────────────────────────────────

/// The persisted device record.
///
/// The schema marker is not part of this struct; it is the header of the
/// stored record and is owned by [`ConfigStore`](crate::config_store::ConfigStore).
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    // --- Entered through the portal ---
    pub wifi_ssid: TextField,
    pub wifi_pass: TextField,
    pub user_email: TextField,
    pub device_name: TextField,
    pub one_time_key: TextField,

    // --- Populated by registration ---
    pub node_id: IdField,
    pub broker_host: TextField,
    pub broker_port: u16,
    pub broker_username: TextField,
    pub broker_password: TextField,
    pub first_sensor_id: IdField,
    pub first_sensor_serial: TextField,

    pub registration_complete: bool,
}

impl DeviceConfig {
    /// Both SSID and passphrase are required before a station join is tried.
    pub fn has_station_credentials(&self) -> bool {
        !self.wifi_ssid.is_empty() && !self.wifi_pass.is_empty()
    }

    /// True only for a fully registered record with every broker field set.
    pub fn has_broker_credentials(&self) -> bool {
        self.registration_complete
            && !self.node_id.is_empty()
            && !self.broker_host.is_empty()
            && self.broker_port != 0
            && !self.broker_username.is_empty()
            && !self.broker_password.is_empty()
    }

    /// Checks that a complete registration has every derived field populated.
    pub fn registration_consistent(&self) -> bool {
        !self.registration_complete
            || (self.has_broker_credentials()
                && !self.first_sensor_id.is_empty()
                && !self.first_sensor_serial.is_empty())
    }

    /// Overwrite the user fields present in `form`, truncating oversize
    /// values, then drop any previous registration.
    pub fn apply_submission(&mut self, form: &ProvisioningForm) {
        let fields: [(&Option<String>, &mut TextField); 5] = [
            (&form.wifi_ssid, &mut self.wifi_ssid),
            (&form.wifi_pass, &mut self.wifi_pass),
            (&form.user_email, &mut self.user_email),
            (&form.device_name, &mut self.device_name),
            (&form.one_time_key, &mut self.one_time_key),
        ];
        for (value, field) in fields {
            if let Some(v) = value {
                assign_truncated(field, v);
            }
        }
        self.invalidate_registration();
    }

    /// Clear every registration-derived field.
    pub fn invalidate_registration(&mut self) {
        self.registration_complete = false;
        self.node_id.clear();
        self.broker_host.clear();
        self.broker_port = 0;
        self.broker_username.clear();
        self.broker_password.clear();
        self.first_sensor_id.clear();
        self.first_sensor_serial.clear();
    }

    /// Populate the derived fields from a validated grant and mark the
    /// registration complete.
    pub fn apply_grant(&mut self, grant: &RegistrationGrant) {
        assign_truncated(&mut self.node_id, &grant.node_id);
        assign_truncated(&mut self.broker_host, &grant.broker_host);
        self.broker_port = grant.broker_port;
        assign_truncated(&mut self.broker_username, &grant.broker_username);
        assign_truncated(&mut self.broker_password, &grant.broker_password);
        assign_truncated(&mut self.first_sensor_id, &grant.first_sensor_id);
        assign_truncated(&mut self.first_sensor_serial, &grant.first_sensor_serial);
        self.registration_complete = true;
    }
}

/// Redacted multi-line dump for serial logs.
impl fmt::Display for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  SSID='{}'", self.wifi_ssid)?;
        writeln!(f, "  PASS='{}'", mask(&self.wifi_pass, 2))?;
        writeln!(f, "  USER='{}'", self.user_email)?;
        writeln!(f, "  NAME='{}'", self.device_name)?;
        writeln!(f, "  KEY ='{}'", mask(&self.one_time_key, 2))?;
        writeln!(f, "  node_id='{}'", self.node_id)?;
        writeln!(f, "  broker='{}:{}'", self.broker_host, self.broker_port)?;
        writeln!(f, "  broker_user='{}'", self.broker_username)?;
        writeln!(f, "  broker_pass='{}'", mask(&self.broker_password, 2))?;
        write!(f, "  registration_complete={}", self.registration_complete)
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("wifi_ssid", &self.wifi_ssid)
            .field("wifi_pass", &mask(&self.wifi_pass, 0))
            .field("user_email", &self.user_email)
            .field("device_name", &self.device_name)
            .field("one_time_key", &mask(&self.one_time_key, 0))
            .field("node_id", &self.node_id)
            .field("broker_host", &self.broker_host)
            .field("broker_port", &self.broker_port)
            .field("broker_username", &self.broker_username)
            .field("broker_password", &mask(&self.broker_password, 0))
            .field("first_sensor_id", &self.first_sensor_id)
            .field("first_sensor_serial", &self.first_sensor_serial)
            .field("registration_complete", &self.registration_complete)
            .finish()
    }
}

// ───────────────────────────────────────────────────────────────
// NodeSettings
// ───────────────────────────────────────────────────────────────

/// Timing parameters for the cooperative loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSettings {
    // --- Sensor frames ---
    /// Budget for finding the frame marker.
    pub marker_timeout_ms: u32,
    /// Budget shared by the length field and the payload.
    pub payload_timeout_ms: u32,

    // --- Station link ---
    /// Join attempts that have not come up after this long count as failed.
    pub join_timeout_ms: u32,
    /// Bounded join wait performed once at boot.
    pub boot_join_timeout_ms: u32,

    // --- Reconnect backoff (station and broker) ---
    pub backoff_step_ms: u32,
    pub backoff_ceiling_ms: u32,

    // --- Cadences ---
    pub publish_interval_ms: u32,
    pub heartbeat_interval_ms: u32,
    /// Sleep between empty serial polls inside a bounded read.
    pub idle_poll_delay_ms: u32,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            marker_timeout_ms: 200,
            payload_timeout_ms: 200,

            join_timeout_ms: 15_000,
            boot_join_timeout_ms: 8_000,

            backoff_step_ms: 5_000,    // 5 s, 10 s, 15 s ...
            backoff_ceiling_ms: 60_000, // ... capped at 60 s

            publish_interval_ms: 20_000,
            heartbeat_interval_ms: 5_000,
            idle_poll_delay_ms: 2,
        }
    }
}

impl NodeSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.marker_timeout_ms == 0 || self.payload_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "frame timeouts must be non-zero",
            ));
        }
        if self.join_timeout_ms == 0 || self.boot_join_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "join timeouts must be non-zero",
            ));
        }
        if self.backoff_step_ms == 0 || self.backoff_step_ms > self.backoff_ceiling_ms {
            return Err(ConfigError::ValidationFailed(
                "backoff_step_ms must be 1..=backoff_ceiling_ms",
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "heartbeat_interval_ms must be non-zero",
            ));
        }
        if self.idle_poll_delay_ms >= self.marker_timeout_ms.min(self.payload_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "idle_poll_delay_ms must be below the frame timeouts",
            ));
        }
        Ok(())
    }
}
