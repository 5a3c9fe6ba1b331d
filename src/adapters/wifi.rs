//! WiFi station-mode adapter.
//!
//! Implements [`StationPort`], the hexagonal boundary for the station
//! link.  Joins are started here and observed by polling; the retry policy
//! lives in [`StationLink`](crate::link::station::StationLink), not here.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver calls via `esp_idf_svc::wifi`.
//! - **all other targets**: deterministic simulation for host-side tests.

use log::{info, warn};

use crate::app::ports::{LinkError, LinkStatus, StationPort};

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn validate_ssid(ssid: &str) -> Result<(), LinkError> {
    if ssid.is_empty() || ssid.len() > 32 {
        return Err(LinkError::InvalidSsid);
    }
    Ok(())
}

fn validate_passphrase(passphrase: &str) -> Result<(), LinkError> {
    if passphrase.is_empty() {
        return Ok(());
    }
    if passphrase.len() < 8 || passphrase.len() > 64 {
        return Err(LinkError::InvalidPassphrase);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

/// Status polls a simulated join stays in `Connecting`.
#[cfg(not(target_os = "espidf"))]
const SIM_JOIN_POLLS: u32 = 3;

pub struct WifiAdapter {
    #[cfg(target_os = "espidf")]
    wifi: EspWifi<'static>,
    #[cfg(target_os = "espidf")]
    joining: bool,

    /// Simulation: current link state.
    #[cfg(not(target_os = "espidf"))]
    sim_status: core::cell::Cell<LinkStatus>,
    /// Simulation: polls left before a pending join resolves.
    #[cfg(not(target_os = "espidf"))]
    sim_polls_left: core::cell::Cell<u32>,
    /// Simulation: whether the access point accepts joins.
    #[cfg(not(target_os = "espidf"))]
    sim_reachable: bool,
    #[cfg(not(target_os = "espidf"))]
    sim_join_counter: u32,
}

impl WifiAdapter {
    #[cfg(target_os = "espidf")]
    pub fn new(wifi: EspWifi<'static>) -> Self {
        Self {
            wifi,
            joining: false,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self {
            sim_status: core::cell::Cell::new(LinkStatus::Down),
            sim_polls_left: core::cell::Cell::new(0),
            sim_reachable: true,
            sim_join_counter: 0,
        }
    }

    /// Simulation: make subsequent joins fail (or succeed again).
    #[cfg(not(target_os = "espidf"))]
    pub fn set_sim_reachable(&mut self, reachable: bool) {
        self.sim_reachable = reachable;
    }

    /// Simulation: drop an established link as if the AP went away.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self) {
        self.sim_status.set(LinkStatus::Down);
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_begin_join(&mut self, ssid: &str, passphrase: &str) -> Result<(), LinkError> {
        let auth_method = if passphrase.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: ssid.try_into().map_err(|_| LinkError::InvalidSsid)?,
            password: passphrase
                .try_into()
                .map_err(|_| LinkError::InvalidPassphrase)?,
            auth_method,
            ..Default::default()
        });

        self.wifi.set_configuration(&config).map_err(|e| {
            warn!("WiFi(espidf): set_configuration failed: {}", e);
            LinkError::JoinFailed
        })?;
        if !self.wifi.is_started().unwrap_or(false) {
            self.wifi.start().map_err(|e| {
                warn!("WiFi(espidf): start failed: {}", e);
                LinkError::JoinFailed
            })?;
        }
        self.wifi.connect().map_err(|e| {
            warn!("WiFi(espidf): connect failed: {}", e);
            LinkError::JoinFailed
        })?;
        self.joining = true;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_begin_join(&mut self, ssid: &str, _passphrase: &str) -> Result<(), LinkError> {
        self.sim_join_counter = self.sim_join_counter.wrapping_add(1);
        self.sim_status.set(LinkStatus::Connecting);
        self.sim_polls_left.set(SIM_JOIN_POLLS);
        info!("WiFi(sim): joining '{}' (attempt {})", ssid, self.sim_join_counter);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_status(&self) -> LinkStatus {
        let associated = self.wifi.is_connected().unwrap_or(false);
        let addressed = self.wifi.is_up().unwrap_or(false);
        match (associated && addressed, self.joining) {
            (true, _) => LinkStatus::Up,
            (false, true) => LinkStatus::Connecting,
            (false, false) => LinkStatus::Down,
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_status(&self) -> LinkStatus {
        if self.sim_status.get() == LinkStatus::Connecting {
            let left = self.sim_polls_left.get().saturating_sub(1);
            self.sim_polls_left.set(left);
            if left == 0 {
                let resolved = if self.sim_reachable {
                    LinkStatus::Up
                } else {
                    LinkStatus::Failed
                };
                self.sim_status.set(resolved);
            }
        }
        self.sim_status.get()
    }

    #[cfg(target_os = "espidf")]
    fn platform_disconnect(&mut self) {
        self.joining = false;
        if let Err(e) = self.wifi.disconnect() {
            // Disconnecting an idle station reports an error; nothing to undo.
            log::debug!("WiFi(espidf): disconnect: {}", e);
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_disconnect(&mut self) {
        self.sim_status.set(LinkStatus::Down);
        self.sim_polls_left.set(0);
    }

    #[cfg(target_os = "espidf")]
    fn platform_rssi(&self) -> Option<i8> {
        use esp_idf_svc::sys::{ESP_OK, esp_wifi_sta_get_ap_info, wifi_ap_record_t};
        if self.platform_status() != LinkStatus::Up {
            return None;
        }
        let mut ap_info: wifi_ap_record_t = unsafe { core::mem::zeroed() };
        let ret = unsafe { esp_wifi_sta_get_ap_info(&mut ap_info) };
        (ret == ESP_OK).then_some(ap_info.rssi)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_rssi(&self) -> Option<i8> {
        if self.sim_status.get() != LinkStatus::Up {
            return None;
        }
        // Oscillate around -60 dBm with the attempt counter.
        let oscillation = ((self.sim_join_counter % 12) as i8) - 6; // -6..+5
        Some(-60_i8.saturating_add(oscillation))
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// StationPort
// ───────────────────────────────────────────────────────────────

impl StationPort for WifiAdapter {
    fn begin_join(&mut self, ssid: &str, passphrase: &str) -> Result<(), LinkError> {
        validate_ssid(ssid)?;
        validate_passphrase(passphrase)?;
        self.platform_begin_join(ssid, passphrase)
    }

    fn status(&self) -> LinkStatus {
        self.platform_status()
    }

    fn disconnect(&mut self) {
        self.platform_disconnect();
        info!("WiFi: disconnected");
    }

    fn rssi(&self) -> Option<i8> {
        self.platform_rssi()
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
