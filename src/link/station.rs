//! Station (WiFi STA) join state machine.
//!
//! ```text
//!            credentials
//!   Idle ─────────────────▶ Joining ──Up──▶ Joined
//!    ▲                        │  ▲            │
//!    │ request_join()  Failed │  │ ready()    │ link lost
//!    │ / creds cleared  or    ▼  │            ▼
//!    └──────────────────── Retrying ◀─────────┘
//!                          timeout
//! ```
//!
//! A failed or timed-out join adds one backoff step; a successful join
//! resets it.  Losing an established link carries no penalty, so the first
//! rejoin is immediate.

use log::{info, warn};

use crate::app::ports::{Clock, LinkStatus, StationPort};
use crate::config::{DeviceConfig, NodeSettings};

use super::backoff::Backoff;

/// Poll period inside [`StationLink::wait_joined`].
const JOIN_WAIT_POLL_MS: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationState {
    /// No attempt in flight.  With credentials present this is a pending join.
    Idle,
    Joining { started_ms: u64 },
    Joined,
    /// Waiting out the backoff before the next attempt.
    Retrying,
}

impl StationState {
    /// Short label for logs and status snapshots.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Joining { .. } => "joining",
            Self::Joined => "joined",
            Self::Retrying => "retrying",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StationLink {
    state: StationState,
    backoff: Backoff,
    join_timeout_ms: u32,
}

impl StationLink {
    pub fn new(settings: &NodeSettings) -> Self {
        Self {
            state: StationState::Idle,
            backoff: Backoff::new(settings.backoff_step_ms, settings.backoff_ceiling_ms),
            join_timeout_ms: settings.join_timeout_ms,
        }
    }

    pub fn state(&self) -> StationState {
        self.state
    }

    pub fn is_joined(&self) -> bool {
        self.state == StationState::Joined
    }

    pub fn backoff_ms(&self) -> u32 {
        self.backoff.interval_ms()
    }

    pub fn reset_backoff(&mut self) {
        self.backoff.reset();
    }

    /// Forced re-join: drop the current association and start over with no
    /// backoff on the next poll.
    pub fn request_join(&mut self, driver: &mut impl StationPort) {
        driver.disconnect();
        self.backoff.reset();
        self.state = StationState::Idle;
        info!("WiFi: re-join requested");
    }

    /// Drop the link without scheduling a rejoin penalty.
    pub fn drop_link(&mut self, driver: &mut impl StationPort) {
        driver.disconnect();
        self.backoff.reset();
        self.state = StationState::Idle;
    }

    /// Advance the state machine once.  Returns the new state if it changed.
    pub fn poll(
        &mut self,
        now_ms: u64,
        config: &DeviceConfig,
        driver: &mut impl StationPort,
    ) -> Option<StationState> {
        let before = self.state;

        if !config.has_station_credentials() {
            if self.state != StationState::Idle {
                driver.disconnect();
                self.state = StationState::Idle;
            }
        } else {
            match self.state {
                StationState::Idle => self.start_join(now_ms, config, driver),
                StationState::Joining { started_ms } => match driver.status() {
                    LinkStatus::Up => {
                        self.backoff.reset();
                        self.state = StationState::Joined;
                        info!("WiFi: joined '{}' (RSSI={:?})", config.wifi_ssid, driver.rssi());
                    }
                    LinkStatus::Failed => self.fail_attempt("driver reported failure"),
                    _ if now_ms.saturating_sub(started_ms) >= u64::from(self.join_timeout_ms) => {
                        driver.disconnect();
                        self.fail_attempt("join timed out");
                    }
                    _ => {}
                },
                StationState::Joined => {
                    if driver.status() != LinkStatus::Up {
                        warn!("WiFi: link lost, rejoining");
                        self.state = StationState::Retrying;
                    }
                }
                StationState::Retrying => {
                    if self.backoff.ready(now_ms) {
                        self.start_join(now_ms, config, driver);
                    }
                }
            }
        }

        (self.state != before).then_some(self.state)
    }

    /// Poll until joined or `timeout_ms` elapses.  Returns whether the link
    /// came up.
    pub fn wait_joined(
        &mut self,
        clock: &mut impl Clock,
        config: &DeviceConfig,
        driver: &mut impl StationPort,
        timeout_ms: u32,
    ) -> bool {
        let start = clock.now_ms();
        loop {
            self.poll(clock.now_ms(), config, driver);
            if self.is_joined() {
                return true;
            }
            if clock.now_ms().saturating_sub(start) >= u64::from(timeout_ms) {
                warn!("WiFi: not joined after {} ms", timeout_ms);
                return false;
            }
            clock.delay_ms(JOIN_WAIT_POLL_MS);
        }
    }

    fn start_join(&mut self, now_ms: u64, config: &DeviceConfig, driver: &mut impl StationPort) {
        self.backoff.record_attempt(now_ms);
        info!("WiFi: joining '{}'", config.wifi_ssid);
        match driver.begin_join(&config.wifi_ssid, &config.wifi_pass) {
            Ok(()) => self.state = StationState::Joining { started_ms: now_ms },
            Err(e) => {
                warn!("WiFi: join rejected by driver: {}", e);
                self.backoff.record_failure();
                self.state = StationState::Retrying;
            }
        }
    }

    fn fail_attempt(&mut self, reason: &str) {
        self.backoff.record_failure();
        self.state = StationState::Retrying;
        warn!(
            "WiFi: {} (next attempt in {} ms)",
            reason,
            self.backoff.interval_ms()
        );
    }
}
