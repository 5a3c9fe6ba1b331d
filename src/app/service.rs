//! Application service: the hexagonal core.
//!
//! [`NodeService`] owns the device record, the link state machines, the
//! frame decoder and the heartbeat.  The long-lived adapters (storage, radio,
//! backend) are owned; per-call ports (serial, clock, system, event sink)
//! are injected at call sites, making the entire service testable with mock
//! adapters.
//!
//! ```text
//!  ByteSource ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                 │          NodeService          │
//!  StoragePort ◀──│  Config · Station · Broker    │──▶ BackendPort
//!  StationPort ◀──│  Decoder · Heartbeat          │
//!                 └──────────────────────────────┘
//! ```
//!
//! One call to [`poll`](NodeService::poll) is one iteration of the
//! cooperative loop.  Portal requests enter through
//! [`handle_command`](NodeService::handle_command).

use log::{debug, info};

use crate::config::{DeviceConfig, NodeSettings};
use crate::config_store::ConfigStore;
use crate::error::Result;
use crate::link::station::{StationLink, StationState};
use crate::link::telemetry::{BrokerState, PublishOutcome, TelemetryLink};
use crate::sensors::pms5003::FrameDecoder;
use crate::sensors::{ReadingSlot, SensorReading};
use crate::status::{StatusInputs, StatusReporter, StatusSnapshot};

use super::commands::{CommandOutcome, PortalCommand};
use super::events::AppEvent;
use super::ports::{
    BackendPort, ByteSource, Clock, EventSink, StationPort, StoragePort, SystemPort,
};
use super::registration::RegistrationFlow;

// ───────────────────────────────────────────────────────────────
// NodeService
// ───────────────────────────────────────────────────────────────

pub struct NodeService<S, W, B> {
    settings: NodeSettings,
    config: DeviceConfig,
    store: ConfigStore<S>,
    wifi: W,
    backend: B,
    station: StationLink,
    telemetry: TelemetryLink,
    decoder: FrameDecoder,
    readings: ReadingSlot,
    heartbeat: StatusReporter,
}

impl<S, W, B> NodeService<S, W, B>
where
    S: StoragePort,
    W: StationPort,
    B: BackendPort,
{
    // ── Lifecycle ─────────────────────────────────────────────

    /// Load the record and, if credentials exist, make one bounded attempt
    /// to join the station before the loop starts.
    pub fn boot(
        storage: S,
        wifi: W,
        backend: B,
        settings: NodeSettings,
        clock: &mut impl Clock,
        sink: &mut impl EventSink,
    ) -> Result<Self> {
        settings.validate()?;

        let mut store = ConfigStore::new(storage);
        let config = store.load();
        info!("Config:\n{}", config);

        let mut svc = Self {
            station: StationLink::new(&settings),
            telemetry: TelemetryLink::new(&settings),
            decoder: FrameDecoder::new(&settings),
            readings: ReadingSlot::new(),
            heartbeat: StatusReporter::new(&settings, clock.now_ms()),
            settings,
            config,
            store,
            wifi,
            backend,
        };

        let mut station_joined = false;
        if svc.config.has_station_credentials() {
            svc.station.request_join(&mut svc.wifi);
            station_joined = svc.station.wait_joined(
                clock,
                &svc.config,
                &mut svc.wifi,
                svc.settings.boot_join_timeout_ms,
            );
            svc.station.reset_backoff();
        } else {
            info!("WiFi: no station credentials, AP-only until provisioned");
        }

        sink.emit(&AppEvent::Booted {
            registered: svc.config.registration_complete,
            station_joined,
        });
        Ok(svc)
    }

    // ── Cooperative loop ──────────────────────────────────────

    /// One loop iteration: decode → station → broker → publish → heartbeat.
    pub fn poll(
        &mut self,
        serial: &mut impl ByteSource,
        clock: &mut impl Clock,
        system: &impl SystemPort,
        sink: &mut impl EventSink,
    ) {
        // 1. At most one sensor frame.
        match self.decoder.read_frame(serial, clock) {
            Ok(reading) => {
                self.readings.offer(reading);
                sink.emit(&AppEvent::ReadingDecoded(reading));
            }
            Err(e) if e.is_integrity() => sink.emit(&AppEvent::FrameRejected(e)),
            Err(e) => debug!("PMS: {}", e),
        }

        let now = clock.now_ms();

        // 2. Station link.
        let from = self.station.state();
        if let Some(to) = self.station.poll(now, &self.config, &mut self.wifi) {
            sink.emit(&AppEvent::StationChanged { from, to });
        }

        // 3. Broker session.
        let from = self.telemetry.state();
        if let Some(to) =
            self.telemetry
                .poll(now, &self.config, self.station.is_joined(), &mut self.backend)
        {
            sink.emit(&AppEvent::BrokerChanged { from, to });
        }

        // 4. Publish on cadence.
        match self.telemetry.maybe_publish(
            now,
            &self.config,
            self.readings.latest(),
            &mut self.backend,
        ) {
            PublishOutcome::Published { topic } => sink.emit(&AppEvent::Published { topic }),
            PublishOutcome::Failed(e) => sink.emit(&AppEvent::PublishFailed(e)),
            _ => {}
        }

        // 5. Heartbeat.
        if self.heartbeat.poll(now) {
            sink.emit(&AppEvent::Heartbeat(self.snapshot(now, system)));
        }
    }

    // ── Commands ──────────────────────────────────────────────

    pub fn handle_command(
        &mut self,
        cmd: PortalCommand,
        clock: &mut impl Clock,
        system: &mut impl SystemPort,
        sink: &mut impl EventSink,
    ) -> CommandOutcome {
        match cmd {
            PortalCommand::SubmitProvisioning(form) => {
                // The submission voids any registration; drop the old session.
                self.telemetry.drop_link(&mut self.backend);

                let report = RegistrationFlow {
                    config: &mut self.config,
                    store: &mut self.store,
                    station: &mut self.station,
                    wifi: &mut self.wifi,
                    backend: &mut self.backend,
                    join_timeout_ms: self.settings.join_timeout_ms,
                }
                .submit(&form, clock);

                if let Some(e) = report.persist_error {
                    sink.emit(&AppEvent::PersistFailed(e));
                }
                sink.emit(&AppEvent::Registration(report.outcome));
                CommandOutcome::Registration(report)
            }
            PortalCommand::Clear => {
                // The in-memory record is reset even when the commit fails.
                let error = self.store.clear().err();
                self.config = DeviceConfig::default();
                self.station.drop_link(&mut self.wifi);
                self.telemetry.drop_link(&mut self.backend);
                match error {
                    Some(e) => sink.emit(&AppEvent::PersistFailed(e)),
                    None => sink.emit(&AppEvent::ConfigCleared),
                }
                CommandOutcome::Cleared { error }
            }
            PortalCommand::Reboot => {
                info!("System: reboot requested");
                system.restart();
                CommandOutcome::RebootRequested
            }
            PortalCommand::GetStatus => {
                CommandOutcome::Status(self.snapshot(clock.now_ms(), system))
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn snapshot(&self, now_ms: u64, system: &impl SystemPort) -> StatusSnapshot {
        self.heartbeat.snapshot(
            now_ms,
            &StatusInputs {
                config: &self.config,
                station: self.station.state(),
                rssi: self.wifi.rssi(),
                broker: self.telemetry.state(),
                readings: &self.readings,
                free_heap: system.free_heap(),
            },
        )
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn settings(&self) -> &NodeSettings {
        &self.settings
    }

    pub fn station_state(&self) -> StationState {
        self.station.state()
    }

    pub fn station_backoff_ms(&self) -> u32 {
        self.station.backoff_ms()
    }

    pub fn broker_state(&self) -> BrokerState {
        self.telemetry.state()
    }

    pub fn latest_reading(&self) -> Option<&SensorReading> {
        self.readings.latest()
    }

    pub fn storage(&self) -> &S {
        self.store.storage()
    }

    pub fn storage_mut(&mut self) -> &mut S {
        self.store.storage_mut()
    }

    pub fn wifi(&self) -> &W {
        &self.wifi
    }

    pub fn wifi_mut(&mut self) -> &mut W {
        &mut self.wifi
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}
