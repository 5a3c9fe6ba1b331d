//! AirNode Firmware: Main Entry Point
//!
//! Hexagonal architecture driven by a single cooperative loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  NvsAdapter     WifiAdapter    StubBackend    UartSensorPort   │
//! │  (Storage)      (Station)      (Backend)      (ByteSource)     │
//! │  Esp32Time      SystemAdapter  LogEventSink                    │
//! │  (Clock)        (System)       (EventSink)                     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              NodeService (pure logic)                  │    │
//! │  │  Config · Station · Broker · Decoder · Heartbeat       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use log::info;

use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{UartRxDriver, config::Config as UartConfig};
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::EspWifi;

use airnode::adapters::backend::StubBackend;
use airnode::adapters::log_sink::LogEventSink;
use airnode::adapters::nvs::NvsAdapter;
use airnode::adapters::serial::{PMS_BAUD, UartSensorPort};
use airnode::adapters::system::SystemAdapter;
use airnode::adapters::time::Esp32TimeAdapter;
use airnode::adapters::wifi::WifiAdapter;
use airnode::app::service::NodeService;
use airnode::config::NodeSettings;
use airnode::error::Error;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  AirNode v{}                         ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;

    let nvs = NvsAdapter::new().map_err(Error::from)?;
    let wifi = WifiAdapter::new(EspWifi::new(peripherals.modem, sysloop, None)?);

    // PMS5003 TX → GPIO13, RX only.
    let uart = UartRxDriver::new(
        peripherals.uart1,
        peripherals.pins.gpio13,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &UartConfig::new().baudrate(Hertz(PMS_BAUD)),
    )?;
    let mut serial = UartSensorPort::new(uart);
    info!("PMS: serial started on RX=13 @{}", PMS_BAUD);

    let mut clock = Esp32TimeAdapter::new();
    let system = SystemAdapter::new();
    let mut sink = LogEventSink::new();

    // ── 3. Boot the service ───────────────────────────────────
    let mut node = NodeService::boot(
        nvs,
        wifi,
        StubBackend::new(),
        NodeSettings::default(),
        &mut clock,
        &mut sink,
    )?;

    // ── 4. Cooperative loop ───────────────────────────────────
    // The captive portal is served by an external component that feeds
    // `node.handle_command`; this loop only drives the state machines.
    loop {
        node.poll(&mut serial, &mut clock, &system, &mut sink);
    }
}
