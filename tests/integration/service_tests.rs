//! Integration tests for the cooperative loop and the portal commands that
//! are not covered by the provisioning and link suites.

use airnode::app::commands::{CommandOutcome, PortalCommand};
use airnode::app::events::AppEvent;
use airnode::app::ports::StorageError;
use airnode::app::service::NodeService;
use airnode::config::{DeviceConfig, NodeSettings};
use airnode::config_store::{ConfigStore, NAMESPACE, RECORD_KEY};
use airnode::error::Error;
use airnode::link::station::StationState;
use airnode::link::telemetry::BrokerState;

use crate::mock_hw::{
    MockBackend, MockNvs, MockStation, RecordingSink, Rig, SimClock, form_with_key,
    reference_words,
};

fn is_heartbeat(e: &AppEvent) -> bool {
    matches!(e, AppEvent::Heartbeat(_))
}

// ── Heartbeat ─────────────────────────────────────────────────

#[test]
fn first_poll_emits_a_heartbeat() {
    let mut rig = Rig::fresh();
    rig.poll();
    assert_eq!(rig.sink.count(is_heartbeat), 1);
}

#[test]
fn heartbeat_every_five_seconds() {
    let mut rig = Rig::fresh();
    // 50 empty polls = 10 s: heartbeats at 0.2 s and 5.2 s.
    for _ in 0..50 {
        rig.poll();
    }
    assert_eq!(rig.sink.count(is_heartbeat), 2);

    rig.poll();
    assert_eq!(rig.sink.count(is_heartbeat), 3);
}

#[test]
fn heartbeat_carries_latest_reading() {
    let mut rig = Rig::fresh();
    rig.serial.push_frame(&reference_words());
    rig.poll();

    let snapshot = rig
        .sink
        .events
        .iter()
        .find_map(|e| match e {
            AppEvent::Heartbeat(s) => Some(s.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(snapshot.reading.map(|r| r.pm10_atm), Some(31));
    assert_eq!(snapshot.reading_age_ms, Some(0));
    assert!(!snapshot.registration.complete);
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn status_reports_registration_without_secrets() {
    let mut rig = Rig::fresh();
    rig.submit(form_with_key("KEY-123"));
    rig.poll();

    let CommandOutcome::Status(status) = rig.command(PortalCommand::GetStatus) else {
        panic!("expected status");
    };
    assert!(status.registration.complete);
    assert_eq!(status.registration.broker_port, 1883);
    assert_eq!(status.broker, BrokerState::Connected);
    assert_eq!(status.free_heap, 200_000);

    let dump = format!("{:?}", status);
    assert!(!dump.contains("demo-pass"));
    assert!(!dump.contains("password1"));
    assert!(!dump.contains("KEY-123"));
}

#[test]
fn reboot_goes_through_system_port() {
    let mut rig = Rig::fresh();
    assert_eq!(rig.command(PortalCommand::Reboot), CommandOutcome::RebootRequested);
    assert_eq!(rig.system.restarts, 1);
}

#[test]
fn clear_resets_record_and_sessions() {
    let mut rig = Rig::fresh();
    rig.submit(form_with_key("KEY-123"));
    rig.poll();
    assert_eq!(rig.node.broker_state(), BrokerState::Connected);

    assert_eq!(
        rig.command(PortalCommand::Clear),
        CommandOutcome::Cleared { error: None }
    );
    assert_eq!(rig.node.config(), &DeviceConfig::default());
    assert_eq!(rig.node.broker_state(), BrokerState::Disconnected);
    assert!(!rig.node.backend().connected);
    assert_eq!(rig.sink.count(|e| *e == AppEvent::ConfigCleared), 1);

    // The stored record is the defaults too.
    let raw = rig.node.storage().raw(NAMESPACE, RECORD_KEY).unwrap().to_vec();
    let mut nvs = MockNvs::new();
    nvs.seed(NAMESPACE, RECORD_KEY, &raw);
    assert_eq!(ConfigStore::new(nvs).load(), DeviceConfig::default());
}

#[test]
fn clear_with_failing_storage_reports_error() {
    let mut rig = Rig::fresh();
    rig.submit(form_with_key("KEY-123"));
    rig.poll();
    assert_eq!(rig.node.broker_state(), BrokerState::Connected);
    rig.node.storage_mut().fail_writes = true;

    let CommandOutcome::Cleared { error } = rig.command(PortalCommand::Clear) else {
        panic!("expected cleared");
    };
    assert_eq!(error, Some(StorageError::IoError));

    // The in-memory record is cleared regardless of the failed commit.
    assert_eq!(rig.node.config(), &DeviceConfig::default());
    assert_eq!(
        rig.sink
            .count(|e| *e == AppEvent::PersistFailed(StorageError::IoError)),
        1
    );
    assert_eq!(rig.sink.count(|e| *e == AppEvent::ConfigCleared), 0);

    let joins = rig.node.wifi().joins;
    let connects = rig.node.backend().broker_connects;
    for _ in 0..3 {
        rig.poll();
    }
    assert_eq!(rig.node.station_state(), StationState::Idle);
    assert_eq!(rig.node.broker_state(), BrokerState::Disconnected);
    assert_eq!(rig.node.wifi().joins, joins);
    assert_eq!(rig.node.backend().broker_connects, connects);
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn boot_rejects_invalid_settings() {
    let settings = NodeSettings {
        backoff_step_ms: 0,
        ..NodeSettings::default()
    };
    let result = NodeService::boot(
        MockNvs::new(),
        MockStation::reachable(),
        MockBackend::offline(),
        settings,
        &mut SimClock::new(),
        &mut RecordingSink::new(),
    );
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
fn boot_event_reports_unregistered_blank_node() {
    let rig = Rig::fresh();
    assert_eq!(
        rig.sink.events,
        vec![AppEvent::Booted {
            registered: false,
            station_joined: false,
        }]
    );
}
