//! Integration tests for decode → broker session → publish.

use airnode::app::events::AppEvent;
use airnode::link::telemetry::BrokerState;

use crate::mock_hw::{Rig, form_with_key, frame, reference_words};

const TOPIC: &str =
    "measurements/00000000-0000-0000-0000-000000000001/00000000-0000-0000-0000-00000000SENS";

fn registered_rig() -> Rig {
    let mut rig = Rig::fresh();
    rig.submit(form_with_key("KEY-123"));
    assert!(rig.node.config().registration_complete);
    rig
}

// ── Publishing ────────────────────────────────────────────────

#[test]
fn reference_frame_is_published_in_the_same_poll() {
    let mut rig = registered_rig();
    rig.serial.push_frame(&reference_words());
    rig.poll();

    assert_eq!(rig.node.broker_state(), BrokerState::Connected);
    let published = &rig.node.backend().published;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, TOPIC);
    assert_eq!(
        published[0].1,
        r#"{"measurement":{"pm1":11.0,"pm25":21.0,"pm10":31.0}}"#
    );
    assert_eq!(
        rig.sink.count(|e| matches!(e, AppEvent::Published { topic } if topic == TOPIC)),
        1
    );
}

#[test]
fn publishes_respect_the_cadence() {
    let mut rig = registered_rig();
    rig.serial.push_frame(&reference_words());
    rig.poll();
    assert_eq!(rig.node.backend().published.len(), 1);

    // A fresh reading right away is held back.
    rig.serial.push_frame(&reference_words());
    rig.poll();
    assert_eq!(rig.node.backend().published.len(), 1);

    rig.clock.advance(20_000);
    rig.serial.push_frame(&reference_words());
    rig.poll();
    assert_eq!(rig.node.backend().published.len(), 2);
}

#[test]
fn nothing_is_published_without_a_reading() {
    let mut rig = registered_rig();
    for _ in 0..10 {
        rig.poll();
    }
    assert_eq!(rig.node.broker_state(), BrokerState::Connected);
    assert!(rig.node.backend().published.is_empty());
}

#[test]
fn unregistered_node_never_opens_a_session() {
    let mut rig = Rig::fresh();
    rig.submit(form_with_key(""));
    for _ in 0..5 {
        rig.serial.push_frame(&reference_words());
        rig.poll();
    }
    assert_eq!(rig.node.backend().broker_connects, 0);
    assert!(rig.node.backend().published.is_empty());
    assert!(rig.node.latest_reading().is_some());
}

// ── Frame integrity ───────────────────────────────────────────

#[test]
fn corrupted_checksum_keeps_previous_reading() {
    let mut rig = Rig::fresh();
    rig.serial.push_frame(&reference_words());
    rig.poll();
    assert_eq!(rig.node.latest_reading().map(|r| r.pm25_atm), Some(21));

    let mut words = reference_words();
    words[4] = 99;
    let mut bad = frame(&words);
    let last = bad.len() - 1;
    bad[last] ^= 0xFF;
    rig.serial.push_bytes(&bad);
    rig.poll();

    assert_eq!(rig.node.latest_reading().map(|r| r.pm25_atm), Some(21));
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::FrameRejected(_))),
        1
    );
}

#[test]
fn frame_after_line_noise_is_decoded() {
    let mut rig = Rig::fresh();
    rig.serial.push_bytes(&[0x00, 0x42, 0x42, 0x13, 0x4D]);
    rig.serial.push_frame(&reference_words());
    rig.poll();

    let reading = rig.node.latest_reading().copied().unwrap();
    assert_eq!(
        (reading.pm1_cf1, reading.pm25_cf1, reading.pm10_cf1),
        (10, 20, 30)
    );
    assert_eq!(
        (reading.pm1_atm, reading.pm25_atm, reading.pm10_atm),
        (11, 21, 31)
    );
}

#[test]
fn quiet_serial_is_not_reported_as_rejected() {
    let mut rig = Rig::fresh();
    for _ in 0..5 {
        rig.poll();
    }
    assert_eq!(rig.sink.count(|e| matches!(e, AppEvent::FrameRejected(_))), 0);
    assert!(rig.node.latest_reading().is_none());
}

// ── Session management ────────────────────────────────────────

#[test]
fn refused_broker_backs_off() {
    let mut rig = registered_rig();
    rig.node.backend_mut().refuse_broker = true;

    rig.poll();
    assert_eq!(rig.node.backend().broker_connects, 1);

    // 4 s later: still inside the 5 s interval.
    for _ in 0..20 {
        rig.poll();
    }
    assert_eq!(rig.node.backend().broker_connects, 1);

    for _ in 0..10 {
        rig.poll();
    }
    assert_eq!(rig.node.backend().broker_connects, 2);
    assert_eq!(rig.node.broker_state(), BrokerState::Disconnected);
}

#[test]
fn dropped_session_is_reestablished() {
    let mut rig = registered_rig();
    rig.poll();
    assert_eq!(rig.node.broker_state(), BrokerState::Connected);

    rig.node.backend_mut().connected = false;
    rig.poll();
    assert_eq!(rig.node.broker_state(), BrokerState::Disconnected);
    assert_eq!(
        rig.sink.count(|e| *e
            == AppEvent::BrokerChanged {
                from: BrokerState::Connected,
                to: BrokerState::Disconnected,
            }),
        1
    );

    rig.poll();
    assert_eq!(rig.node.broker_state(), BrokerState::Connected);
    assert_eq!(rig.node.backend().broker_connects, 2);
}

#[test]
fn resubmission_drops_the_session() {
    let mut rig = registered_rig();
    rig.poll();
    assert!(rig.node.backend().connected);

    rig.submit(form_with_key(""));
    assert!(!rig.node.backend().connected);
    assert_eq!(rig.node.broker_state(), BrokerState::Disconnected);
}
