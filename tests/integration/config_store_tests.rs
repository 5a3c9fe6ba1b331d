//! Integration tests for the persisted device record.
//!
//! Covers the self-healing load path and what the service sees after boot
//! for each kind of stored blob.

use airnode::app::ports::StorageError;
use airnode::config::DeviceConfig;
use airnode::config_store::{CONFIG_MAGIC, ConfigStore, NAMESPACE, RECORD_KEY, RECORD_SIZE};

use crate::mock_hw::{MockBackend, MockNvs, MockStation, Rig, demo_grant, nvs_with, station_config};

fn registered_config() -> DeviceConfig {
    let mut config = station_config();
    config.apply_grant(&demo_grant());
    config
}

// ── Self-healing load ─────────────────────────────────────────

#[test]
fn marker_mismatch_yields_defaults_and_one_write() {
    let mut nvs = MockNvs::new();
    let mut stale = vec![0u8; RECORD_SIZE];
    stale[..4].copy_from_slice(&0x0BAD_F00Du32.to_le_bytes());
    nvs.seed(NAMESPACE, RECORD_KEY, &stale);

    let mut store = ConfigStore::new(nvs);
    assert_eq!(store.load(), DeviceConfig::default());
    assert_eq!(store.storage().writes, 1, "defaults persisted exactly once");

    let healed = store.storage().raw(NAMESPACE, RECORD_KEY).unwrap();
    assert_eq!(&healed[..4], &CONFIG_MAGIC.to_le_bytes());
}

#[test]
fn truncated_record_is_replaced() {
    let mut nvs = MockNvs::new();
    nvs.seed(NAMESPACE, RECORD_KEY, &[0x01, 0xDE]);

    let mut store = ConfigStore::new(nvs);
    assert_eq!(store.load(), DeviceConfig::default());
    assert_eq!(store.storage().writes, 1);
}

#[test]
fn undecodable_body_is_replaced() {
    let mut nvs = MockNvs::new();
    let mut garbage = vec![0xFFu8; 64];
    garbage[..4].copy_from_slice(&CONFIG_MAGIC.to_le_bytes());
    nvs.seed(NAMESPACE, RECORD_KEY, &garbage);

    let mut store = ConfigStore::new(nvs);
    assert_eq!(store.load(), DeviceConfig::default());
    assert_eq!(store.storage().writes, 1);
}

#[test]
fn healed_record_is_not_rewritten_on_next_load() {
    let mut store = ConfigStore::new(MockNvs::new());
    store.load();
    store.load();
    assert_eq!(store.storage().writes, 1);
}

#[test]
fn failed_self_heal_still_returns_defaults() {
    let mut nvs = MockNvs::new();
    nvs.fail_writes = true;

    let mut store = ConfigStore::new(nvs);
    assert_eq!(store.load(), DeviceConfig::default());
    assert_eq!(store.storage().writes, 1);
    assert!(store.storage().raw(NAMESPACE, RECORD_KEY).is_none());
}

#[test]
fn save_failure_is_reported() {
    let mut nvs = MockNvs::new();
    nvs.fail_writes = true;

    let mut store = ConfigStore::new(nvs);
    assert_eq!(store.save(&station_config()), Err(StorageError::IoError));
}

#[test]
fn record_written_is_fixed_size() {
    let mut store = ConfigStore::new(MockNvs::new());
    store.save(&registered_config()).unwrap();
    let raw = store.storage().raw(NAMESPACE, RECORD_KEY).unwrap();
    assert_eq!(raw.len(), RECORD_SIZE);
}

// ── Through the service ───────────────────────────────────────

#[test]
fn boot_restores_registered_record() {
    let rig = Rig::boot(
        nvs_with(&registered_config()),
        MockStation::reachable(),
        MockBackend::offline(),
    );
    let config = rig.node.config();
    assert!(config.registration_complete);
    assert_eq!(config.node_id.as_str(), demo_grant().node_id);
    assert_eq!(rig.node.storage().writes, 0, "valid record is not rewritten");
}

#[test]
fn boot_on_blank_flash_persists_defaults() {
    let rig = Rig::fresh();
    assert_eq!(rig.node.config(), &DeviceConfig::default());
    assert_eq!(rig.node.storage().writes, 1);
}
