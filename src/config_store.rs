//! Persisted device record.
//!
//! One fixed-size blob under `airnode/devcfg`:
//!
//! ```text
//! ┌───────────────────┬──────────────────────────┬──────────────┐
//! │ CONFIG_MAGIC (LE) │ postcard(DeviceConfig)   │ zero padding │
//! │      4 bytes      │                          │              │
//! └───────────────────┴──────────────────────────┴──────────────┘
//!  ◀──────────────────────── RECORD_SIZE ────────────────────────▶
//! ```
//!
//! Every mutation rewrites the whole record.  A record whose marker does not
//! match, or whose body does not decode, is discarded and replaced by the
//! defaults in a single write.  A record claiming a complete registration
//! with a missing derived field keeps its user fields but loses the
//! registration.

use log::{error, info, warn};

use crate::app::ports::{StorageError, StoragePort};
use crate::config::DeviceConfig;

/// Schema marker.  Bump when the [`DeviceConfig`] layout changes.
pub const CONFIG_MAGIC: u32 = 0xEDC0_DE01;

pub const NAMESPACE: &str = "airnode";
pub const RECORD_KEY: &str = "devcfg";

/// Size of the stored blob.
pub const RECORD_SIZE: usize = 1024;

const MARKER_SIZE: usize = 4;

/// Owns the storage port and the record layout.
pub struct ConfigStore<S> {
    storage: S,
}

impl<S: StoragePort> ConfigStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Load the record, self-healing to defaults if it is absent or stale.
    pub fn load(&mut self) -> DeviceConfig {
        let mut buf = [0u8; RECORD_SIZE];
        let reason = match self.storage.read(NAMESPACE, RECORD_KEY, &mut buf) {
            Ok(n) => match decode(&buf[..n]) {
                Ok(mut config) => {
                    if !config.registration_consistent() {
                        warn!("Config: registration flagged but incomplete, invalidating");
                        config.invalidate_registration();
                        if let Err(e) = self.save(&config) {
                            error!("Config: persisting repaired record failed: {}", e);
                        }
                    }
                    info!("Config: loaded (registered={})", config.registration_complete);
                    return config;
                }
                Err(reason) => reason,
            },
            Err(StorageError::NotFound) => "no stored record",
            Err(e) => {
                error!("Config: read failed: {}", e);
                "unreadable record"
            }
        };

        warn!("Config: {}, writing defaults", reason);
        let defaults = DeviceConfig::default();
        if let Err(e) = self.save(&defaults) {
            error!("Config: persisting defaults failed: {}", e);
        }
        defaults
    }

    /// Write the full record with the current marker.
    pub fn save(&mut self, config: &DeviceConfig) -> Result<(), StorageError> {
        let record = encode(config)?;
        self.storage.write(NAMESPACE, RECORD_KEY, &record)
    }

    /// Replace the stored record with defaults.  Returns the fresh record.
    pub fn clear(&mut self) -> Result<DeviceConfig, StorageError> {
        let fresh = DeviceConfig::default();
        self.save(&fresh)?;
        info!("Config: cleared");
        Ok(fresh)
    }
}

fn encode(config: &DeviceConfig) -> Result<[u8; RECORD_SIZE], StorageError> {
    let mut record = [0u8; RECORD_SIZE];
    record[..MARKER_SIZE].copy_from_slice(&CONFIG_MAGIC.to_le_bytes());
    postcard::to_slice(config, &mut record[MARKER_SIZE..]).map_err(|_| StorageError::Encoding)?;
    Ok(record)
}

fn decode(record: &[u8]) -> Result<DeviceConfig, &'static str> {
    if record.len() < MARKER_SIZE {
        return Err("short record");
    }
    let (marker, body) = record.split_at(MARKER_SIZE);
    if marker != CONFIG_MAGIC.to_le_bytes().as_slice() {
        return Err("schema marker mismatch");
    }
    postcard::from_bytes(body).map_err(|_| "undecodable record body")
}
