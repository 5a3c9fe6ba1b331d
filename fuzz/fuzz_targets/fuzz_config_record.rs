//! Fuzz target: `ConfigStore::load`
//!
//! Feeds arbitrary blobs in as the stored record.  Loading must never
//! panic, and whatever it returns must survive a save/load cycle.
//!
//! cargo fuzz run fuzz_config_record

#![no_main]

use std::collections::HashMap;

use airnode::app::ports::{StorageError, StoragePort};
use airnode::config_store::{ConfigStore, NAMESPACE, RECORD_KEY};
use libfuzzer_sys::fuzz_target;

#[derive(Default)]
struct Blob(HashMap<String, Vec<u8>>);

impl StoragePort for Blob {
    fn read(&self, ns: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let v = self.0.get(&format!("{ns}/{key}")).ok_or(StorageError::NotFound)?;
        let n = v.len().min(buf.len());
        buf[..n].copy_from_slice(&v[..n]);
        Ok(n)
    }

    fn write(&mut self, ns: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.0.insert(format!("{ns}/{key}"), data.to_vec());
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let mut blob = Blob::default();
    blob.0.insert(format!("{NAMESPACE}/{RECORD_KEY}"), data.to_vec());

    let mut store = ConfigStore::new(blob);
    let config = store.load();

    if store.save(&config).is_ok() {
        assert_eq!(store.load(), config);
    }
});
