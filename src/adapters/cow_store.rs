//! Herd table persistence on top of any [`StoragePort`].
//!
//! Layout in the `herd` namespace:
//!
//! ```text
//!  count      u16 little-endian, number of live slots
//!  c0 .. cN   [RECORD_VERSION] ++ postcard(CowRecord)
//!  settings   [SETTINGS_VERSION] ++ postcard(Settings)
//! ```
//!
//! Slot `i` always holds table position `i`.  Unreadable slots found at
//! load time are dropped and the table is compacted in place.

use log::{info, warn};

use crate::app::ports::{CowStorePort, SettingsPort, StorageError, StoragePort};
use crate::ration::herd::CowRecord;
use crate::ration::settings::Settings;

use super::nvs::MAX_BLOB_SIZE;

const HERD_NAMESPACE: &str = "herd";
const COUNT_KEY: &str = "count";
const SETTINGS_KEY: &str = "settings";

/// Schema version prefixed to every cow blob.
pub const RECORD_VERSION: u8 = 1;
/// Schema version prefixed to the settings blob.
pub const SETTINGS_VERSION: u8 = 1;

/// [`CowStorePort`] and [`SettingsPort`] over a key-value store.
pub struct KvCowStore<T> {
    kv: T,
}

impl<T: StoragePort> KvCowStore<T> {
    pub fn new(kv: T) -> Self {
        Self { kv }
    }

    fn slot_key(index: usize) -> String {
        format!("c{}", index)
    }

    fn count(&self) -> Result<usize, StorageError> {
        let mut buf = [0u8; 2];
        match self.kv.read(HERD_NAMESPACE, COUNT_KEY, &mut buf) {
            Ok(2) => Ok(usize::from(u16::from_le_bytes(buf))),
            Ok(_) => Err(StorageError::Corrupted),
            Err(StorageError::NotFound) => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write_count(&mut self, count: usize) -> Result<(), StorageError> {
        let count = u16::try_from(count).map_err(|_| StorageError::Full)?;
        self.kv
            .write(HERD_NAMESPACE, COUNT_KEY, &count.to_le_bytes())
    }

    fn read_slot(&self, index: usize) -> Result<CowRecord, StorageError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        let len = self.kv.read(HERD_NAMESPACE, &Self::slot_key(index), &mut buf)?;
        decode_record(&buf[..len])
    }

    /// Rewrite `records` into slots `0..len` and shrink the table to match.
    fn compact(&mut self, records: &[CowRecord], old_count: usize) -> Result<(), StorageError> {
        for (index, record) in records.iter().enumerate() {
            self.save(record, index)?;
        }
        self.truncate(records.len(), old_count)
    }

    fn truncate(&mut self, count: usize, old_count: usize) -> Result<(), StorageError> {
        self.write_count(count)?;
        for index in count..old_count {
            self.kv.delete(HERD_NAMESPACE, &Self::slot_key(index))?;
        }
        Ok(())
    }
}

/// Decode one versioned cow blob.
pub fn decode_record(blob: &[u8]) -> Result<CowRecord, StorageError> {
    match blob.split_first() {
        Some((&RECORD_VERSION, body)) => {
            postcard::from_bytes(body).map_err(|_| StorageError::Corrupted)
        }
        _ => Err(StorageError::Corrupted),
    }
}

/// Encode one cow as a versioned blob.
pub fn encode_record(record: &CowRecord) -> Result<Vec<u8>, StorageError> {
    let mut blob = vec![RECORD_VERSION];
    let body = postcard::to_allocvec(record).map_err(|_| StorageError::Corrupted)?;
    blob.extend_from_slice(&body);
    Ok(blob)
}

impl<T: StoragePort> CowStorePort for KvCowStore<T> {
    fn load_all(&mut self) -> Result<Vec<CowRecord>, StorageError> {
        let count = self.count()?;
        let mut records = Vec::with_capacity(count);
        for index in 0..count {
            match self.read_slot(index) {
                Ok(record) => records.push(record),
                Err(e) => warn!("KvCowStore: slot {} unreadable ({}), dropping", index, e),
            }
        }
        if records.len() != count {
            warn!(
                "KvCowStore: {} of {} slots dropped, compacting",
                count - records.len(),
                count
            );
            self.compact(&records, count)?;
        }
        info!("KvCowStore: loaded {} cows", records.len());
        Ok(records)
    }

    fn save(&mut self, record: &CowRecord, index: usize) -> Result<(), StorageError> {
        let blob = encode_record(record)?;
        self.kv.write(HERD_NAMESPACE, &Self::slot_key(index), &blob)
    }

    fn resize(&mut self, count: usize) -> Result<(), StorageError> {
        let old_count = self.count().unwrap_or(0);
        self.truncate(count, old_count)
    }
}

impl<T: StoragePort> SettingsPort for KvCowStore<T> {
    fn load_settings(&self) -> Result<Settings, StorageError> {
        let mut buf = [0u8; 64];
        match self.kv.read(HERD_NAMESPACE, SETTINGS_KEY, &mut buf) {
            Ok(len) => match buf[..len].split_first() {
                Some((&SETTINGS_VERSION, body)) => {
                    postcard::from_bytes(body).map_err(|_| StorageError::Corrupted)
                }
                _ => Err(StorageError::Corrupted),
            },
            Err(StorageError::NotFound) => Ok(Settings::default()),
            Err(e) => Err(e),
        }
    }

    fn save_settings(&mut self, settings: &Settings) -> Result<(), StorageError> {
        let mut blob = vec![SETTINGS_VERSION];
        let body = postcard::to_allocvec(settings).map_err(|_| StorageError::Corrupted)?;
        blob.extend_from_slice(&body);
        self.kv.write(HERD_NAMESPACE, SETTINGS_KEY, &blob)
    }
}
