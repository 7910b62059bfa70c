//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`] and [`StoragePort`] for the feed station.
//!
//! - On ESP32 every call opens the namespace, performs one get/set/erase
//!   plus a commit, and closes it again; NVS commits are atomic per key.
//! - Off-target a `HashMap` keyed by `namespace::key` stands in for flash
//!   so the herd store and the bootstrap path run under `cargo test`.
//!
//! Keys and namespaces are limited to 15 bytes by NVS.

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::SystemConfig;
use log::{info, warn};

#[cfg(not(target_os = "espidf"))]
use std::{cell::RefCell, collections::HashMap};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "feedstn";
const CONFIG_KEY: &str = "syscfg";

/// Upper bound for any single blob this firmware stores.
pub const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    sim: RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// A partition with no free pages or from a newer IDF version is erased
    /// and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: partition unusable ({}), erasing", ret);
                rc(unsafe { nvs_flash_erase() }).map_err(|_| ConfigError::IoError)?;
                rc(unsafe { nvs_flash_init() }).map_err(|_| ConfigError::IoError)?;
            } else {
                rc(ret).map_err(|_| ConfigError::IoError)?;
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            sim: RefCell::new(HashMap::new()),
        })
    }

    /// Store `data` under `namespace`/`key` and commit.
    fn put(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.sim
                .borrow_mut()
                .insert(sim_key(namespace, key), data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = c_name(key);
            with_handle(namespace, nvs_open_mode_t_NVS_READWRITE, |handle| {
                // SAFETY: `key` is NUL-terminated and `data` outlives the call.
                rc(unsafe {
                    nvs_set_blob(handle, key.as_ptr().cast(), data.as_ptr().cast(), data.len())
                })?;
                rc(unsafe { nvs_commit(handle) })
            })
            .map_err(storage_error)
        }
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let mut buf = [0u8; MAX_BLOB_SIZE];
        match self.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => {
                let cfg: SystemConfig =
                    postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
                cfg.validate()?;
                info!("NvsAdapter: loaded config ({} bytes)", len);
                Ok(cfg)
            }
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
            Err(_) => Err(ConfigError::IoError),
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.put(CONFIG_NAMESPACE, CONFIG_KEY, &bytes).map_err(|e| {
            warn!("NvsAdapter: config write failed ({})", e);
            ConfigError::IoError
        })?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            match self.sim.borrow().get(&sim_key(namespace, key)) {
                Some(data) if data.len() > buf.len() => Err(StorageError::Full),
                Some(data) => {
                    buf[..data.len()].copy_from_slice(data);
                    Ok(data.len())
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let key = c_name(key);
            with_handle(namespace, nvs_open_mode_t_NVS_READONLY, |handle| {
                let mut size = buf.len();
                // SAFETY: `size` is the capacity of `buf`; NVS writes at most that.
                rc(unsafe {
                    nvs_get_blob(handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
                })?;
                Ok(size)
            })
            .map_err(storage_error)
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.put(namespace, key, data)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            self.sim.borrow_mut().remove(&sim_key(namespace, key));
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let key = c_name(key);
            with_handle(namespace, nvs_open_mode_t_NVS_READWRITE, |handle| {
                let ret = unsafe { nvs_erase_key(handle, key.as_ptr().cast()) };
                if ret != ESP_ERR_NVS_NOT_FOUND {
                    rc(ret)?;
                }
                rc(unsafe { nvs_commit(handle) })
            })
            .map_err(storage_error)
        }
    }
}

// ── Backend helpers ───────────────────────────────────────────

#[cfg(not(target_os = "espidf"))]
fn sim_key(namespace: &str, key: &str) -> String {
    format!("{}::{}", namespace, key)
}

#[cfg(target_os = "espidf")]
fn rc(ret: esp_err_t) -> Result<(), esp_err_t> {
    if ret == ESP_OK { Ok(()) } else { Err(ret) }
}

#[cfg(target_os = "espidf")]
fn storage_error(ret: esp_err_t) -> StorageError {
    if ret == ESP_ERR_NVS_NOT_FOUND {
        StorageError::NotFound
    } else if ret == ESP_ERR_NVS_INVALID_LENGTH || ret == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
        StorageError::Full
    } else {
        warn!("NVS: error {}", ret);
        StorageError::IoError
    }
}

/// NUL-terminated copy of an NVS name, cut to 15 bytes.
#[cfg(target_os = "espidf")]
fn c_name(name: &str) -> [u8; 16] {
    let mut buf = [0u8; 16];
    let len = name.len().min(15);
    buf[..len].copy_from_slice(&name.as_bytes()[..len]);
    buf
}

/// Open `namespace`, run `f` with the handle, close it again.
#[cfg(target_os = "espidf")]
fn with_handle<T>(
    namespace: &str,
    mode: nvs_open_mode_t,
    f: impl FnOnce(nvs_handle_t) -> Result<T, esp_err_t>,
) -> Result<T, esp_err_t> {
    let ns = c_name(namespace);
    let mut handle: nvs_handle_t = 0;
    // SAFETY: `ns` is NUL-terminated and `handle` is a valid out-pointer.
    rc(unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) })?;
    let result = f(handle);
    // SAFETY: opened above and closed exactly once.
    unsafe { nvs_close(handle) };
    result
}
