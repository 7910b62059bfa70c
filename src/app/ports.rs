//! Port traits: the hexagonal boundary between the station core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ StationController / RationEngine (domain)
//! ```
//!
//! Driven adapters (UART, clocks, NVS, event sinks) implement these traits.
//! The domain consumes them via generics, so the state machine and the
//! allocation rules never touch a peripheral directly and run unchanged on
//! the host under test.
//!
//! ## Timing notes
//!
//! - [`SerialRx::read_byte`] is the **only** blocking call in the core and
//!   is driven from the dedicated receiver task.
//! - [`SerialTx::write_bytes`] is fire-and-forget: the controller never waits
//!   for the UART to drain.
//! - Two clocks exist on purpose: frame timing uses the monotonic clock,
//!   feeding windows use the wall clock which may be unset after boot.

use crate::config::SystemConfig;
use crate::ration::herd::CowRecord;
use crate::ration::settings::Settings;

// ───────────────────────────────────────────────────────────────
// Serial transport (half-duplex station bus)
// ───────────────────────────────────────────────────────────────

/// Receive half of the station bus.
pub trait SerialRx {
    /// Block until the next byte arrives.
    fn read_byte(&mut self) -> Result<u8, SerialError>;
}

/// Transmit half of the station bus.
pub trait SerialTx {
    /// Queue `bytes` for transmission without waiting for completion.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), SerialError>;
}

// ───────────────────────────────────────────────────────────────
// Clocks
// ───────────────────────────────────────────────────────────────

/// Milliseconds since boot.  Never goes backwards.
pub trait MonotonicClock {
    fn now_ms(&self) -> u64;
}

/// Calendar time used for feeding windows.
pub trait WallClock {
    /// Seconds since the Unix epoch, or [`WALL_CLOCK_UNSET`] before the
    /// clock has been synchronised.
    fn now_secs(&self) -> u64;
}

/// Sentinel returned by [`WallClock::now_secs`] before time sync.
pub const WALL_CLOCK_UNSET: u64 = 0;

// ───────────────────────────────────────────────────────────────
// Event sink (domain → logging / web log page)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`StationEvent`](super::events::StationEvent)s
/// through this port instead of failing.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::StationEvent);
}

// ───────────────────────────────────────────────────────────────
// Ration decision port (controller → allocation engine)
// ───────────────────────────────────────────────────────────────

/// Synchronous dispense decision consumed by the station controller.
pub trait RationPort {
    fn allocate(
        &mut self,
        collar_tag: u16,
        station: u8,
    ) -> Result<crate::ration::Allocation, crate::error::AllocationError>;
}

// ───────────────────────────────────────────────────────────────
// Persistence
// ───────────────────────────────────────────────────────────────

/// Indexed persistence for the herd table.
///
/// Each call is assumed atomic.  The store never reorders records: index
/// `i` written by [`save`](CowStorePort::save) is returned at position `i`
/// by [`load_all`](CowStorePort::load_all).
pub trait CowStorePort {
    /// Load every readable record in index order.  Implementations that
    /// drop unreadable slots must compact the store so indices still match.
    fn load_all(&mut self) -> Result<Vec<CowRecord>, StorageError>;

    /// Write `record` at table position `index`.
    fn save(&mut self, record: &CowRecord, index: usize) -> Result<(), StorageError>;

    /// Set the number of live records; slots at or past `count` are dropped.
    fn resize(&mut self, count: usize) -> Result<(), StorageError>;
}

/// Persistence for the feeding schedule.
pub trait SettingsPort {
    /// Returns [`Settings::default()`] if nothing is stored yet.
    fn load_settings(&self) -> Result<Settings, StorageError>;

    fn save_settings(&mut self, settings: &Settings) -> Result<(), StorageError>;
}

/// Loads and persists system configuration.
///
/// Implementations MUST validate before persisting so a bad value pushed
/// from the management page can never brick the station timing.
pub trait ConfigPort {
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

/// Raw namespaced key-value storage (NVS on the device).
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from the serial ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    /// The driver reported a transient fault (framing, parity, overrun).
    Io,
    /// The transport is gone; the receiver loop should end.
    Closed,
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`], [`CowStorePort`] and [`SettingsPort`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// A stored blob could not be decoded with the current schema.
    Corrupted,
}

impl core::fmt::Display for SerialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io => write!(f, "UART I/O error"),
            Self::Closed => write!(f, "transport closed"),
        }
    }
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "blob corrupted"),
        }
    }
}
