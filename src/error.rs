//! Unified error types for the feed station firmware.
//!
//! Each subsystem has its own small `Copy` enum; all of them convert into the
//! top-level [`Error`] so the bootstrap code in `main` can use `?` uniformly.
//! None of these are fatal to the control loop: the station cycle logs them
//! through the event sink and keeps running.

use core::fmt;

use crate::app::ports::{ConfigError, SerialError, StorageError};

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Ration allocation refused a dispense decision.
    Allocation(AllocationError),
    /// A herd table operation failed.
    Herd(HerdError),
    /// Feeding schedule settings were rejected.
    Settings(SettingsError),
    /// Key/value persistence failed.
    Storage(StorageError),
    /// System configuration could not be loaded or saved.
    Config(ConfigError),
    /// The serial transport failed.
    Serial(SerialError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Allocation(e) => write!(f, "allocation: {e}"),
            Self::Herd(e) => write!(f, "herd: {e}"),
            Self::Settings(e) => write!(f, "settings: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Serial(e) => write!(f, "serial: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Allocation errors
// ---------------------------------------------------------------------------

/// Reasons the ration engine declines to decide.
///
/// The station hardware tooling historically reported these as negative
/// amounts; [`AllocationError::code`] keeps that mapping available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationError {
    /// No cow record carries the presented collar tag.
    UnknownTag,
    /// The wall clock has not been synchronised yet.
    ClockNotSet,
    /// The reset schedule produced an inconsistent feeding window.
    InvalidWindow,
}

impl AllocationError {
    /// Legacy numeric code: `-1` unknown tag, `-2` clock or window problem.
    pub const fn code(self) -> i8 {
        match self {
            Self::UnknownTag => -1,
            Self::ClockNotSet | Self::InvalidWindow => -2,
        }
    }
}

impl fmt::Display for AllocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTag => write!(f, "no cow with this collar tag"),
            Self::ClockNotSet => write!(f, "wall clock not set"),
            Self::InvalidWindow => write!(f, "invalid feeding window"),
        }
    }
}

impl From<AllocationError> for Error {
    fn from(e: AllocationError) -> Self {
        Self::Allocation(e)
    }
}

// ---------------------------------------------------------------------------
// Herd errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HerdError {
    /// The herd table already holds `MAX_COWS` records.
    Full,
    /// No record with the requested name exists.
    NotFound,
    /// A field failed validation; the string names the field.
    Invalid(&'static str),
    /// The JSON form could not be parsed.
    Malformed,
    /// Another record already uses this collar tag.
    DuplicateCollar(u16),
    /// The record was accepted but could not be persisted.
    Storage(StorageError),
}

impl fmt::Display for HerdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "herd table full"),
            Self::NotFound => write!(f, "cow not found"),
            Self::Invalid(msg) => write!(f, "invalid record: {msg}"),
            Self::Malformed => write!(f, "malformed cow json"),
            Self::DuplicateCollar(tag) => write!(f, "collar tag {tag} already assigned"),
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl From<HerdError> for Error {
    fn from(e: HerdError) -> Self {
        Self::Herd(e)
    }
}

impl From<StorageError> for HerdError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Settings errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsError {
    /// The JSON body could not be parsed.
    Malformed,
    /// A field failed range validation.
    ValidationFailed(&'static str),
    /// Settings were valid but could not be persisted.
    Storage(StorageError),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed settings json"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
        }
    }
}

impl From<SettingsError> for Error {
    fn from(e: SettingsError) -> Self {
        Self::Settings(e)
    }
}

impl From<StorageError> for SettingsError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Port error conversions
// ---------------------------------------------------------------------------

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<SerialError> for Error {
    fn from(e: SerialError) -> Self {
        Self::Serial(e)
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
