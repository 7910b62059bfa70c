//! Feed station controller library.
//!
//! Exposes the station core (protocol, cycle controller, ration engine)
//! and its adapters for integration testing.  ESP-IDF-specific code is
//! guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod fsm;
pub mod protocol;
pub mod ration;

#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
mod pins;

pub use error::{Error, Result};
