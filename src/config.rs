//! System configuration parameters
//!
//! Bus timing and station layout for the feed station controller.
//! Values can be overridden via NVS; the defaults are the timings the
//! station hardware expects and should only change with the hardware.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;

/// Highest number of stations a single controller can address.
/// The presence query encodes the station as `'@' + index`, and the
/// station firmware answers to `'@'..='C'`.
pub const MAX_STATIONS: usize = 4;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Stations ---
    /// Number of stations polled round-robin (1..=MAX_STATIONS)
    pub station_count: u8,
    /// Minimum time between two dispenses at the same station (milliseconds)
    pub min_dispense_interval_ms: u32,

    // --- Receiver ---
    /// Maximum age of an ack frame for its tag digits to be accepted (milliseconds)
    pub inter_byte_timeout_ms: u32,

    // --- Frame timeouts (milliseconds to wait after sending) ---
    pub group_query_1_timeout_ms: u32,
    pub group_query_2_timeout_ms: u32,
    pub presence_timeout_ms: u32,
    pub feed_timeout_ms: u32,
    pub terminator_timeout_ms: u32,

    // --- UART ---
    /// Station bus baud rate (7 data bits, even parity, 1 stop bit)
    pub uart_baud: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Stations
            station_count: MAX_STATIONS as u8,
            min_dispense_interval_ms: 10 * 60 * 1000, // 10 min

            // Receiver
            inter_byte_timeout_ms: 8,

            // Frame timeouts
            group_query_1_timeout_ms: 60,
            group_query_2_timeout_ms: 60,
            presence_timeout_ms: 80,
            feed_timeout_ms: 60,
            terminator_timeout_ms: 70,

            // UART
            uart_baud: 1200,
        }
    }
}

impl SystemConfig {
    /// Range-check every field.  Called before anything is persisted.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_STATIONS as u8).contains(&self.station_count) {
            return Err(ConfigError::ValidationFailed("station_count must be 1–4"));
        }
        if !(1..=100).contains(&self.inter_byte_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "inter_byte_timeout_ms must be 1–100",
            ));
        }
        for timeout in [
            self.group_query_1_timeout_ms,
            self.group_query_2_timeout_ms,
            self.presence_timeout_ms,
            self.feed_timeout_ms,
            self.terminator_timeout_ms,
        ] {
            if !(10..=1000).contains(&timeout) {
                return Err(ConfigError::ValidationFailed(
                    "frame timeouts must be 10–1000 ms",
                ));
            }
        }
        if self.min_dispense_interval_ms > 24 * 60 * 60 * 1000 {
            return Err(ConfigError::ValidationFailed(
                "min_dispense_interval_ms must be at most one day",
            ));
        }
        if !(300..=115_200).contains(&self.uart_baud) {
            return Err(ConfigError::ValidationFailed("uart_baud must be 300–115200"));
        }
        Ok(())
    }

    /// Duration of one full round over a single station when nobody eats.
    pub fn idle_round_ms(&self) -> u32 {
        self.group_query_1_timeout_ms
            + self.group_query_2_timeout_ms
            + self.presence_timeout_ms
            + self.terminator_timeout_ms
    }
}
