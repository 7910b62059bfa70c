//! Feeding schedule: when the day's windows open and how many rations each
//! window is split into.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::error::SettingsError;

/// Most reset offsets a day can be divided by.
pub const MAX_RESETS: usize = 4;

/// Upper bound on rations per window; one ration per half hour.
pub const MAX_RATIONS_PER_WINDOW: u8 = 48;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Hours of the day (0–23, ascending) at which a new window opens.
    pub reset_offsets: Vec<u8, MAX_RESETS>,
    /// Rations each window's allowance is split into.
    pub rations_per_window: u8,
}

impl Default for Settings {
    fn default() -> Self {
        let mut reset_offsets = Vec::new();
        let _ = reset_offsets.push(0);
        Self {
            reset_offsets,
            rations_per_window: 4,
        }
    }
}

impl Settings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.reset_offsets.is_empty() {
            return Err(SettingsError::ValidationFailed(
                "reset_offsets must not be empty",
            ));
        }
        if self.reset_offsets.iter().any(|&h| h > 23) {
            return Err(SettingsError::ValidationFailed(
                "reset_offsets must be hours 0–23",
            ));
        }
        if self.reset_offsets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(SettingsError::ValidationFailed(
                "reset_offsets must be strictly ascending",
            ));
        }
        if !(1..=MAX_RATIONS_PER_WINDOW).contains(&self.rations_per_window) {
            return Err(SettingsError::ValidationFailed(
                "rations_per_window must be 1–48",
            ));
        }
        Ok(())
    }

    /// Parse and validate a settings body from the management page.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_json::from_str(json).map_err(|_| SettingsError::Malformed)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}
