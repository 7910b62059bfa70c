//! Feeding window arithmetic.
//!
//! The day is cut into windows by the reset offsets.  With offsets
//! `[6, 18]`:
//!
//! ```text
//!  00      06                  18                  24
//!  ├───────┼───────────────────┼───────────────────┤
//!  ··· B ──┤         A         │         B      ···
//! ```
//!
//! Hours before the first offset still belong to the window the last
//! offset opened on the previous day.  Within a window the allowance
//! unlocks step-wise: one ration at the start, another every
//! `length / rations_per_window` hours.
//!
//! All instants are local wall-clock time as delivered by the
//! [`WallClock`](crate::app::ports::WallClock) adapter.

use chrono::{DateTime, NaiveTime, Timelike};

use super::settings::Settings;
use crate::error::AllocationError;

/// The window containing a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedingWindow {
    /// Window start, minutes since the Unix epoch.
    pub start_minute: u32,
    /// Window length in whole hours (1..=24).
    pub length_hours: u8,
}

impl FeedingWindow {
    /// Window containing `now_secs`.
    pub fn containing(settings: &Settings, now_secs: u64) -> Result<Self, AllocationError> {
        let offsets = settings.reset_offsets.as_slice();
        let last = offsets.len().checked_sub(1).ok_or(AllocationError::InvalidWindow)?;

        let secs = i64::try_from(now_secs).map_err(|_| AllocationError::InvalidWindow)?;
        let now = DateTime::from_timestamp(secs, 0)
            .ok_or(AllocationError::InvalidWindow)?
            .naive_utc();
        let hour = now.hour();

        let (index, date) = match offsets.iter().rposition(|&o| u32::from(o) <= hour) {
            Some(i) => (i, now.date()),
            None => (
                last,
                now.date().pred_opt().ok_or(AllocationError::InvalidWindow)?,
            ),
        };

        let start_hour = offsets[index];
        let end_hour = offsets[(index + 1) % offsets.len()];
        let mut length = i16::from(end_hour) - i16::from(start_hour);
        if length <= 0 {
            length += 24;
        }

        let start = date.and_time(
            NaiveTime::from_hms_opt(u32::from(start_hour), 0, 0)
                .ok_or(AllocationError::InvalidWindow)?,
        );
        let start_minute = u32::try_from(start.and_utc().timestamp() / 60)
            .map_err(|_| AllocationError::InvalidWindow)?;

        Ok(Self {
            start_minute,
            length_hours: length as u8,
        })
    }

    /// Rations unlocked so far in this window at `now_minute`.
    pub fn expected_feeds(
        &self,
        now_minute: u32,
        rations_per_window: u8,
    ) -> Result<u32, AllocationError> {
        if rations_per_window == 0 || now_minute < self.start_minute {
            return Err(AllocationError::InvalidWindow);
        }
        // floor(minutes_in / (window_minutes / rations)), in integers.
        let minutes_in = u64::from(now_minute - self.start_minute);
        let window_minutes = u64::from(self.length_hours) * 60;
        if window_minutes == 0 {
            return Err(AllocationError::InvalidWindow);
        }
        let unlocked = minutes_in * u64::from(rations_per_window) / window_minutes;
        u32::try_from(unlocked + 1).map_err(|_| AllocationError::InvalidWindow)
    }
}
