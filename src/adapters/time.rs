//! ESP32 time adapter.
//!
//! Implements both clocks the station core needs:
//!
//! - [`MonotonicClock`]: milliseconds since boot, for frame timing.
//! - [`WallClock`]: local calendar time in seconds since the epoch, for
//!   feeding windows.  Reports [`WALL_CLOCK_UNSET`] until the RTC has been
//!   set (by SNTP or the management page).
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()` and
//!   `gettimeofday()`/`localtime_r()`, so the TZ configured in ESP-IDF
//!   applies.
//! - **`not(target_os = "espidf")`**: `std::time` for host-side
//!   simulation.

use crate::app::ports::{MonotonicClock, WALL_CLOCK_UNSET, WallClock};

/// Anything before 2020-01-01 is an RTC that was never set.
const EPOCH_2020: u64 = 1_577_836_800;

/// Time adapter for the ESP32-S3 platform.
#[derive(Clone, Copy)]
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot.
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot.
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Local time in seconds since the epoch, 0 if unsynchronised.
    #[cfg(target_os = "espidf")]
    fn local_secs(&self) -> u64 {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return WALL_CLOCK_UNSET;
        }
        let utc = tv.tv_sec as esp_idf_svc::sys::time_t;
        if (utc as u64) < EPOCH_2020 {
            return WALL_CLOCK_UNSET;
        }
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&utc, &mut tm) }.is_null() {
            return WALL_CLOCK_UNSET;
        }
        // Re-read the broken-down local time as if it were UTC.
        chrono::NaiveDate::from_ymd_opt(tm.tm_year + 1900, (tm.tm_mon + 1) as u32, tm.tm_mday as u32)
            .and_then(|d| d.and_hms_opt(tm.tm_hour as u32, tm.tm_min as u32, tm.tm_sec as u32))
            .map_or(WALL_CLOCK_UNSET, |local| local.and_utc().timestamp() as u64)
    }

    /// Host clock is treated as local time.
    #[cfg(not(target_os = "espidf"))]
    fn local_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .ok()
            .filter(|&s| s >= EPOCH_2020)
            .unwrap_or(WALL_CLOCK_UNSET)
    }
}

impl MonotonicClock for Esp32TimeAdapter {
    fn now_ms(&self) -> u64 {
        self.uptime_us() / 1000
    }
}

impl WallClock for Esp32TimeAdapter {
    fn now_secs(&self) -> u64 {
        self.local_secs()
    }
}
