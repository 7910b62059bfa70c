//! Per-station bookkeeping owned by the station controller.
//!
//! One [`StationState`] per bay, indexed by station id.  Only the
//! controller touches these, and only while it is working on that
//! station's slot of the cycle.

use crate::config::MAX_STATIONS;

/// What the controller remembers about one station between rounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StationState {
    /// Monotonic ms of the last committed dispense, `None` if never fed.
    pub last_feed_time: Option<u64>,
    /// Collar seen by the latest successful presence check, 0 otherwise.
    pub currently_present_tag: u16,
}

impl StationState {
    /// Whether more than `min_interval_ms` passed since the last dispense.
    pub fn interval_elapsed(&self, now_ms: u64, min_interval_ms: u32) -> bool {
        self.last_feed_time
            .is_none_or(|t| now_ms.saturating_sub(t) > u64::from(min_interval_ms))
    }

    /// Record a dispense committed at `at_ms`.  Never moves backwards.
    pub fn commit_feed(&mut self, at_ms: u64) {
        self.last_feed_time = Some(self.last_feed_time.map_or(at_ms, |t| t.max(at_ms)));
    }

    pub fn mark_present(&mut self, tag: u16) {
        self.currently_present_tag = tag;
    }

    pub fn clear_present(&mut self) {
        self.currently_present_tag = 0;
    }
}

/// Fixed table of every addressable station.
pub type StationTable = [StationState; MAX_STATIONS];
