//! Ration allocation engine.
//!
//! Owns the herd table, the feeding schedule and the recent-feeds index,
//! and answers one question for the station controller: *may this collar
//! eat now, and how much?*
//!
//! ```text
//!  collar tag ─▶ herd lookup ─▶ wall clock ─▶ feeding window
//!                                                  │
//!                       feeds since window start ◀─┘
//!                                  │
//!              fed < expected ─────┴───── fed ≥ expected
//!                    │                          │
//!          record feed, return kg            QuotaMet
//! ```
//!
//! Decisions are made entirely in memory.  Records touched by a dispense
//! are marked dirty and written back by [`RationEngine::flush_pending`],
//! which the firmware calls after every controller step, so the serial
//! timing never waits on flash.

pub mod herd;
pub mod management;
pub mod recent;
pub mod settings;
pub mod window;

use std::collections::BTreeSet;

use log::{debug, warn};

use crate::app::ports::{CowStorePort, RationPort, SettingsPort, WALL_CLOCK_UNSET, WallClock};
use crate::error::AllocationError;
use herd::{FeedEntry, Herd};
use recent::RecentFeeds;
use settings::Settings;
use window::FeedingWindow;

/// Outcome of a successful allocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Allocation {
    /// Dispense this many kilograms now.
    Dispense { kg: f32 },
    /// The cow has eaten everything unlocked in the current window.
    QuotaMet,
}

impl Allocation {
    /// Amount to dispense; zero when the quota is met.
    pub fn kg(self) -> f32 {
        match self {
            Self::Dispense { kg } => kg,
            Self::QuotaMet => 0.0,
        }
    }
}

/// Allocation engine over a herd store `S` and a wall clock `W`.
pub struct RationEngine<S, W> {
    herd: Herd,
    settings: Settings,
    recent: RecentFeeds,
    store: S,
    clock: W,
    /// Herd slots changed in memory but not yet written.
    dirty: BTreeSet<usize>,
}

impl<S, W> RationEngine<S, W>
where
    S: CowStorePort + SettingsPort,
    W: WallClock,
{
    /// Load herd and settings from `store`.
    ///
    /// Unreadable data is replaced by an empty herd or default settings.
    /// Records that fail validation are dropped and the cleaned table is
    /// written back.
    pub fn load(mut store: S, clock: W) -> Self {
        let records = store.load_all().unwrap_or_else(|e| {
            warn!("RationEngine: herd load failed ({}), starting empty", e);
            Vec::new()
        });
        let (herd, dropped) = Herd::from_records(records);

        let settings = match store.load_settings() {
            Ok(s) if s.validate().is_ok() => s,
            Ok(_) => {
                warn!("RationEngine: stored settings invalid, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!("RationEngine: settings load failed ({}), using defaults", e);
                Settings::default()
            }
        };

        let recent = RecentFeeds::rebuild(&herd);
        let mut engine = Self {
            herd,
            settings,
            recent,
            store,
            clock,
            dirty: BTreeSet::new(),
        };

        if dropped > 0 {
            warn!("RationEngine: dropped {} invalid cow records", dropped);
            engine.dirty.extend(0..engine.herd.len());
            if let Err(e) = engine.store.resize(engine.herd.len()) {
                warn!("RationEngine: resize after sanitize failed: {}", e);
            }
        }
        debug!(
            "RationEngine: {} cows, offsets {:?}, {} rations/window",
            engine.herd.len(),
            engine.settings.reset_offsets.as_slice(),
            engine.settings.rations_per_window
        );
        engine
    }

    /// Write back every record changed since the last flush.
    ///
    /// Failed writes stay pending and are retried on the next call.
    /// Returns the number of records written.
    pub fn flush_pending(&mut self) -> usize {
        let mut written = 0;
        let pending: Vec<usize> = self.dirty.iter().copied().collect();
        for index in pending {
            let Some(record) = self.herd.at(index) else {
                self.dirty.remove(&index);
                continue;
            };
            match self.store.save(record, index) {
                Ok(()) => {
                    self.dirty.remove(&index);
                    written += 1;
                }
                Err(e) => warn!("RationEngine: save of slot {} failed: {}", index, e),
            }
        }
        written
    }

    /// Whether any record is waiting to be written.
    pub fn has_pending(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn herd(&self) -> &Herd {
        &self.herd
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl<S, W> RationPort for RationEngine<S, W>
where
    S: CowStorePort + SettingsPort,
    W: WallClock,
{
    fn allocate(&mut self, collar_tag: u16, station: u8) -> Result<Allocation, AllocationError> {
        let (index, cow) = self
            .herd
            .by_collar_mut(collar_tag)
            .ok_or(AllocationError::UnknownTag)?;

        let now_secs = self.clock.now_secs();
        if now_secs == WALL_CLOCK_UNSET {
            return Err(AllocationError::ClockNotSet);
        }

        let window = FeedingWindow::containing(&self.settings, now_secs)?;
        let now_minute = u32::try_from(now_secs / 60).map_err(|_| AllocationError::InvalidWindow)?;
        let rations = self.settings.rations_per_window;
        let expected = window.expected_feeds(now_minute, rations)?;
        let fed = cow.feed_history.count_since(window.start_minute);

        if fed >= expected {
            debug!(
                "allocate: {} fed {}/{} this window",
                cow.name.as_str(),
                fed,
                expected
            );
            return Ok(Allocation::QuotaMet);
        }

        let entry = FeedEntry {
            station,
            timestamp: now_minute,
        };
        cow.feed_history.push(entry);
        let kg = cow.ration_kg / f32::from(rations);
        self.recent.record(&cow.name, entry);
        self.dirty.insert(index);

        debug!(
            "allocate: {} feed {}/{} at station {}, {:.2} kg",
            cow.name.as_str(),
            fed + 1,
            expected,
            station,
            kg
        );
        Ok(Allocation::Dispense { kg })
    }
}
