//! Cow records and the in-memory herd table.
//!
//! The table mirrors the persisted layout one-to-one: record `i` here is
//! slot `i` in the store.  Records are created on first write of a name,
//! updated in place, and removed by swapping the last record into the hole.

use heapless::{Deque, String};
use serde::{Deserialize, Serialize};

use crate::error::HerdError;

/// Capacity of the herd table.
pub const MAX_COWS: usize = 100;

/// Longest cow name in bytes.
pub const MAX_NAME_LEN: usize = 32;

/// Ear tags are exactly this many ASCII digits.
pub const EAR_TAG_LEN: usize = 12;

/// Feeds remembered per cow.
pub const FEED_HISTORY_LEN: usize = 32;

/// Highest collar tag the three-digit ack frame can carry.
pub const MAX_COLLAR_TAG: u16 = 999;

/// One dispensed ration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub station: u8,
    /// Minutes since the Unix epoch.
    pub timestamp: u32,
}

// ---------------------------------------------------------------------------
// Feed history
// ---------------------------------------------------------------------------

/// Chronological ring of the latest feeds of one cow.
///
/// Serialised oldest-first as a plain sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(
    from = "heapless::Vec<FeedEntry, FEED_HISTORY_LEN>",
    into = "heapless::Vec<FeedEntry, FEED_HISTORY_LEN>"
)]
pub struct FeedHistory {
    entries: Deque<FeedEntry, FEED_HISTORY_LEN>,
}

impl FeedHistory {
    pub const fn new() -> Self {
        Self {
            entries: Deque::new(),
        }
    }

    /// Append a feed, evicting and returning the oldest when full.
    pub fn push(&mut self, entry: FeedEntry) -> Option<FeedEntry> {
        let evicted = if self.entries.is_full() {
            self.entries.pop_front()
        } else {
            None
        };
        let _ = self.entries.push_back(entry);
        evicted
    }

    /// Feeds at or after `since_minute`, scanning back from the newest and
    /// stopping at the first older entry.
    pub fn count_since(&self, since_minute: u32) -> u32 {
        self.newest_first()
            .take_while(|e| e.timestamp >= since_minute)
            .count() as u32
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &FeedEntry> {
        self.entries.iter().rev()
    }

    pub fn oldest_first(&self) -> impl Iterator<Item = &FeedEntry> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&FeedEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FeedHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for FeedHistory {
    fn eq(&self, other: &Self) -> bool {
        self.oldest_first().eq(other.oldest_first())
    }
}

impl From<heapless::Vec<FeedEntry, FEED_HISTORY_LEN>> for FeedHistory {
    fn from(entries: heapless::Vec<FeedEntry, FEED_HISTORY_LEN>) -> Self {
        let mut history = Self::new();
        for entry in entries {
            history.push(entry);
        }
        history
    }
}

impl From<FeedHistory> for heapless::Vec<FeedEntry, FEED_HISTORY_LEN> {
    fn from(history: FeedHistory) -> Self {
        history.oldest_first().copied().collect()
    }
}

// ---------------------------------------------------------------------------
// Cow record
// ---------------------------------------------------------------------------

/// Everything the station knows about one animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CowRecord {
    pub name: String<MAX_NAME_LEN>,
    pub ear_tag: String<EAR_TAG_LEN>,
    pub collar_tag: u16,
    /// Daily concentrate allowance, split evenly over the window's rations.
    pub ration_kg: f32,
    /// Calving date, seconds since the Unix epoch.
    pub calving_day: i64,
    #[serde(default)]
    pub feed_history: FeedHistory,
}

impl CowRecord {
    /// Field checks applied before a record enters the table.
    pub fn validate(&self) -> Result<(), HerdError> {
        if self.name.is_empty() {
            return Err(HerdError::Invalid("name must not be empty"));
        }
        if self.ear_tag.len() != EAR_TAG_LEN || !self.ear_tag.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(HerdError::Invalid("ear_tag must be 12 digits"));
        }
        if !(1..=MAX_COLLAR_TAG).contains(&self.collar_tag) {
            return Err(HerdError::Invalid("collar_tag must be 1–999"));
        }
        if !self.ration_kg.is_finite() || self.ration_kg <= 0.0 {
            return Err(HerdError::Invalid("ration_kg must be positive"));
        }
        if self.calving_day == 0 {
            return Err(HerdError::Invalid("calving_day must be set"));
        }
        Ok(())
    }

    /// Parse the management page's JSON form.
    ///
    /// The form never carries a feed history; see [`Herd::upsert`].
    pub fn from_json(json: &str) -> Result<Self, HerdError> {
        let form: CowForm = serde_json::from_str(json).map_err(|_| HerdError::Malformed)?;
        let record = Self {
            name: bounded(&form.name, "name longer than 32 bytes")?,
            ear_tag: bounded(&form.ear_tag, "ear_tag must be 12 digits")?,
            collar_tag: u16::try_from(form.collar_tag)
                .map_err(|_| HerdError::Invalid("collar_tag must be 1–999"))?,
            ration_kg: form.ration_kg,
            calving_day: form.calving_day,
            feed_history: FeedHistory::new(),
        };
        record.validate()?;
        Ok(record)
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CowForm {
    name: std::string::String,
    ear_tag: std::string::String,
    collar_tag: u32,
    ration_kg: f32,
    calving_day: i64,
}

fn bounded<const N: usize>(s: &str, msg: &'static str) -> Result<String<N>, HerdError> {
    String::try_from(s).map_err(|()| HerdError::Invalid(msg))
}

// ---------------------------------------------------------------------------
// Herd table
// ---------------------------------------------------------------------------

/// Outcome of [`Herd::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Removed {
    /// Slot that was vacated.
    pub index: usize,
    /// Whether the former last record now lives at `index`.
    pub moved_last: bool,
}

/// Capacity-bounded table of cow records.
#[derive(Debug, Default)]
pub struct Herd {
    cows: Vec<CowRecord>,
}

impl Herd {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from stored records, dropping any that fail
    /// validation, reuse a name or collar tag already loaded, or exceed
    /// capacity.
    /// Returns the table and the number of dropped records.
    pub fn from_records(records: Vec<CowRecord>) -> (Self, usize) {
        let total = records.len();
        let mut herd = Self::new();
        for record in records {
            if herd.cows.len() == MAX_COWS
                || record.validate().is_err()
                || herd.position(&record.name).is_some()
                || herd.cows.iter().any(|c| c.collar_tag == record.collar_tag)
            {
                continue;
            }
            herd.cows.push(record);
        }
        let dropped = total - herd.cows.len();
        (herd, dropped)
    }

    pub fn len(&self) -> usize {
        self.cows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CowRecord> {
        self.cows.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cows.iter().map(|c| c.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.cows.iter().position(|c| c.name == name)
    }

    pub fn get(&self, name: &str) -> Option<&CowRecord> {
        self.cows.iter().find(|c| c.name == name)
    }

    pub fn at(&self, index: usize) -> Option<&CowRecord> {
        self.cows.get(index)
    }

    /// Runtime lookup by collar, used while dispensing.
    pub fn by_collar_mut(&mut self, collar_tag: u16) -> Option<(usize, &mut CowRecord)> {
        self.cows
            .iter_mut()
            .enumerate()
            .find(|(_, c)| c.collar_tag == collar_tag)
    }

    /// Insert or replace the record named `record.name`; returns its slot
    /// and whether it was newly created.
    ///
    /// Replacing keeps the stored feed history when `record` has none, so
    /// editing a cow on the management page never resets its quota.
    pub fn upsert(&mut self, mut record: CowRecord) -> Result<(usize, bool), HerdError> {
        record.validate()?;
        let existing = self.position(&record.name);
        if let Some(other) = self
            .cows
            .iter()
            .enumerate()
            .find(|(i, c)| c.collar_tag == record.collar_tag && Some(*i) != existing)
        {
            return Err(HerdError::DuplicateCollar(other.1.collar_tag));
        }
        match existing {
            Some(index) => {
                let slot = &mut self.cows[index];
                if record.feed_history.is_empty() {
                    record.feed_history = core::mem::take(&mut slot.feed_history);
                }
                *slot = record;
                Ok((index, false))
            }
            None if self.cows.len() >= MAX_COWS => Err(HerdError::Full),
            None => {
                self.cows.push(record);
                Ok((self.cows.len() - 1, true))
            }
        }
    }

    /// Remove by name, moving the last record into the freed slot.
    pub fn remove(&mut self, name: &str) -> Result<Removed, HerdError> {
        let index = self.position(name).ok_or(HerdError::NotFound)?;
        let moved_last = index != self.cows.len() - 1;
        self.cows.swap_remove(index);
        Ok(Removed { index, moved_last })
    }

    /// Undo a [`remove`](Self::remove), putting `record` back at its slot
    /// and the moved record back at the end.
    pub fn restore(&mut self, removed: Removed, record: CowRecord) {
        if removed.moved_last && removed.index < self.cows.len() {
            let moved = core::mem::replace(&mut self.cows[removed.index], record);
            self.cows.push(moved);
        } else {
            self.cows.push(record);
        }
    }

    /// Replace the record at `index` wholesale, bypassing every check.
    pub(crate) fn put_back(&mut self, index: usize, record: CowRecord) {
        if let Some(slot) = self.cows.get_mut(index) {
            *slot = record;
        }
    }

    pub fn clear(&mut self) {
        self.cows.clear();
    }
}
