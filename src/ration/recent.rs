//! Herd-wide view of the latest feeds, newest last.

use heapless::{Deque, String};
use serde::Serialize;

use super::herd::{FeedEntry, Herd, MAX_NAME_LEN};

/// Feeds kept across the whole herd.
pub const RECENT_FEEDS_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecentFeed {
    pub cow: String<MAX_NAME_LEN>,
    pub station: u8,
    /// Minutes since the Unix epoch.
    pub timestamp: u32,
}

/// Bounded, time-ordered copy of recent [`FeedEntry`]s.
///
/// Entries are copies, so the index stays valid while the herd table
/// reorders itself on delete.
#[derive(Debug, Default)]
pub struct RecentFeeds {
    feeds: Deque<RecentFeed, RECENT_FEEDS_LEN>,
}

impl RecentFeeds {
    pub const fn new() -> Self {
        Self {
            feeds: Deque::new(),
        }
    }

    /// Rebuild from every history in the herd, keeping the newest entries.
    pub fn rebuild(herd: &Herd) -> Self {
        let mut all: Vec<RecentFeed> = herd
            .iter()
            .flat_map(|cow| {
                cow.feed_history.oldest_first().map(|e| RecentFeed {
                    cow: cow.name.clone(),
                    station: e.station,
                    timestamp: e.timestamp,
                })
            })
            .collect();
        all.sort_by_key(|f| f.timestamp);

        let mut index = Self::new();
        let skip = all.len().saturating_sub(RECENT_FEEDS_LEN);
        for feed in all.into_iter().skip(skip) {
            let _ = index.feeds.push_back(feed);
        }
        index
    }

    /// Record a feed that just happened.
    pub fn record(&mut self, cow: &str, entry: FeedEntry) {
        let Ok(cow) = String::try_from(cow) else {
            return;
        };
        if self.feeds.is_full() {
            self.feeds.pop_front();
        }
        let _ = self.feeds.push_back(RecentFeed {
            cow,
            station: entry.station,
            timestamp: entry.timestamp,
        });
    }

    /// Drop every entry belonging to `cow`.
    pub fn forget(&mut self, cow: &str) {
        let kept: Vec<RecentFeed> = self.feeds.iter().filter(|f| f.cow != cow).cloned().collect();
        self.feeds.clear();
        for feed in kept {
            let _ = self.feeds.push_back(feed);
        }
    }

    pub fn clear(&mut self) {
        self.feeds.clear();
    }

    /// Up to `limit` entries, newest first.
    pub fn latest(&self, limit: usize) -> Vec<RecentFeed> {
        self.feeds.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.feeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feeds.is_empty()
    }
}
