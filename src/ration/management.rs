//! Herd and schedule management operations.
//!
//! These back the management page: list, inspect, create, edit and delete
//! cows, adjust the feeding schedule, and show the latest feeds.  Unlike
//! the dispense path, every mutation here is written through immediately.

use log::{info, warn};
use serde::Serialize;

use super::RationEngine;
use super::herd::CowRecord;
use super::recent::{RECENT_FEEDS_LEN, RecentFeed};
use super::settings::Settings;
use crate::app::ports::{CowStorePort, SettingsPort, WallClock};
use crate::error::{HerdError, SettingsError};

impl<S, W> RationEngine<S, W>
where
    S: CowStorePort + SettingsPort,
    W: WallClock,
{
    /// Names of every cow, in table order.
    pub fn list_cow_names(&self) -> Vec<&str> {
        self.herd.names().collect()
    }

    pub fn get_cow(&self, name: &str) -> Option<&CowRecord> {
        self.herd.get(name)
    }

    /// Create or replace a cow.
    ///
    /// An update with an empty feed history keeps the stored one.  When the
    /// write fails the table is left as it was before the call.
    pub fn upsert_cow(&mut self, record: CowRecord) -> Result<(), HerdError> {
        // Pending slots must reach the store before indices can shift.
        self.flush_pending();

        let name = record.name.clone();
        let previous = self.herd.get(&name).cloned();
        let (index, created) = self.herd.upsert(record)?;
        let Some(stored) = self.herd.at(index) else {
            return Err(HerdError::NotFound);
        };

        let mut written = self.store.save(stored, index);
        if written.is_ok() && created {
            written = self.store.resize(self.herd.len());
        }
        if let Err(e) = written {
            warn!("herd: write of {} failed ({}), rolled back", name.as_str(), e);
            match previous {
                Some(previous) => self.herd.put_back(index, previous),
                None => {
                    let _ = self.herd.remove(&name);
                }
            }
            return Err(e.into());
        }

        self.recent = super::recent::RecentFeeds::rebuild(&self.herd);
        info!(
            "herd: {} {}",
            if created { "added" } else { "updated" },
            name.as_str()
        );
        Ok(())
    }

    /// Create or replace a cow from the management form's JSON.
    pub fn upsert_cow_json(&mut self, json: &str) -> Result<(), HerdError> {
        let record = CowRecord::from_json(json)?;
        self.upsert_cow(record)
    }

    /// Delete a cow; the last record takes over its slot.
    ///
    /// When the write fails the cow is put back.
    pub fn delete_cow(&mut self, name: &str) -> Result<(), HerdError> {
        self.flush_pending();

        let record = self.herd.get(name).cloned().ok_or(HerdError::NotFound)?;
        let removed = self.herd.remove(name)?;
        let moved_saved = match self.herd.at(removed.index) {
            Some(moved) if removed.moved_last => self.store.save(moved, removed.index),
            _ => Ok(()),
        };
        let written = moved_saved.and_then(|()| self.store.resize(self.herd.len()));
        if let Err(e) = written {
            warn!("herd: delete of {} failed ({}), rolled back", name, e);
            self.herd.restore(removed, record);
            // The slot may already hold the moved record; rewrite it.
            if removed.moved_last {
                self.dirty.insert(removed.index);
            }
            return Err(e.into());
        }

        self.recent.forget(name);
        info!("herd: deleted {}", name);
        Ok(())
    }

    /// Remove every cow.
    pub fn clear_cows(&mut self) -> Result<(), HerdError> {
        self.dirty.clear();
        self.herd.clear();
        self.recent.clear();
        self.store.resize(0)?;
        warn!("herd: cleared");
        Ok(())
    }

    /// Validate, persist and apply a new schedule.
    pub fn set_settings(&mut self, settings: Settings) -> Result<(), SettingsError> {
        settings.validate()?;
        self.store.save_settings(&settings)?;
        info!(
            "settings: offsets {:?}, {} rations/window",
            settings.reset_offsets.as_slice(),
            settings.rations_per_window
        );
        self.settings = settings;
        Ok(())
    }

    pub fn set_settings_json(&mut self, json: &str) -> Result<(), SettingsError> {
        self.set_settings(Settings::from_json(json)?)
    }

    /// Up to `limit` recent feeds across the herd, newest first.
    pub fn recent_feeds(&self, limit: usize) -> Vec<RecentFeed> {
        self.recent.latest(limit.min(RECENT_FEEDS_LEN))
    }

    // --- JSON views for the management page ---

    pub fn cow_names_json(&self) -> String {
        to_json(&self.list_cow_names())
    }

    pub fn cow_json(&self, name: &str) -> Option<String> {
        self.get_cow(name).map(to_json)
    }

    pub fn settings_json(&self) -> String {
        self.settings.to_json()
    }

    pub fn recent_feeds_json(&self, limit: usize) -> String {
        to_json(&self.recent_feeds(limit))
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}
