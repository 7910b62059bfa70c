//! Station cycle controller.
//!
//! A non-blocking state machine that walks the stations round-robin.  Each
//! call to [`StationController::step`] performs exactly one action and
//! returns how long the caller should wait before the next call:
//!
//! ```text
//!  ┌─────────────────┐ 60  ┌─────────────────┐ 60  ┌───────────────────┐ 80
//!  │ SendGroupQuery1 │────▶│ SendGroupQuery2 │────▶│ SendPresenceQuery │────┐
//!  └─────────────────┘     └─────────────────┘     └───────────────────┘    │
//!           ▲                                                               ▼
//!           │ 70                                                ┌──────────────────┐
//!  ┌─────────────────┐  0  ┌──────────────┐ 60 ┌─────────────┐ 0│ AwaitPresenceAck │
//!  │ SendGroupQuery3 │◀────│ AwaitFeedAck │◀───│ SendFeed    │◀─┤  eligible?       │
//!  │ (terminator,    │     └──────────────┘    │ Command     │  └──────────────────┘
//!  │  next station)  │◀──────────────────────────────────────────────┘ no (0)
//!  └─────────────────┘
//! ```
//!
//! Waits are the per-frame timeouts from [`SystemConfig`].  No frame is
//! ever resent and the terminator always closes the round.  A dispense is
//! committed to `last_feed_time` as soon as the decision is made; a
//! missing feed acknowledgement is reported but not rolled back.

pub mod context;

use log::{debug, warn};

use crate::app::events::StationEvent;
use crate::app::ports::{EventSink, MonotonicClock, RationPort, SerialTx};
use crate::config::{MAX_STATIONS, SystemConfig};
use crate::protocol::{AckFrame, AckHistory, FrameKind};
use crate::ration::Allocation;
use context::{StationState, StationTable};

// ---------------------------------------------------------------------------
// Cycle state
// ---------------------------------------------------------------------------

/// Position within one station's round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    SendGroupQuery1,
    SendGroupQuery2,
    SendPresenceQuery,
    /// Presence query went out at `requested_at` (monotonic ms).
    AwaitPresenceAck { requested_at: u64 },
    /// Collar `tag` is eligible for a ration.
    SendFeedCommand { tag: u16 },
    AwaitFeedAck { requested_at: u64, tag: u16 },
    /// Terminator; closes the round and moves to the next station.
    SendGroupQuery3,
}

impl CycleState {
    pub fn name(self) -> &'static str {
        match self {
            Self::SendGroupQuery1 => "SendGroupQuery1",
            Self::SendGroupQuery2 => "SendGroupQuery2",
            Self::SendPresenceQuery => "SendPresenceQuery",
            Self::AwaitPresenceAck { .. } => "AwaitPresenceAck",
            Self::SendFeedCommand { .. } => "SendFeedCommand",
            Self::AwaitFeedAck { .. } => "AwaitFeedAck",
            Self::SendGroupQuery3 => "SendGroupQuery3",
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct StationController {
    state: CycleState,
    station: u8,
    stations: StationTable,
    config: SystemConfig,
}

impl StationController {
    /// Controller starting at station 0 with a fresh round.  A station
    /// count outside `1..=MAX_STATIONS` is clamped into range.
    pub fn new(mut config: SystemConfig) -> Self {
        let station_count = config.station_count.clamp(1, MAX_STATIONS as u8);
        if station_count != config.station_count {
            warn!(
                "station_count {} out of range, polling {}",
                config.station_count, station_count
            );
            config.station_count = station_count;
        }
        Self {
            state: CycleState::SendGroupQuery1,
            station: 0,
            stations: StationTable::default(),
            config,
        }
    }

    /// Announce the controller on the event sink.  Call once before the
    /// first [`step`](Self::step).
    pub fn start(&self, sink: &mut impl EventSink) {
        sink.emit(&StationEvent::Started {
            stations: self.config.station_count,
        });
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// Station the current round is addressed to.
    pub fn station(&self) -> u8 {
        self.station
    }

    pub fn station_state(&self, station: u8) -> Option<&StationState> {
        self.stations.get(usize::from(station))
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    /// Perform one action and return the wait in ms before the next call
    /// (0 = call again immediately).
    pub fn step(
        &mut self,
        tx: &mut impl SerialTx,
        clock: &impl MonotonicClock,
        acks: &AckHistory,
        rations: &mut impl RationPort,
        sink: &mut impl EventSink,
    ) -> u32 {
        let station = self.station;
        let (next, wait) = match self.state {
            CycleState::SendGroupQuery1 => (
                CycleState::SendGroupQuery2,
                self.send(FrameKind::GroupQuery1, tx, sink),
            ),
            CycleState::SendGroupQuery2 => (
                CycleState::SendPresenceQuery,
                self.send(FrameKind::GroupQuery2, tx, sink),
            ),
            CycleState::SendPresenceQuery => {
                let requested_at = clock.now_ms();
                let wait = self.send(FrameKind::PresenceQuery, tx, sink);
                (CycleState::AwaitPresenceAck { requested_at }, wait)
            }
            CycleState::AwaitPresenceAck { requested_at } => (
                self.check_presence(requested_at, clock, acks, rations, sink),
                0,
            ),
            CycleState::SendFeedCommand { tag } => {
                let requested_at = clock.now_ms();
                let wait = self.send(FrameKind::FeedCommand, tx, sink);
                (CycleState::AwaitFeedAck { requested_at, tag }, wait)
            }
            CycleState::AwaitFeedAck { requested_at, tag } => {
                if fresh_ack(acks, requested_at).is_some() {
                    sink.emit(&StationEvent::FeedConfirmed { station, tag });
                } else {
                    sink.emit(&StationEvent::FeedUnconfirmed { station, tag });
                }
                (CycleState::SendGroupQuery3, 0)
            }
            CycleState::SendGroupQuery3 => {
                let wait = self.send(FrameKind::Terminator, tx, sink);
                self.station = (self.station + 1) % self.config.station_count;
                (CycleState::SendGroupQuery1, wait)
            }
        };

        debug!(
            "station {}: {} -> {} (wait {} ms)",
            station,
            self.state.name(),
            next.name(),
            wait
        );
        self.state = next;
        wait
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    /// Transmit `kind` for the current station and return its timeout.
    /// A failed write is reported and the round carries on.
    fn send(&self, kind: FrameKind, tx: &mut impl SerialTx, sink: &mut impl EventSink) -> u32 {
        if tx.write_bytes(&kind.encode(self.station)).is_err() {
            sink.emit(&StationEvent::TransmitFailed {
                station: self.station,
            });
        }
        kind.timeout_ms(&self.config)
    }

    /// Evaluate the presence reply and decide whether to feed.
    fn check_presence(
        &mut self,
        requested_at: u64,
        clock: &impl MonotonicClock,
        acks: &AckHistory,
        rations: &mut impl RationPort,
        sink: &mut impl EventSink,
    ) -> CycleState {
        let station = self.station;
        let min_interval_ms = self.config.min_dispense_interval_ms;
        let Some(slot) = self.stations.get_mut(usize::from(station)) else {
            return CycleState::SendGroupQuery3;
        };

        let tag = match fresh_ack(acks, requested_at) {
            None => {
                slot.clear_present();
                sink.emit(&StationEvent::NoResponse { station });
                return CycleState::SendGroupQuery3;
            }
            Some(AckFrame { tag: 0, .. }) => {
                slot.clear_present();
                sink.emit(&StationEvent::StationEmpty { station });
                return CycleState::SendGroupQuery3;
            }
            Some(ack) => ack.tag,
        };

        slot.mark_present(tag);
        sink.emit(&StationEvent::CowPresent { station, tag });

        if !slot.interval_elapsed(clock.now_ms(), min_interval_ms) {
            sink.emit(&StationEvent::IntervalPending { station, tag });
            return CycleState::SendGroupQuery3;
        }

        match rations.allocate(tag, station) {
            Ok(Allocation::Dispense { kg }) if kg > 0.0 => {
                slot.commit_feed(requested_at);
                sink.emit(&StationEvent::Dispensing { station, tag, kg });
                CycleState::SendFeedCommand { tag }
            }
            Ok(_) => {
                sink.emit(&StationEvent::QuotaMet { station, tag });
                CycleState::SendGroupQuery3
            }
            Err(reason) => {
                sink.emit(&StationEvent::AllocationRefused {
                    station,
                    tag,
                    reason,
                });
                CycleState::SendGroupQuery3
            }
        }
    }
}

/// Newest ack, if it arrived after `requested_at`.
fn fresh_ack(acks: &AckHistory, requested_at: u64) -> Option<AckFrame> {
    acks.newest().filter(|ack| ack.receive_time > requested_at)
}
