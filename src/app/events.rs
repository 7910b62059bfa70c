//! Outbound station events.
//!
//! The station controller emits these through the
//! [`EventSink`](super::ports::EventSink) port instead of returning errors:
//! the cycle must keep running whatever happens on the bus.

use crate::error::AllocationError;

/// Structured events emitted by the station core.
#[derive(Debug, Clone, PartialEq)]
pub enum StationEvent {
    /// The controller started cycling over `stations` stations.
    Started { stations: u8 },

    /// A collar answered the presence query.
    CowPresent { station: u8, tag: u16 },

    /// The station answered but reported no collar.
    StationEmpty { station: u8 },

    /// No fresh acknowledgement arrived within the presence timeout.
    NoResponse { station: u8 },

    /// The cow was fed at this station too recently to try again.
    IntervalPending { station: u8, tag: u16 },

    /// A feed command is going out for `kg` of concentrate.
    Dispensing { station: u8, tag: u16, kg: f32 },

    /// The station acknowledged the feed command.
    FeedConfirmed { station: u8, tag: u16 },

    /// The feed command went unacknowledged; the ration stays committed.
    FeedUnconfirmed { station: u8, tag: u16 },

    /// The cow already had its quota for the current window.
    QuotaMet { station: u8, tag: u16 },

    /// The ration engine refused to decide.
    AllocationRefused {
        station: u8,
        tag: u16,
        reason: AllocationError,
    },

    /// Writing the serial frame failed.
    TransmitFailed { station: u8 },
}
