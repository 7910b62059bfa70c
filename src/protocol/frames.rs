//! Station bus frame templates.
//!
//! Every request the controller sends is a short fixed template.  Frames
//! addressed to one station carry the station in byte 0 as
//! `STATION_BASE + index`:
//!
//! ```text
//!  group query 1   60 52 52          "`RR"
//!  group query 2   61 52 52          "aRR"
//!  presence        40+n 52 34 56     "@R4V" .. "CR4V"
//!  feed            40+n 57 34 56     "@W4V" .. "CW4V"
//!  terminator      01 31 04 35       even station
//!                  11 31 04 35       odd station
//! ```
//!
//! A station answers a presence query between the presence frame and the
//! terminator with `06 d2 d1 d0 04 xx`, the three digits being the collar
//! tag (`000` when the bay is empty).

use heapless::Vec;

use crate::config::SystemConfig;

/// Control byte that opens an acknowledgement frame.
pub const ACK_START: u8 = 0x06;

/// Address character of station 0.
pub const STATION_BASE: u8 = b'@';

/// Longest request template on the bus.
pub const MAX_FRAME_LEN: usize = 4;

const GROUP_QUERY_1: &[u8] = b"`RR";
const GROUP_QUERY_2: &[u8] = b"aRR";
const PRESENCE_QUERY: &[u8] = b"@R4V";
const FEED_COMMAND: &[u8] = b"@W4V";
const TERMINATOR_EVEN: &[u8] = &[0x01, b'1', 0x04, b'5'];
const TERMINATOR_ODD: &[u8] = &[0x11, b'1', 0x04, b'5'];

/// Request frame kinds, in cycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    GroupQuery1,
    GroupQuery2,
    PresenceQuery,
    FeedCommand,
    Terminator,
}

/// Encoded request frame.
pub type Frame = Vec<u8, MAX_FRAME_LEN>;

impl FrameKind {
    /// Encode this request for `station`.
    ///
    /// Broadcast frames ignore the station; the terminator only looks at
    /// its parity.
    pub fn encode(self, station: u8) -> Frame {
        let template = match self {
            Self::GroupQuery1 => GROUP_QUERY_1,
            Self::GroupQuery2 => GROUP_QUERY_2,
            Self::PresenceQuery => PRESENCE_QUERY,
            Self::FeedCommand => FEED_COMMAND,
            Self::Terminator if station % 2 == 0 => TERMINATOR_EVEN,
            Self::Terminator => TERMINATOR_ODD,
        };
        let mut frame = Frame::new();
        // Templates are at most MAX_FRAME_LEN bytes.
        let _ = frame.extend_from_slice(template);
        if self.is_addressed() {
            frame[0] = STATION_BASE.wrapping_add(station);
        }
        frame
    }

    /// Whether byte 0 carries the station address.
    pub const fn is_addressed(self) -> bool {
        matches!(self, Self::PresenceQuery | Self::FeedCommand)
    }

    /// How long the controller waits after sending this frame.
    pub fn timeout_ms(self, config: &SystemConfig) -> u32 {
        match self {
            Self::GroupQuery1 => config.group_query_1_timeout_ms,
            Self::GroupQuery2 => config.group_query_2_timeout_ms,
            Self::PresenceQuery => config.presence_timeout_ms,
            Self::FeedCommand => config.feed_timeout_ms,
            Self::Terminator => config.terminator_timeout_ms,
        }
    }
}
