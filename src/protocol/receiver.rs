//! Acknowledgement frame receiver.
//!
//! Runs on its own task and is the only blocking code in the core: it
//! pulls one byte at a time from the bus and publishes every `0x06` frame
//! into the shared [`AckHistory`].  It knows the frame syntax and nothing
//! else; deciding what an ack *means* is the station controller's job.
//!
//! ```text
//!  byte:    06      d2        d1       d0
//!  action:  push    tag+=100  tag+=10  tag+=1   (only while the frame
//!           tag=0   ·d2       ·d1      ·d0       is younger than the
//!                                                 inter-byte timeout)
//! ```
//!
//! A torn or late frame simply keeps whatever partial tag it had; the next
//! `0x06` resynchronises the stream.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use heapless::Deque;
use log::{info, warn};

use super::frames::ACK_START;
use crate::app::ports::{MonotonicClock, SerialError, SerialRx};

/// Number of acknowledgement frames kept in the history.
pub const ACK_HISTORY_LEN: usize = 32;

/// Positional weight of the three tag digits.
const DIGIT_WEIGHTS: [u16; 3] = [100, 10, 1];

/// One acknowledgement as seen on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckFrame {
    /// Monotonic milliseconds at which the `0x06` byte arrived.
    pub receive_time: u64,
    /// Collar tag (0 = no collar / not yet received).
    pub tag: u16,
}

// ───────────────────────────────────────────────────────────────
// Shared history
// ───────────────────────────────────────────────────────────────

/// Latest-N cache of acknowledgement frames shared between the receiver
/// task (writer) and the controller task (reader).
///
/// Every access takes the critical-section lock for a handful of
/// instructions only; no transport I/O ever happens under it.
pub struct AckHistory {
    frames: Mutex<CriticalSectionRawMutex, RefCell<Deque<AckFrame, ACK_HISTORY_LEN>>>,
}

impl AckHistory {
    pub const fn new() -> Self {
        Self {
            frames: Mutex::new(RefCell::new(Deque::new())),
        }
    }

    /// Append a frame, silently dropping the oldest one when full.
    pub fn push(&self, frame: AckFrame) {
        self.frames.lock(|cell| {
            let mut frames = cell.borrow_mut();
            if frames.is_full() {
                frames.pop_front();
            }
            let _ = frames.push_back(frame);
        });
    }

    /// Mutate the newest frame in place.  No-op when empty.
    pub fn update_newest(&self, f: impl FnOnce(&mut AckFrame)) {
        self.frames.lock(|cell| {
            if let Some(frame) = cell.borrow_mut().back_mut() {
                f(frame);
            }
        });
    }

    /// Copy of the most recently pushed frame.
    pub fn newest(&self) -> Option<AckFrame> {
        self.frames.lock(|cell| cell.borrow().back().copied())
    }

    /// Copy of every retained frame, oldest first.
    pub fn snapshot(&self) -> heapless::Vec<AckFrame, ACK_HISTORY_LEN> {
        self.frames
            .lock(|cell| cell.borrow().iter().copied().collect())
    }

    pub fn len(&self) -> usize {
        self.frames.lock(|cell| cell.borrow().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AckHistory {
    fn default() -> Self {
        Self::new()
    }
}

// ───────────────────────────────────────────────────────────────
// Receiver
// ───────────────────────────────────────────────────────────────

/// Byte-level ack frame parser.
pub struct FrameReceiver {
    /// Offset of the next tag digit, `None` outside a frame.
    digit: Option<usize>,
    inter_byte_timeout_ms: u64,
}

impl FrameReceiver {
    pub fn new(inter_byte_timeout_ms: u32) -> Self {
        Self {
            digit: None,
            inter_byte_timeout_ms: u64::from(inter_byte_timeout_ms),
        }
    }

    /// Consume one byte received at `now_ms`.
    pub fn on_byte(&mut self, byte: u8, now_ms: u64, history: &AckHistory) {
        if byte == ACK_START {
            history.push(AckFrame {
                receive_time: now_ms,
                tag: 0,
            });
            self.digit = Some(0);
            return;
        }

        let Some(pos) = self.digit else {
            return;
        };
        self.digit = (pos + 1 < DIGIT_WEIGHTS.len()).then_some(pos + 1);

        if !byte.is_ascii_digit() {
            return;
        }
        let value = u16::from(byte - b'0') * DIGIT_WEIGHTS[pos];
        let timeout = self.inter_byte_timeout_ms;
        history.update_newest(|frame| {
            if now_ms.saturating_sub(frame.receive_time) <= timeout {
                frame.tag += value;
            }
        });
    }

    /// Receive forever, or until the transport reports it is closed.
    pub fn run(
        &mut self,
        rx: &mut impl SerialRx,
        clock: &impl MonotonicClock,
        history: &AckHistory,
    ) {
        info!("FrameReceiver: listening");
        loop {
            match rx.read_byte() {
                Ok(byte) => self.on_byte(byte, clock.now_ms(), history),
                Err(SerialError::Closed) => {
                    warn!("FrameReceiver: transport closed, stopping");
                    return;
                }
                Err(e) => warn!("FrameReceiver: {}", e),
            }
        }
    }
}
