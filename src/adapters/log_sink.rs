//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing each [`StationEvent`] to the `log`
//! facade (UART / USB-CDC in production) at a severity matching its
//! impact, and keeps the latest lines in a bounded ring for the
//! management page's log view.

use core::fmt::Write as _;

use heapless::{Deque, String};
use log::{Level, debug, error, info, warn};

use crate::app::events::StationEvent;
use crate::app::ports::EventSink;
use crate::error::AllocationError;

/// Lines kept for the log view.
pub const LOG_RING_LEN: usize = 64;

/// Longest kept line; longer lines are cut.
pub const LOG_LINE_LEN: usize = 96;

pub type LogLine = String<LOG_LINE_LEN>;

/// Adapter that logs every [`StationEvent`] and remembers recent ones.
pub struct LogEventSink {
    ring: Deque<LogLine, LOG_RING_LEN>,
}

impl Default for LogEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogEventSink {
    pub fn new() -> Self {
        Self { ring: Deque::new() }
    }

    /// Kept lines, oldest first.
    pub fn recent_lines(&self) -> impl Iterator<Item = &str> {
        self.ring.iter().map(String::as_str)
    }

    fn keep(&mut self, line: LogLine) {
        if self.ring.is_full() {
            self.ring.pop_front();
        }
        let _ = self.ring.push_back(line);
    }
}

/// Severity each event is reported at.
pub fn level_of(event: &StationEvent) -> Level {
    match event {
        StationEvent::Started { .. }
        | StationEvent::Dispensing { .. }
        | StationEvent::FeedConfirmed { .. } => Level::Info,
        StationEvent::CowPresent { .. }
        | StationEvent::StationEmpty { .. }
        | StationEvent::IntervalPending { .. }
        | StationEvent::QuotaMet { .. } => Level::Debug,
        StationEvent::NoResponse { .. }
        | StationEvent::FeedUnconfirmed { .. }
        | StationEvent::TransmitFailed { .. } => Level::Warn,
        StationEvent::AllocationRefused { reason, .. } => match reason {
            AllocationError::UnknownTag | AllocationError::InvalidWindow => Level::Error,
            AllocationError::ClockNotSet => Level::Info,
        },
    }
}

/// One-line rendering of an event.
pub fn format_event(event: &StationEvent) -> LogLine {
    let mut line = LogLine::new();
    // A full line is simply cut short.
    let _ = match event {
        StationEvent::Started { stations } => write!(line, "START | {} stations", stations),
        StationEvent::CowPresent { station, tag } => {
            write!(line, "STN {} | collar {} present", station, tag)
        }
        StationEvent::StationEmpty { station } => write!(line, "STN {} | empty", station),
        StationEvent::NoResponse { station } => write!(line, "STN {} | no response", station),
        StationEvent::IntervalPending { station, tag } => {
            write!(line, "STN {} | collar {} fed too recently", station, tag)
        }
        StationEvent::Dispensing { station, tag, kg } => {
            write!(line, "STN {} | collar {} dispensing {:.2} kg", station, tag, kg)
        }
        StationEvent::FeedConfirmed { station, tag } => {
            write!(line, "STN {} | collar {} feed confirmed", station, tag)
        }
        StationEvent::FeedUnconfirmed { station, tag } => {
            write!(line, "STN {} | collar {} feed not acknowledged", station, tag)
        }
        StationEvent::QuotaMet { station, tag } => {
            write!(line, "STN {} | collar {} quota met", station, tag)
        }
        StationEvent::AllocationRefused {
            station,
            tag,
            reason,
        } => write!(
            line,
            "STN {} | collar {} refused: {} ({})",
            station,
            tag,
            reason,
            reason.code()
        ),
        StationEvent::TransmitFailed { station } => {
            write!(line, "STN {} | transmit failed", station)
        }
    };
    line
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &StationEvent) {
        let line = format_event(event);
        match level_of(event) {
            Level::Error => error!("{}", line),
            Level::Warn => warn!("{}", line),
            Level::Info => info!("{}", line),
            Level::Debug | Level::Trace => debug!("{}", line),
        }
        self.keep(line);
    }
}
