//! Fuzz target: `FrameReceiver::on_byte`
//!
//! Interprets the input as (byte, gap) pairs and drives them through the
//! ack receiver, asserting that decoded tags stay within three digits and
//! the shared history never exceeds its capacity.
//!
//! cargo fuzz run fuzz_ack_receiver

#![no_main]

use feedstation::protocol::receiver::ACK_HISTORY_LEN;
use feedstation::protocol::{AckHistory, FrameReceiver};
use libfuzzer_sys::fuzz_target;

// Link the std critical-section implementation the shared history needs.
use critical_section as _;

fuzz_target!(|data: &[u8]| {
    let history = AckHistory::new();
    let mut rx = FrameReceiver::new(8);
    let mut now = 0u64;

    for pair in data.chunks(2) {
        now += u64::from(pair.get(1).copied().unwrap_or(0) % 16);
        rx.on_byte(pair[0], now, &history);
    }

    let frames = history.snapshot();
    assert!(frames.len() <= ACK_HISTORY_LEN, "history overflowed");
    for frame in &frames {
        assert!(frame.tag <= 999, "tag {} has more than three digits", frame.tag);
    }
});
