//! Station bus protocol: request frame templates and the ack receiver.

pub mod frames;
pub mod receiver;

pub use frames::FrameKind;
pub use receiver::{AckFrame, AckHistory, FrameReceiver};
