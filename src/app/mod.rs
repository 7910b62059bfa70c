//! Application boundary: port traits and outbound events.
//!
//! The station core (frame receiver, cycle controller, ration engine) only
//! talks to the outside world through the **port traits** defined in
//! [`ports`], keeping it fully testable without a UART or flash.

pub mod events;
pub mod ports;
