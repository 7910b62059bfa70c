//! GPIO / peripheral assignments for the feed station controller board.
//!
//! Single source of truth; drivers reference this module rather than
//! hard-coding pin numbers.

// ---------------------------------------------------------------------------
// Station bus (RS-485 transceiver, half duplex)
// ---------------------------------------------------------------------------

/// UART peripheral wired to the station bus transceiver.
pub const STATION_BUS_UART: i32 = 1;
/// UART TX → transceiver DI.
pub const STATION_BUS_TX_GPIO: i32 = 17;
/// UART RX ← transceiver RO.
pub const STATION_BUS_RX_GPIO: i32 = 18;
/// Transceiver DE/RE, driven by the UART's RTS line in RS-485 mode.
pub const STATION_BUS_DE_GPIO: i32 = 16;

/// Driver ring buffer sizes (bytes).  The bus moves a few bytes per
/// frame at 1200 baud; these only need to absorb scheduling jitter.
pub const STATION_BUS_RX_BUF: i32 = 256;
pub const STATION_BUS_TX_BUF: i32 = 256;
