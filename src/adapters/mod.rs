//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements                  | Connects to                |
//! |-------------|-----------------------------|----------------------------|
//! | `cow_store` | CowStorePort, SettingsPort  | any StoragePort (NVS)      |
//! | `log_sink`  | EventSink                   | `log` facade + log ring    |
//! | `nvs`       | ConfigPort, StoragePort     | NVS / in-memory store      |
//! | `time`      | MonotonicClock, WallClock   | ESP32 timer + RTC          |
//! | `uart`      | SerialRx, SerialTx          | ESP-IDF UART, RS-485 mode  |

pub mod cow_store;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod uart;
