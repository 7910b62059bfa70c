//! Feed station firmware main entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Adapters (outer ring)                     │
//! │                                                              │
//! │  UartRx / UartTx   Esp32TimeAdapter   NvsAdapter → KvCowStore│
//! │  (Serial ports)    (both clocks)      (Config, herd, settings)│
//! │  LogEventSink                                                │
//! │  (EventSink + log ring)                                      │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │                                                              │
//! │   ack-rx task (core 1)          controller loop (main task)  │
//! │   FrameReceiver ──▶ AckHistory ◀── StationController         │
//! │                                        │                     │
//! │                                        ▼                     │
//! │                                   RationEngine               │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{info, warn};

use feedstation::adapters::cow_store::KvCowStore;
use feedstation::adapters::log_sink::LogEventSink;
use feedstation::adapters::nvs::NvsAdapter;
use feedstation::adapters::time::Esp32TimeAdapter;
use feedstation::adapters::uart::init_station_bus;
use feedstation::app::ports::{ConfigPort, MonotonicClock};
use feedstation::config::SystemConfig;
use feedstation::drivers::task_pin::{Core, spawn_on_core};
use feedstation::fsm::StationController;
use feedstation::protocol::{AckHistory, FrameReceiver};
use feedstation::ration::RationEngine;

/// Receiver task priority; above the controller so no byte is late.
const RX_TASK_PRIORITY: u8 = 10;
const RX_TASK_STACK_KB: usize = 4;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Feedstation v{}                     ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Config + herd from NVS ─────────────────────────────
    let nvs = NvsAdapter::new().map_err(feedstation::Error::from)?;
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    info!(
        "Config: {} stations, min interval {} s, {} baud, idle round {} ms",
        config.station_count,
        config.min_dispense_interval_ms / 1000,
        config.uart_baud,
        config.idle_round_ms()
    );

    let clock = Esp32TimeAdapter::new();
    let mut rations = RationEngine::load(KvCowStore::new(nvs), clock);
    info!("Herd: {} cows", rations.herd().len());

    // ── 3. Station bus + receiver task ────────────────────────
    let (mut bus_rx, mut bus_tx) = init_station_bus(config.uart_baud)?;
    let acks = Arc::new(AckHistory::new());

    let rx_acks = Arc::clone(&acks);
    let inter_byte_timeout_ms = config.inter_byte_timeout_ms;
    spawn_on_core(
        Core::App,
        RX_TASK_PRIORITY,
        RX_TASK_STACK_KB,
        "ack-rx\0",
        move || {
            FrameReceiver::new(inter_byte_timeout_ms).run(&mut bus_rx, &clock, &rx_acks);
        },
    )?;

    // ── 4. Controller loop ────────────────────────────────────
    let mut sink = LogEventSink::new();
    let mut controller = StationController::new(config);
    controller.start(&mut sink);

    loop {
        let wait = controller.step(&mut bus_tx, &clock, &acks, &mut rations, &mut sink);

        // Persist behind the decision; flash time comes out of the wait.
        let flush_start = clock.now_ms();
        rations.flush_pending();
        let spent = clock.now_ms().saturating_sub(flush_start);

        let remaining = u64::from(wait).saturating_sub(spent);
        if remaining > 0 {
            std::thread::sleep(Duration::from_millis(remaining));
        }
    }
}
