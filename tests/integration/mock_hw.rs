//! Mock hardware for integration tests.
//!
//! Stands in for the station bus, both clocks and NVS flash.  The
//! [`FeedYard`] wires a real [`StationController`] to a real
//! [`FrameReceiver`] and answers every request frame the way the station
//! firmware does, byte by byte.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use feedstation::app::events::StationEvent;
use feedstation::app::ports::{
    EventSink, MonotonicClock, RationPort, SerialError, SerialTx, StorageError, StoragePort,
    WallClock,
};
use feedstation::config::{MAX_STATIONS, SystemConfig};
use feedstation::fsm::{CycleState, StationController};
use feedstation::protocol::frames::ACK_START;
use feedstation::protocol::{AckHistory, FrameKind, FrameReceiver};

/// 2024-03-10 00:00 local time.
pub const MIDNIGHT: u64 = 1_710_028_800;

pub const HOUR: u64 = 3_600;

// ── Bus ───────────────────────────────────────────────────────

/// Records every frame the controller transmits.
#[derive(Default)]
pub struct MockBus {
    pub frames: Vec<Vec<u8>>,
    pub fail_writes: bool,
}

impl SerialTx for MockBus {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), SerialError> {
        if self.fail_writes {
            return Err(SerialError::Io);
        }
        self.frames.push(bytes.to_vec());
        Ok(())
    }
}

#[allow(dead_code)]
impl MockBus {
    pub fn feed_commands(&self) -> Vec<&[u8]> {
        self.frames
            .iter()
            .filter(|f| f.len() == 4 && f[1] == b'W')
            .map(Vec::as_slice)
            .collect()
    }
}

// ── Clocks ────────────────────────────────────────────────────

/// Monotonic milliseconds, advanced by the test.
#[derive(Default)]
pub struct MockClock(Cell<u64>);

impl MockClock {
    pub fn advance(&self, ms: u64) {
        self.0.set(self.0.get() + ms);
    }
}

impl MonotonicClock for MockClock {
    fn now_ms(&self) -> u64 {
        self.0.get()
    }
}

/// Wall clock shared between the test and the engine that owns a clone.
#[derive(Clone, Default)]
pub struct MockWall(Rc<Cell<u64>>);

#[allow(dead_code)]
impl MockWall {
    pub fn at(secs: u64) -> Self {
        Self(Rc::new(Cell::new(secs)))
    }

    pub fn set(&self, secs: u64) {
        self.0.set(secs);
    }
}

impl WallClock for MockWall {
    fn now_secs(&self) -> u64 {
        self.0.get()
    }
}

// ── Event sink ────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<StationEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn contains(&self, event: &StationEvent) -> bool {
        self.events.contains(event)
    }

    pub fn count(&self, pred: impl Fn(&StationEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &StationEvent) {
        self.events.push(event.clone());
    }
}

// ── MockNvs ───────────────────────────────────────────────────

/// Key-value flash shared by clones, so a "rebooted" engine can reopen it.
#[derive(Clone, Default)]
pub struct MockNvs {
    store: Rc<RefCell<HashMap<String, Vec<u8>>>>,
    fail_writes: Rc<Cell<bool>>,
    fail_key: Rc<RefCell<Option<String>>>,
    writes: Rc<Cell<usize>>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }

    /// Fail only writes to `key`; `None` clears the fault.
    pub fn set_fail_key(&self, key: Option<&str>) {
        *self.fail_key.borrow_mut() = key.map(str::to_owned);
    }

    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    /// Overwrite a raw value, bypassing every codec.
    pub fn poke(&self, namespace: &str, key: &str, data: &[u8]) {
        self.store
            .borrow_mut()
            .insert(format!("{}::{}", namespace, key), data.to_vec());
    }

    pub fn keys(&self, namespace: &str) -> Vec<String> {
        let prefix = format!("{}::", namespace);
        let mut keys: Vec<String> = self
            .store
            .borrow()
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix).map(str::to_owned))
            .collect();
        keys.sort();
        keys
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let k = format!("{}::{}", namespace, key);
        match self.store.borrow().get(&k) {
            Some(v) if v.len() > buf.len() => Err(StorageError::Full),
            Some(v) => {
                buf[..v.len()].copy_from_slice(v);
                Ok(v.len())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes.get() || self.fail_key.borrow().as_deref() == Some(key) {
            return Err(StorageError::IoError);
        }
        self.writes.set(self.writes.get() + 1);
        self.poke(namespace, key, data);
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store
            .borrow_mut()
            .remove(&format!("{}::{}", namespace, key));
        Ok(())
    }
}

// ── Simulated feed yard ──────────────────────────────────────

/// Who stands at each station and whether it answers at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bay {
    /// Collar tag of the cow in the bay, 0 when empty.
    pub collar: u16,
    /// The station's transceiver is dead.
    pub silent: bool,
    /// The station does not acknowledge feed commands.
    pub drops_feed_ack: bool,
}

/// Controller plus receiver plus simulated stations on one bus.
pub struct FeedYard {
    pub controller: StationController,
    pub bus: MockBus,
    pub clock: MockClock,
    pub acks: AckHistory,
    pub receiver: FrameReceiver,
    pub bays: [Bay; MAX_STATIONS],
    pub sink: RecordingSink,
}

/// Delay between a request and the first reply byte.
const REPLY_DELAY_MS: u64 = 20;

#[allow(dead_code)]
impl FeedYard {
    pub fn new(config: SystemConfig) -> Self {
        let receiver = FrameReceiver::new(config.inter_byte_timeout_ms);
        Self {
            controller: StationController::new(config),
            bus: MockBus::default(),
            clock: MockClock::default(),
            acks: AckHistory::new(),
            receiver,
            bays: [Bay::default(); MAX_STATIONS],
            sink: RecordingSink::default(),
        }
    }

    /// One controller step; replies arrive during the returned wait, which
    /// then elapses.
    pub fn step(&mut self, rations: &mut impl RationPort) -> u32 {
        let sent_before = self.bus.frames.len();
        let wait = self.controller.step(
            &mut self.bus,
            &self.clock,
            &self.acks,
            rations,
            &mut self.sink,
        );
        let sent_at = self.clock.now_ms();
        if self.bus.frames.len() > sent_before {
            if let Some(frame) = self.bus.frames.last().cloned() {
                self.answer(&frame, sent_at);
            }
        }
        self.clock.advance(u64::from(wait));
        wait
    }

    /// Run until the controller is back at the start of a round.
    pub fn round(&mut self, rations: &mut impl RationPort) {
        self.step(rations);
        while self.controller.state() != CycleState::SendGroupQuery1 {
            self.step(rations);
        }
    }

    /// Idle the bus for `ms` without stepping.
    pub fn idle(&self, ms: u64) {
        self.clock.advance(ms);
    }

    fn answer(&mut self, frame: &[u8], sent_at: u64) {
        for station in 0..MAX_STATIONS as u8 {
            let bay = self.bays[usize::from(station)];
            if bay.silent {
                continue;
            }
            if frame == FrameKind::PresenceQuery.encode(station).as_slice() {
                self.reply(bay.collar, sent_at);
            } else if frame == FrameKind::FeedCommand.encode(station).as_slice()
                && !bay.drops_feed_ack
            {
                self.reply(bay.collar, sent_at);
            }
        }
    }

    /// `06 d2 d1 d0 04 xx`, one byte per millisecond.
    fn reply(&mut self, collar: u16, sent_at: u64) {
        let digits = [collar / 100, (collar / 10) % 10, collar % 10];
        let mut bytes = vec![ACK_START];
        bytes.extend(digits.iter().map(|d| b'0' + *d as u8));
        bytes.extend([0x04, 0x20]);
        for (i, byte) in bytes.into_iter().enumerate() {
            self.receiver
                .on_byte(byte, sent_at + REPLY_DELAY_MS + i as u64, &self.acks);
        }
    }
}

/// Management form body for a test cow.
#[allow(dead_code)]
pub fn cow_json(name: &str, collar: u16, ration_kg: f32) -> String {
    format!(
        r#"{{"name":"{}","ear_tag":"276000{:06}","collar_tag":{},"ration_kg":{},"calving_day":1700000000}}"#,
        name, collar, collar, ration_kg
    )
}
