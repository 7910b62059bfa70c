//! Full station cycles: controller, receiver and ration engine together
//! over a simulated bus.

use feedstation::adapters::cow_store::KvCowStore;
use feedstation::app::events::StationEvent;
use feedstation::config::SystemConfig;
use feedstation::error::AllocationError;
use feedstation::ration::RationEngine;

use crate::mock_hw::{Bay, FeedYard, HOUR, MIDNIGHT, MockNvs, MockWall, cow_json};

type Engine = RationEngine<KvCowStore<MockNvs>, MockWall>;

const ELEVEN_MINUTES_MS: u64 = 11 * 60 * 1000;

fn yard(station_count: u8) -> FeedYard {
    FeedYard::new(SystemConfig {
        station_count,
        ..SystemConfig::default()
    })
}

fn engine(nvs: &MockNvs, wall: &MockWall, cows: &[(&str, u16)]) -> Engine {
    let mut engine = RationEngine::load(KvCowStore::new(nvs.clone()), wall.clone());
    for (name, collar) in cows {
        engine.upsert_cow_json(&cow_json(name, *collar, 4.0)).unwrap();
    }
    engine
}

fn occupied(collar: u16) -> Bay {
    Bay {
        collar,
        ..Bay::default()
    }
}

#[test]
fn present_cow_gets_first_ration_of_window() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(MIDNIGHT + 2 * HOUR);
    let mut rations = engine(&nvs, &wall, &[("Berta", 17)]);
    let mut yard = yard(1);
    yard.bays[0] = occupied(17);

    yard.round(&mut rations);

    assert!(yard.sink.contains(&StationEvent::CowPresent { station: 0, tag: 17 }));
    assert!(yard.sink.contains(&StationEvent::Dispensing {
        station: 0,
        tag: 17,
        kg: 1.0
    }));
    assert!(yard.sink.contains(&StationEvent::FeedConfirmed { station: 0, tag: 17 }));
    assert_eq!(yard.bus.feed_commands(), [b"@W4V".as_slice()]);
    assert_eq!(
        yard.bus.frames.last().map(Vec::as_slice),
        Some([0x01, b'1', 0x04, b'5'].as_slice())
    );

    // Written behind the decision, visible after a reboot.
    assert!(rations.has_pending());
    assert_eq!(rations.flush_pending(), 1);
    let rebooted = engine(&nvs, &wall, &[]);
    assert_eq!(rebooted.get_cow("Berta").unwrap().feed_history.len(), 1);
}

#[test]
fn interval_then_quota_then_next_slot() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(MIDNIGHT + 2 * HOUR);
    let mut rations = engine(&nvs, &wall, &[("Berta", 17)]);
    let mut yard = yard(1);
    yard.bays[0] = occupied(17);

    yard.round(&mut rations);
    yard.round(&mut rations);
    assert!(yard.sink.contains(&StationEvent::IntervalPending { station: 0, tag: 17 }));

    yard.idle(ELEVEN_MINUTES_MS);
    yard.round(&mut rations);
    assert!(yard.sink.contains(&StationEvent::QuotaMet { station: 0, tag: 17 }));

    wall.set(MIDNIGHT + 8 * HOUR);
    yard.idle(ELEVEN_MINUTES_MS);
    yard.round(&mut rations);

    let dispenses = yard
        .sink
        .count(|e| matches!(e, StationEvent::Dispensing { .. }));
    assert_eq!(dispenses, 2);
    assert_eq!(yard.bus.feed_commands().len(), 2);
    assert_eq!(rations.get_cow("Berta").unwrap().feed_history.len(), 2);
}

#[test]
fn unknown_collar_is_refused_and_not_fed() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(MIDNIGHT + 2 * HOUR);
    let mut rations = engine(&nvs, &wall, &[("Berta", 17)]);
    let mut yard = yard(1);
    yard.bays[0] = occupied(404);

    yard.round(&mut rations);

    assert!(yard.sink.contains(&StationEvent::AllocationRefused {
        station: 0,
        tag: 404,
        reason: AllocationError::UnknownTag,
    }));
    assert!(yard.bus.feed_commands().is_empty());
    let station = yard.controller.station_state(0).unwrap();
    assert_eq!(station.last_feed_time, None);
    assert_eq!(station.currently_present_tag, 404);
}

#[test]
fn unset_wall_clock_refuses_allocation() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(0);
    let mut rations = engine(&nvs, &wall, &[("Berta", 17)]);
    let mut yard = yard(1);
    yard.bays[0] = occupied(17);

    yard.round(&mut rations);

    assert!(yard.sink.contains(&StationEvent::AllocationRefused {
        station: 0,
        tag: 17,
        reason: AllocationError::ClockNotSet,
    }));
    assert!(yard.bus.feed_commands().is_empty());
    assert!(!rations.has_pending());
}

#[test]
fn silent_and_empty_stations_are_skipped() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(MIDNIGHT + 2 * HOUR);
    let mut rations = engine(&nvs, &wall, &[("Berta", 17)]);
    let mut yard = yard(2);
    yard.bays[0] = Bay {
        collar: 17,
        silent: true,
        ..Bay::default()
    };
    yard.bays[1] = occupied(0);

    yard.round(&mut rations);
    assert_eq!(yard.bus.frames.last().map(|f| f[0]), Some(0x01));
    yard.round(&mut rations);
    assert_eq!(yard.bus.frames.last().map(|f| f[0]), Some(0x11));

    assert!(yard.sink.contains(&StationEvent::NoResponse { station: 0 }));
    assert!(yard.sink.contains(&StationEvent::StationEmpty { station: 1 }));
    assert!(yard.bus.feed_commands().is_empty());
    assert_eq!(yard.controller.station(), 0);
}

#[test]
fn each_station_feeds_its_own_cow() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(MIDNIGHT + 2 * HOUR);
    let mut rations = engine(&nvs, &wall, &[("Berta", 17), ("Clara", 23)]);
    let mut yard = yard(3);
    yard.bays[0] = occupied(17);
    yard.bays[2] = occupied(23);

    for _ in 0..3 {
        yard.round(&mut rations);
    }

    assert_eq!(
        yard.bus.feed_commands(),
        [b"@W4V".as_slice(), b"BW4V".as_slice()]
    );
    let mut stations: Vec<u8> = rations.recent_feeds(10).iter().map(|f| f.station).collect();
    stations.sort_unstable();
    assert_eq!(stations, [0, 2]);
    assert_eq!(rations.flush_pending(), 2);
}

#[test]
fn unacknowledged_feed_stays_committed() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(MIDNIGHT + 2 * HOUR);
    let mut rations = engine(&nvs, &wall, &[("Berta", 17)]);
    let mut yard = yard(1);
    yard.bays[0] = Bay {
        collar: 17,
        drops_feed_ack: true,
        ..Bay::default()
    };

    yard.round(&mut rations);

    assert!(yard.sink.contains(&StationEvent::FeedUnconfirmed { station: 0, tag: 17 }));
    assert!(yard.controller.station_state(0).unwrap().last_feed_time.is_some());
    assert_eq!(rations.get_cow("Berta").unwrap().feed_history.len(), 1);
}

#[test]
fn quota_follows_the_cow_across_stations() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(MIDNIGHT + 2 * HOUR);
    let mut rations = engine(&nvs, &wall, &[("Berta", 17)]);
    let mut yard = yard(2);
    yard.bays[0] = occupied(17);

    yard.round(&mut rations);
    assert_eq!(yard.controller.station(), 1);

    // She walks over to the next bay; that station has never fed anyone.
    yard.bays[0] = occupied(0);
    yard.bays[1] = occupied(17);
    yard.round(&mut rations);

    assert!(yard.sink.contains(&StationEvent::QuotaMet { station: 1, tag: 17 }));
    assert_eq!(yard.bus.feed_commands().len(), 1);
}

#[test]
fn transmit_failures_do_not_stall_the_cycle() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(MIDNIGHT + 2 * HOUR);
    let mut rations = engine(&nvs, &wall, &[("Berta", 17)]);
    let mut yard = yard(1);
    yard.bays[0] = occupied(17);
    yard.bus.fail_writes = true;

    yard.round(&mut rations);

    let failures = yard
        .sink
        .count(|e| matches!(e, StationEvent::TransmitFailed { station: 0 }));
    assert_eq!(failures, 4);
    assert!(yard.sink.contains(&StationEvent::NoResponse { station: 0 }));
}
