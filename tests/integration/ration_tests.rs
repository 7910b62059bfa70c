//! Ration engine over the real herd store codec.

use feedstation::adapters::cow_store::KvCowStore;
use feedstation::app::ports::RationPort;
use feedstation::error::AllocationError;
use feedstation::ration::settings::Settings;
use feedstation::ration::{Allocation, RationEngine};

use crate::mock_hw::{HOUR, MIDNIGHT, MockNvs, MockWall, cow_json};

type Engine = RationEngine<KvCowStore<MockNvs>, MockWall>;

fn boot(nvs: &MockNvs, wall: &MockWall) -> Engine {
    RationEngine::load(KvCowStore::new(nvs.clone()), wall.clone())
}

fn herd(nvs: &MockNvs, wall: &MockWall, cows: &[(&str, u16, f32)]) -> Engine {
    let mut engine = boot(nvs, wall);
    for (name, collar, kg) in cows {
        engine.upsert_cow_json(&cow_json(name, *collar, *kg)).unwrap();
    }
    engine
}

#[test]
fn overnight_window_unlocks_rations_step_wise() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(MIDNIGHT + 5 * HOUR);
    let mut engine = herd(&nvs, &wall, &[("Berta", 17, 4.0)]);
    engine
        .set_settings_json(r#"{"reset_offsets":[6,18],"rations_per_window":4}"#)
        .unwrap();

    // 05:00 is 11 h into the window opened at 18:00 yesterday.
    for _ in 0..4 {
        assert_eq!(engine.allocate(17, 0), Ok(Allocation::Dispense { kg: 1.0 }));
    }
    assert_eq!(engine.allocate(17, 0), Ok(Allocation::QuotaMet));

    wall.set(MIDNIGHT + 6 * HOUR);
    assert_eq!(engine.allocate(17, 0), Ok(Allocation::Dispense { kg: 1.0 }));
    assert_eq!(engine.allocate(17, 0), Ok(Allocation::QuotaMet));
}

#[test]
fn ration_is_split_over_the_window() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(MIDNIGHT + HOUR);
    let mut engine = herd(&nvs, &wall, &[("Berta", 17, 6.0)]);
    engine
        .set_settings_json(r#"{"reset_offsets":[0],"rations_per_window":3}"#)
        .unwrap();
    assert_eq!(engine.allocate(17, 2).map(Allocation::kg), Ok(2.0));
}

#[test]
fn refusals_leave_no_trace() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(0);
    let mut engine = herd(&nvs, &wall, &[("Berta", 17, 4.0)]);
    let writes = nvs.writes();

    assert_eq!(engine.allocate(18, 0), Err(AllocationError::UnknownTag));
    assert_eq!(engine.allocate(17, 0), Err(AllocationError::ClockNotSet));
    assert_eq!(engine.flush_pending(), 0);
    assert_eq!(nvs.writes(), writes);
    assert!(engine.get_cow("Berta").unwrap().feed_history.is_empty());
}

#[test]
fn failed_flush_is_retried_next_time() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(MIDNIGHT + 2 * HOUR);
    let mut engine = herd(&nvs, &wall, &[("Berta", 17, 4.0)]);

    nvs.set_fail_writes(true);
    assert!(engine.allocate(17, 0).is_ok());
    assert_eq!(engine.flush_pending(), 0);
    assert!(engine.has_pending());

    nvs.set_fail_writes(false);
    assert_eq!(engine.flush_pending(), 1);
    assert!(!engine.has_pending());
    assert_eq!(
        boot(&nvs, &wall).get_cow("Berta").unwrap().feed_history.len(),
        1
    );
}

#[test]
fn reboot_restores_quota_and_recent_feeds() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(MIDNIGHT + 2 * HOUR);
    let mut engine = herd(&nvs, &wall, &[("Berta", 17, 4.0), ("Clara", 23, 4.0)]);
    engine.allocate(17, 0).unwrap();
    engine.allocate(23, 1).unwrap();
    engine.flush_pending();

    let mut rebooted = boot(&nvs, &wall);
    assert_eq!(rebooted.recent_feeds(10).len(), 2);
    assert_eq!(rebooted.allocate(17, 0), Ok(Allocation::QuotaMet));
}

#[test]
fn unreadable_slot_is_dropped_and_table_compacted() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(MIDNIGHT);
    herd(
        &nvs,
        &wall,
        &[("Anna", 1, 4.0), ("Berta", 2, 4.0), ("Clara", 3, 4.0)],
    );
    nvs.poke("herd", "c1", &[0xFF, 0x00, 0x13]);

    let engine = boot(&nvs, &wall);
    assert_eq!(engine.list_cow_names(), ["Anna", "Clara"]);
    assert_eq!(nvs.keys("herd"), ["c0", "c1", "count"]);

    // The compacted table loads cleanly a second time.
    assert_eq!(boot(&nvs, &wall).list_cow_names(), ["Anna", "Clara"]);
}

#[test]
fn corrupt_settings_fall_back_to_defaults() {
    let nvs = MockNvs::new();
    let wall = MockWall::at(MIDNIGHT);
    nvs.poke("herd", "settings", &[0x09, 0x09]);
    let engine = boot(&nvs, &wall);
    assert_eq!(engine.settings(), &Settings::default());
}
