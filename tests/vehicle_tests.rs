use bomber_sim::config::VehicleConfig;
use bomber_sim::layout::{PositionService, StaticLayout};
use bomber_sim::roster::Roster;
use bomber_sim::vehicle::*;

fn create_vehicle(config: VehicleConfig, seed: u64) -> VehicleState {
    let layout = StaticLayout::b17();
    VehicleState::new(&Roster::b17(), layout.ordered_section_ids().to_vec(), config, seed)
}

#[test]
fn test_heavy_hit_destroys_and_ignites_tail() {
    let mut vehicle = create_vehicle(VehicleConfig::default(), 7);
    vehicle.apply_hit_to_section("Tail", 60.0, false, 0.0);
    assert_eq!(vehicle.section("Tail").unwrap().integrity(), 40.0);
    vehicle.drain_events();

    assert!(vehicle.apply_hit_to_section("Tail", 50.0, true, 1.0));

    let tail = vehicle.section("Tail").unwrap();
    assert_eq!(tail.integrity(), 0.0);
    assert!(tail.is_on_fire());
    assert!(vehicle.is_section_destroyed("Tail"));

    let events = vehicle.drain_events();
    assert!(events.contains(&VehicleEvent::SectionDamaged {
        section: "Tail".to_string(),
        integrity: 0.0,
    }));
    assert!(events.contains(&VehicleEvent::SectionDestroyed {
        section: "Tail".to_string(),
    }));
    assert!(events.contains(&VehicleEvent::FireStarted {
        section: "Tail".to_string(),
    }));
}

#[test]
fn test_destroyed_section_is_not_destroyed_twice() {
    let mut vehicle = create_vehicle(VehicleConfig::default(), 7);
    vehicle.apply_hit_to_section("Waist", 150.0, false, 0.0);
    vehicle.drain_events();

    vehicle.apply_hit_to_section("Waist", 20.0, false, 0.0);
    let events = vehicle.drain_events();
    assert!(!events
        .iter()
        .any(|e| matches!(e, VehicleEvent::SectionDestroyed { .. })));
}

#[test]
fn test_unknown_targets_are_no_ops() {
    let mut vehicle = create_vehicle(VehicleConfig::default(), 7);
    assert!(!vehicle.apply_hit_to_section("BallTurret", 10.0, true, 1.0));
    assert!(!vehicle.try_extinguish_fire("BallTurret"));
    assert!(!vehicle.try_repair_section("BallTurret", 10.0));
    assert!(!vehicle.try_repair_system("BallTurret", 10.0));
    assert!(!vehicle.feather_engine("Radio"));
    assert!(!vehicle.restart_engine("Radio"));
    assert!(vehicle.drain_events().is_empty());
}

#[test]
fn test_restart_success_rate_at_full_integrity() {
    let mut vehicle = create_vehicle(VehicleConfig::default(), 1943);
    let trials = 1000;
    let mut successes = 0;
    let mut failure_damages = Vec::new();

    for _ in 0..trials {
        vehicle.feather_engine("Engine1");
        if vehicle.restart_engine("Engine1") {
            successes += 1;
        }
        for event in vehicle.drain_events() {
            if let VehicleEvent::EngineRestartFailed {
                extra_damage: Some(damage),
                ..
            } = event
            {
                failure_damages.push(damage);
            }
        }

        let integrity = vehicle.system("Engine1").unwrap().integrity();
        if integrity < 100.0 {
            assert!((85.0..=95.0).contains(&integrity), "{integrity}");
            assert!(vehicle.try_repair_system("Engine1", 100.0));
        }
    }

    let rate = successes as f32 / trials as f32;
    assert!((rate - 0.75).abs() < 0.05, "success rate {rate}");

    // ~10% of ~250 failures.
    assert!(!failure_damages.is_empty());
    assert!(failure_damages.len() < 60);
    for damage in failure_damages {
        assert!((5.0..=15.0).contains(&damage), "{damage}");
    }
}

#[test]
fn test_fuel_exhaustion_feathers_every_engine_once() {
    let config = VehicleConfig {
        initial_fuel: 5.0,
        ..VehicleConfig::default()
    };
    let mut vehicle = create_vehicle(config, 3);

    vehicle.tick(10.0);
    vehicle.tick(10.0);
    assert_eq!(vehicle.fuel_remaining(), 0.0);
    assert!(vehicle.engines().all(|e| e.is_feathered()));

    let events = vehicle.drain_events();
    let feathered = events
        .iter()
        .filter(|e| matches!(e, VehicleEvent::EngineFeathered { .. }))
        .count();
    let exhausted = events
        .iter()
        .filter(|e| matches!(e, VehicleEvent::FuelExhausted))
        .count();
    assert_eq!(feathered, 4);
    assert_eq!(exhausted, 1);

    assert!(!vehicle.restart_engine("Engine3"));
}

#[test]
fn test_underpowered_bomber_descends_and_crashes_once() {
    let config = VehicleConfig {
        initial_altitude: 500.0,
        ..VehicleConfig::default()
    };
    let mut vehicle = create_vehicle(config, 3);
    vehicle.feather_engine("Engine1");
    vehicle.feather_engine("Engine4");

    vehicle.tick(5.0);
    assert_eq!(vehicle.altitude(), 300.0);
    assert!(!vehicle.is_crashed());

    for _ in 0..10 {
        vehicle.tick(5.0);
    }
    assert_eq!(vehicle.altitude(), 0.0);
    assert!(vehicle.is_crashed());
    let crashes = vehicle
        .drain_events()
        .iter()
        .filter(|e| matches!(e, VehicleEvent::Crashed))
        .count();
    assert_eq!(crashes, 1);
}

#[test]
fn test_housed_systems_share_section_damage() {
    let mut vehicle = create_vehicle(VehicleConfig::default(), 5);
    vehicle.apply_hit_to_section("RadioRoom", 60.0, false, 0.0);

    let radio = vehicle.system("Radio").unwrap();
    assert_eq!(radio.integrity(), 70.0);
    assert_eq!(radio.status(), SystemStatus::Operational);

    vehicle.apply_hit_to_section("RadioRoom", 60.0, false, 0.0);
    let radio = vehicle.system("Radio").unwrap();
    assert_eq!(radio.integrity(), 40.0);
    assert_eq!(radio.status(), SystemStatus::Damaged);
}

#[test]
fn test_status_follows_integrity_both_ways() {
    let mut vehicle = create_vehicle(VehicleConfig::default(), 5);
    vehicle.apply_engine_hit("Engine3", 26.0, 0.0);
    assert_eq!(vehicle.system("Engine3").unwrap().status(), SystemStatus::Damaged);

    vehicle.try_repair_system("Engine3", 1.0);
    assert_eq!(vehicle.system("Engine3").unwrap().status(), SystemStatus::Operational);

    vehicle.apply_engine_hit("Engine3", 500.0, 0.0);
    let engine = vehicle.system("Engine3").unwrap();
    assert_eq!(engine.integrity(), 0.0);
    assert_eq!(engine.status(), SystemStatus::Destroyed);
    assert!(!vehicle.try_repair_system("Engine3", 50.0));
}

#[test]
fn test_engine_fire_burns_until_extinguished() {
    let config = VehicleConfig {
        fire_damage_chance_per_second: 1.0,
        ..VehicleConfig::default()
    };
    let mut vehicle = create_vehicle(config, 11);
    vehicle.apply_engine_hit("Engine4", 0.0, 1.0);
    assert!(vehicle.system("Engine4").unwrap().is_on_fire());
    assert_eq!(
        vehicle.system("Engine4").unwrap().special(),
        SpecialCondition::OnFire
    );

    vehicle.tick(5.0);
    let burned = vehicle.system("Engine4").unwrap().integrity();
    assert!(burned < 100.0);

    assert!(vehicle.try_extinguish_fire("Engine4"));
    let engine = vehicle.system("Engine4").unwrap();
    let expected = if engine.status() == SystemStatus::Operational {
        SpecialCondition::None
    } else {
        SpecialCondition::Leaking
    };
    assert_eq!(engine.special(), expected);
    vehicle.tick(5.0);
    assert_eq!(vehicle.system("Engine4").unwrap().integrity(), burned);
}

#[test]
fn test_fire_blocks_paths_between_sections() {
    let mut vehicle = create_vehicle(VehicleConfig::default(), 5);
    vehicle.apply_hit_to_section("RadioRoom", 0.0, true, 1.0);

    assert!(vehicle.is_path_blocked_by_fire("Cockpit", "Tail", None));
    assert!(!vehicle.is_path_blocked_by_fire("Cockpit", "BombBay", None));
    assert!(vehicle.is_path_blocked_by_fire("BombBay", "RadioRoom", None));
    assert!(!vehicle.is_path_blocked_by_fire("BombBay", "RadioRoom", Some("RadioRoom")));
    assert!(!vehicle.is_path_blocked_by_fire("LeftWing", "Tail", None));

    vehicle.apply_hit_to_section("Tail", 0.0, true, 1.0);
    assert!(vehicle.is_crew_trapped_by_fire("Waist"));
    assert_eq!(vehicle.get_nearest_safe_adjacent_section("Waist"), None);
    assert_eq!(vehicle.get_nearest_safe_adjacent_section("BombBay"), Some("Cockpit"));
}

#[test]
fn test_sustained_fire_burns_section_out() {
    let config = VehicleConfig {
        fire_damage_per_second: 10.0,
        fire_damage_chance_per_second: 1.0,
        fire_spread_chance_per_second: 0.0,
        ..VehicleConfig::default()
    };
    let mut vehicle = create_vehicle(config, 9);
    vehicle.apply_hit_to_section("Nose", 0.0, true, 1.0);
    vehicle.drain_events();

    for _ in 0..12 {
        vehicle.tick(1.0);
    }

    assert_eq!(vehicle.section("Nose").unwrap().integrity(), 0.0);
    let events = vehicle.drain_events();
    let bands = events
        .iter()
        .filter(|e| matches!(e, VehicleEvent::SectionDamaged { section, .. } if section == "Nose"))
        .count();
    let destroyed = events
        .iter()
        .filter(|e| matches!(e, VehicleEvent::SectionDestroyed { .. }))
        .count();
    assert_eq!(bands, 10);
    assert_eq!(destroyed, 1);
}
