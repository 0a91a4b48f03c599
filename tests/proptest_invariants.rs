//! Property-based tests for the vehicle, crew and hazard models.
//!
//! Random operation sequences are applied to a fresh bomber and the
//! structural invariants are checked after every step.

use bomber_sim::config::{CrewConfig, HazardConfig, VehicleConfig};
use bomber_sim::crew::{CrewAction, CrewState, LockKind};
use bomber_sim::hazard::HazardScheduler;
use bomber_sim::layout::{PositionService, StaticLayout};
use bomber_sim::roster::Roster;
use bomber_sim::vehicle::{wear_condition, SpecialCondition, StatusTable, VehicleState};
use proptest::prelude::*;
use std::sync::Arc;

const SECTIONS: [&str; 8] = [
    "Nose", "Cockpit", "BombBay", "RadioRoom", "Waist", "Tail", "LeftWing", "RightWing",
];
const ENGINES: [&str; 4] = ["Engine1", "Engine2", "Engine3", "Engine4"];
const SYSTEMS: [&str; 6] = ["Engine2", "Radio", "Bombsight", "WaistGuns", "TailGuns", "Oxygen"];
const CREW: [&str; 6] = ["Pilot", "Engineer", "Medic1", "Gunner1", "Gunner2", "TailGunner"];

fn create_world(seed: u64) -> (VehicleState, CrewState) {
    let roster = Roster::b17();
    let layout = Arc::new(StaticLayout::b17());
    let vehicle = VehicleState::new(
        &roster,
        layout.ordered_section_ids().to_vec(),
        VehicleConfig::default(),
        seed,
    );
    let crew = CrewState::new(&roster, CrewConfig::default(), layout, seed + 1);
    (vehicle, crew)
}

// ===========================================================================
// Generators
// ===========================================================================

#[derive(Debug, Clone)]
enum VehicleOp {
    Hit(usize, f32, bool),
    EngineHit(usize, f32),
    RepairSection(usize, f32),
    RepairSystem(usize, f32),
    Extinguish(usize),
    Feather(usize),
    Restart(usize),
    AdjustFuel(f32),
    Tick(f32),
}

fn arb_vehicle_ops(max_ops: usize) -> impl Strategy<Value = Vec<VehicleOp>> {
    proptest::collection::vec(
        prop_oneof![
            (0..SECTIONS.len(), -10.0f32..150.0, any::<bool>())
                .prop_map(|(s, d, f)| VehicleOp::Hit(s, d, f)),
            (0..ENGINES.len(), 0.0f32..80.0).prop_map(|(e, d)| VehicleOp::EngineHit(e, d)),
            (0..SECTIONS.len(), 0.0f32..60.0).prop_map(|(s, a)| VehicleOp::RepairSection(s, a)),
            (0..SYSTEMS.len(), 0.0f32..60.0).prop_map(|(s, a)| VehicleOp::RepairSystem(s, a)),
            (0..SECTIONS.len()).prop_map(VehicleOp::Extinguish),
            (0..ENGINES.len()).prop_map(VehicleOp::Feather),
            (0..ENGINES.len()).prop_map(VehicleOp::Restart),
            (-3000.0f32..3000.0).prop_map(VehicleOp::AdjustFuel),
            (0.0f32..30.0).prop_map(VehicleOp::Tick),
        ],
        1..=max_ops,
    )
}

#[derive(Debug, Clone)]
enum CrewOp {
    Repair(usize, usize),
    Extinguish(usize, usize),
    Treat(usize, usize),
    Cancel(usize),
    Wound(usize),
    Ignite(usize),
    Tick(f32),
}

fn arb_crew_ops(max_ops: usize) -> impl Strategy<Value = Vec<CrewOp>> {
    proptest::collection::vec(
        prop_oneof![
            (0..CREW.len(), 0..SECTIONS.len()).prop_map(|(c, s)| CrewOp::Repair(c, s)),
            (0..CREW.len(), 0..SECTIONS.len()).prop_map(|(c, s)| CrewOp::Extinguish(c, s)),
            (0..CREW.len(), 0..CREW.len()).prop_map(|(c, t)| CrewOp::Treat(c, t)),
            (0..CREW.len()).prop_map(CrewOp::Cancel),
            (0..CREW.len()).prop_map(CrewOp::Wound),
            (0..SECTIONS.len()).prop_map(CrewOp::Ignite),
            (0.05f32..3.0).prop_map(CrewOp::Tick),
        ],
        1..=max_ops,
    )
}

fn apply_vehicle_op(vehicle: &mut VehicleState, op: &VehicleOp) {
    match *op {
        VehicleOp::Hit(s, damage, fire) => {
            vehicle.apply_hit_to_section(SECTIONS[s], damage, fire, 0.5);
        }
        VehicleOp::EngineHit(e, damage) => {
            vehicle.apply_engine_hit(ENGINES[e], damage, 0.3);
        }
        VehicleOp::RepairSection(s, amount) => {
            vehicle.try_repair_section(SECTIONS[s], amount);
        }
        VehicleOp::RepairSystem(s, amount) => {
            vehicle.try_repair_system(SYSTEMS[s], amount);
        }
        VehicleOp::Extinguish(s) => {
            vehicle.try_extinguish_fire(SECTIONS[s]);
        }
        VehicleOp::Feather(e) => {
            vehicle.feather_engine(ENGINES[e]);
        }
        VehicleOp::Restart(e) => {
            vehicle.restart_engine(ENGINES[e]);
        }
        VehicleOp::AdjustFuel(delta) => vehicle.adjust_fuel(delta),
        VehicleOp::Tick(dt) => vehicle.tick(dt),
    }
}

fn assert_vehicle_invariants(vehicle: &VehicleState) -> Result<(), TestCaseError> {
    let table = StatusTable::default();
    for section in vehicle.sections() {
        prop_assert!((0.0..=100.0).contains(&section.integrity()), "{section:?}");
    }
    for system in vehicle.systems() {
        prop_assert!((0.0..=100.0).contains(&system.integrity()), "{system:?}");
        prop_assert_eq!(system.status(), table.status_for(system.kind(), system.integrity()));
        if system.is_on_fire() {
            prop_assert_eq!(system.special(), SpecialCondition::OnFire);
        } else {
            prop_assert_eq!(system.special(), wear_condition(system.kind(), system.status()));
        }
    }

    let config = vehicle.config();
    prop_assert!((0.0..=config.max_fuel).contains(&vehicle.fuel_remaining()));
    prop_assert!((0.0..=config.max_altitude).contains(&vehicle.altitude()));
    prop_assert!((0.0..=1.0).contains(&vehicle.total_engine_power()));
    if vehicle.is_crashed() {
        prop_assert_eq!(vehicle.altitude(), 0.0);
    }
    Ok(())
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Integrity, status, fuel and altitude stay consistent whatever happens.
    #[test]
    fn prop_vehicle_invariants_hold(seed in any::<u64>(), ops in arb_vehicle_ops(60)) {
        let (mut vehicle, _) = create_world(seed);
        for op in &ops {
            apply_vehicle_op(&mut vehicle, op);
            assert_vehicle_invariants(&vehicle)?;
        }
    }

    /// Every held lock belongs to exactly one running action, and vice versa.
    #[test]
    fn prop_locks_match_running_actions(seed in any::<u64>(), ops in arb_crew_ops(80)) {
        let (mut vehicle, mut crew) = create_world(seed);
        vehicle.apply_hit_to_section("Waist", 40.0, false, 0.0);
        vehicle.apply_hit_to_section("Nose", 40.0, false, 0.0);

        for op in &ops {
            match *op {
                CrewOp::Repair(c, s) => {
                    let _ = crew.try_assign_action(CREW[c], CrewAction::repair(SECTIONS[s], 2.0), &vehicle);
                }
                CrewOp::Extinguish(c, s) => {
                    let _ = crew.try_assign_action(CREW[c], CrewAction::extinguish(SECTIONS[s], 2.0), &vehicle);
                }
                CrewOp::Treat(c, t) => {
                    let _ = crew.try_assign_action(CREW[c], CrewAction::treat(CREW[t], 2.0), &vehicle);
                }
                CrewOp::Cancel(c) => {
                    crew.cancel_action(CREW[c], "test");
                }
                CrewOp::Wound(c) => {
                    crew.apply_injury(CREW[c], bomber_sim::crew::InjurySeverity::Light);
                }
                CrewOp::Ignite(s) => {
                    vehicle.apply_hit_to_section(SECTIONS[s], 0.0, true, 1.0);
                }
                CrewOp::Tick(dt) => {
                    crew.tick(dt, &mut vehicle);
                    vehicle.tick(dt);
                }
            }

            for kind in [LockKind::Treatment, LockKind::Extinguish, LockKind::Repair] {
                for key in crew.locks().held(kind) {
                    let holders = crew
                        .members()
                        .iter()
                        .filter_map(|m| m.current_action())
                        .filter(|a| a.lock() == Some((kind, key)))
                        .count();
                    prop_assert_eq!(holders, 1, "{:?} lock on {} has {} holders", kind, key, holders);
                }
            }
            for member in crew.members() {
                if let Some((kind, key)) = member.current_action().and_then(|a| a.lock()) {
                    prop_assert!(crew.locks().is_held(kind, key));
                }
                // A tick cancels whatever a wounded crew member was doing.
                if matches!(op, CrewOp::Tick(_)) && member.is_busy() {
                    prop_assert!(member.is_healthy(), "{} busy while {:?}", member.id(), member.status());
                }
            }
        }
    }

    /// Danger is bounded and never falls as the leg goes on when it is set to rise.
    #[test]
    fn prop_danger_monotone_and_bounded(
        a in -0.5f32..1.5,
        b in -0.5f32..1.5,
        steps in proptest::collection::vec(0.0f32..1.2, 2..40),
    ) {
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        let mut hazard = HazardScheduler::new(HazardConfig::default(), 9);
        hazard.configure_leg(start, end, None);

        let mut progress: Vec<f32> = steps;
        progress.sort_by(|x, y| x.total_cmp(y));
        let mut previous = f32::NEG_INFINITY;
        for p in progress {
            let danger = hazard.danger_at(p);
            prop_assert!((0.0..=1.0).contains(&danger));
            prop_assert!(danger >= previous - 1e-6);
            previous = danger;
        }
    }

    /// Sampled intervals never drop below the configured floor.
    #[test]
    fn prop_intervals_respect_floor(seed in any::<u64>(), draws in 1usize..200) {
        let mut hazard = HazardScheduler::new(HazardConfig::default(), seed);
        let floor = hazard.get_config().min_event_interval;
        for _ in 0..draws {
            let interval = hazard.sample_event_interval();
            prop_assert!(interval.is_finite());
            prop_assert!(interval >= floor);
        }
    }
}
