use bomber_sim::command_queue::*;
use bomber_sim::config::{CrewConfig, VehicleConfig};
use bomber_sim::crew::{ActionType, CrewState, HealthStatus, InjurySeverity};
use bomber_sim::layout::{PositionService, StaticLayout};
use bomber_sim::roster::Roster;
use bomber_sim::vehicle::VehicleState;
use std::sync::Arc;

fn create_world() -> (CrewState, VehicleState) {
    let roster = Roster::b17();
    let layout = Arc::new(StaticLayout::b17());
    let vehicle = VehicleState::new(
        &roster,
        layout.ordered_section_ids().to_vec(),
        VehicleConfig::default(),
        40,
    );
    let crew = CrewState::new(&roster, CrewConfig::default(), layout, 41);
    (crew, vehicle)
}

fn feather(crew_id: &str, engine_id: &str) -> CrewCommand {
    CrewCommand::FeatherEngine {
        crew_id: crew_id.to_string(),
        engine_id: engine_id.to_string(),
    }
}

#[test]
fn test_queue_dispatches_in_arrival_order() {
    let (mut crew, vehicle) = create_world();
    let mut queue = CommandQueue::new();

    let first = queue.enqueue(feather("Pilot", "Engine1")).unwrap();
    let second = queue.enqueue(feather("Pilot", "Engine2")).unwrap();
    let third = queue.enqueue(feather("CoPilot", "Engine2")).unwrap();
    assert_eq!((first, second, third), (1, 2, 3));
    assert_eq!(queue.len(), 3);

    queue.tick(&mut crew, &vehicle);
    assert!(queue.is_empty());

    let events = queue.drain_events();
    assert_eq!(events.len(), 3);
    assert_eq!(
        events[0],
        CommandEvent::Accepted {
            id: 1,
            crew: "Pilot".to_string(),
            action: ActionType::FeatherEngine,
        }
    );
    // Pilot is busy with the first order.
    assert!(matches!(&events[1], CommandEvent::Rejected { id: 2, crew, .. } if crew == "Pilot"));
    assert!(matches!(&events[2], CommandEvent::Accepted { id: 3, .. }));

    let stats = queue.get_stats();
    assert_eq!(stats.queued, 3);
    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.rejected, 1);
}

#[test]
fn test_unknown_and_unfit_issuers_rejected() {
    let (mut crew, vehicle) = create_world();
    crew.apply_injury("Engineer", InjurySeverity::Serious);

    assert_eq!(
        CommandQueue::dispatch(feather("Ghost", "Engine1"), &mut crew, &vehicle),
        Err(CommandError::UnknownCrew("Ghost".to_string()))
    );
    assert_eq!(
        CommandQueue::dispatch(feather("Engineer", "Engine1"), &mut crew, &vehicle),
        Err(CommandError::CrewNotHealthy {
            crew: "Engineer".to_string(),
            status: HealthStatus::Serious,
        })
    );
    assert!(crew.members().iter().all(|m| !m.is_busy()));
}

#[test]
fn test_rejection_carries_the_crew_reason() {
    let (mut crew, vehicle) = create_world();
    let mut queue = CommandQueue::new();
    queue
        .enqueue(CrewCommand::Repair {
            crew_id: "Engineer".to_string(),
            system_id: "Engine3".to_string(),
            duration: None,
            success_chance: None,
            uses_consumable: false,
        })
        .unwrap();

    queue.tick(&mut crew, &vehicle);

    match queue.drain_events().as_slice() {
        [CommandEvent::Rejected { reason, .. }] => {
            assert!(reason.contains("nothing to repair"), "{reason}");
        }
        other => panic!("unexpected events {other:?}"),
    }
}

#[test]
fn test_queue_defaults_come_from_crew_config() {
    let (mut crew, mut vehicle) = create_world();
    vehicle.apply_hit_to_section("Waist", 0.0, true, 1.0);

    let command: CrewCommand = serde_json::from_str(
        r#"{"type": "ExtinguishFire", "crew_id": "Gunner1", "section_id": "Waist", "uses_consumable": true}"#,
    )
    .unwrap();
    CommandQueue::dispatch(command, &mut crew, &vehicle).unwrap();

    let action = crew.member("Gunner1").unwrap().current_action().unwrap();
    assert_eq!(action.action_type, ActionType::ExtinguishFire);
    assert_eq!(action.duration, CrewConfig::default().extinguish_duration);
    assert!(action.uses_consumable);
}

#[test]
fn test_full_queue_counts_drops() {
    let mut queue = CommandQueue::new();
    let mut accepted = 0;
    let mut dropped = 0;
    for _ in 0..40 {
        match queue.enqueue(feather("Pilot", "Engine1")) {
            Ok(_) => accepted += 1,
            Err(CommandError::QueueFull) => dropped += 1,
            Err(e) => panic!("unexpected error {e}"),
        }
    }

    assert_eq!(accepted, 31);
    assert_eq!(dropped, 9);
    assert_eq!(queue.get_stats().dropped, 9);
    assert_eq!(queue.len(), 31);
}
