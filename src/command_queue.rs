//! Crew command intake.
//!
//! Commands arrive from outside the simulation (UI, script, wire), wait in a
//! bounded queue and are validated against the issuer once per step before
//! being handed to [`CrewState`] as actions.

use crate::config::CrewConfig;
use crate::crew::{ActionType, AssignRejection, CrewAction, CrewState, HealthStatus};
use crate::vehicle::VehicleState;
use heapless::spsc::Queue;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

// One slot of the ring stays empty, so this holds 31 commands.
const MAX_COMMAND_QUEUE_SIZE: usize = 32;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CrewCommand {
    Move {
        crew_id: String,
        station_id: String,
    },
    ManStation {
        crew_id: String,
        station_id: String,
    },
    ExtinguishFire {
        crew_id: String,
        section_id: String,
        #[serde(default)]
        duration: Option<f32>,
        #[serde(default)]
        success_chance: Option<f32>,
        #[serde(default)]
        uses_consumable: bool,
    },
    Repair {
        crew_id: String,
        #[serde(alias = "target_id")]
        system_id: String,
        #[serde(default)]
        duration: Option<f32>,
        #[serde(default)]
        success_chance: Option<f32>,
        #[serde(default)]
        uses_consumable: bool,
    },
    TreatInjury {
        medic_id: String,
        target_crew_id: String,
        #[serde(default)]
        duration: Option<f32>,
        #[serde(default)]
        success_chance: Option<f32>,
        #[serde(default)]
        uses_consumable: bool,
    },
    FeatherEngine {
        crew_id: String,
        engine_id: String,
    },
    RestartEngine {
        crew_id: String,
        engine_id: String,
    },
}

impl CrewCommand {
    /// Crew member the command is addressed to.
    pub fn issuer(&self) -> &str {
        match self {
            CrewCommand::Move { crew_id, .. }
            | CrewCommand::ManStation { crew_id, .. }
            | CrewCommand::ExtinguishFire { crew_id, .. }
            | CrewCommand::Repair { crew_id, .. }
            | CrewCommand::FeatherEngine { crew_id, .. }
            | CrewCommand::RestartEngine { crew_id, .. } => crew_id,
            CrewCommand::TreatInjury { medic_id, .. } => medic_id,
        }
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            CrewCommand::Move { .. } => ActionType::Move,
            CrewCommand::ManStation { .. } => ActionType::ManStation,
            CrewCommand::ExtinguishFire { .. } => ActionType::ExtinguishFire,
            CrewCommand::Repair { .. } => ActionType::Repair,
            CrewCommand::TreatInjury { .. } => ActionType::TreatInjury,
            CrewCommand::FeatherEngine { .. } => ActionType::FeatherEngine,
            CrewCommand::RestartEngine { .. } => ActionType::RestartEngine,
        }
    }

    /// Builds the crew action, filling unspecified durations from config.
    pub fn into_action(self, config: &CrewConfig) -> CrewAction {
        let tune = |action: CrewAction, success_chance: Option<f32>, uses_consumable: bool| {
            let action = action.with_consumable(uses_consumable);
            match success_chance {
                Some(chance) => action.with_success_chance(chance),
                None => action,
            }
        };

        match self {
            CrewCommand::Move { station_id, .. } => CrewAction::move_to(station_id, config.move_duration),
            CrewCommand::ManStation { station_id, .. } => {
                CrewAction::man_station(station_id, config.man_station_duration)
            }
            CrewCommand::ExtinguishFire {
                section_id,
                duration,
                success_chance,
                uses_consumable,
                ..
            } => tune(
                CrewAction::extinguish(section_id, duration.unwrap_or(config.extinguish_duration)),
                success_chance,
                uses_consumable,
            ),
            CrewCommand::Repair {
                system_id,
                duration,
                success_chance,
                uses_consumable,
                ..
            } => tune(
                CrewAction::repair(system_id, duration.unwrap_or(config.repair_duration)),
                success_chance,
                uses_consumable,
            ),
            CrewCommand::TreatInjury {
                target_crew_id,
                duration,
                success_chance,
                uses_consumable,
                ..
            } => tune(
                CrewAction::treat(target_crew_id, duration.unwrap_or(config.treat_duration)),
                success_chance,
                uses_consumable,
            ),
            CrewCommand::FeatherEngine { engine_id, .. } => {
                CrewAction::feather(engine_id, config.feather_duration)
            }
            CrewCommand::RestartEngine { engine_id, .. } => {
                CrewAction::restart(engine_id, config.restart_duration)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("command queue full")]
    QueueFull,
    #[error("unknown crew member {0}")]
    UnknownCrew(String),
    #[error("{crew} cannot take orders ({status:?})")]
    CrewNotHealthy { crew: String, status: HealthStatus },
    #[error("{crew} refused: {reason}")]
    Rejected {
        crew: String,
        #[source]
        reason: AssignRejection,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CommandEvent {
    Accepted { id: u32, crew: String, action: ActionType },
    Rejected { id: u32, crew: String, reason: String },
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: u32,
    pub accepted: u32,
    pub rejected: u32,
    pub dropped: u32,
}

#[derive(Debug)]
struct QueuedCommand {
    id: u32,
    command: CrewCommand,
}

#[derive(Debug)]
pub struct CommandQueue {
    pending: Queue<QueuedCommand, MAX_COMMAND_QUEUE_SIZE>,
    next_id: u32,
    stats: QueueStats,
    events: Vec<CommandEvent>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self {
            pending: Queue::new(),
            next_id: 1,
            stats: QueueStats::default(),
            events: Vec::new(),
        }
    }

    /// Queues a command under a fresh id.
    pub fn enqueue(&mut self, command: CrewCommand) -> Result<u32, CommandError> {
        let id = self.next_id;
        self.enqueue_with_id(id, command)?;
        self.next_id = self.next_id.wrapping_add(1);
        Ok(id)
    }

    /// Queues a command under a caller-chosen id (scripted or wire commands).
    pub fn enqueue_with_id(&mut self, id: u32, command: CrewCommand) -> Result<(), CommandError> {
        match self.pending.enqueue(QueuedCommand { id, command }) {
            Ok(()) => {
                self.stats.queued += 1;
                Ok(())
            }
            Err(rejected) => {
                self.stats.dropped += 1;
                warn!(id, crew = rejected.command.issuer(), "command queue full");
                Err(CommandError::QueueFull)
            }
        }
    }

    /// NACKs a command that never made it into the queue.
    pub fn record_rejection(&mut self, id: u32, crew: String, error: &CommandError) {
        debug!(id, crew = %crew, error = %error, "command nacked");
        self.events.push(CommandEvent::Rejected {
            id,
            crew,
            reason: error.to_string(),
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn get_stats(&self) -> &QueueStats {
        &self.stats
    }

    pub fn events(&self) -> &[CommandEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<CommandEvent> {
        std::mem::take(&mut self.events)
    }

    /// Checks the issuer and forwards one command to the crew.
    pub fn dispatch(
        command: CrewCommand,
        crew: &mut CrewState,
        vehicle: &VehicleState,
    ) -> Result<(), CommandError> {
        let issuer = command.issuer().to_string();
        let member = crew
            .member(&issuer)
            .ok_or_else(|| CommandError::UnknownCrew(issuer.clone()))?;
        if !member.is_healthy() {
            return Err(CommandError::CrewNotHealthy {
                crew: issuer,
                status: member.status(),
            });
        }

        let action = command.into_action(crew.config());
        crew.try_assign_action(&issuer, action, vehicle)
            .map_err(|reason| CommandError::Rejected {
                crew: issuer,
                reason,
            })
    }

    /// Drains every pending command through validation.
    pub fn tick(&mut self, crew: &mut CrewState, vehicle: &VehicleState) {
        while let Some(QueuedCommand { id, command }) = self.pending.dequeue() {
            let issuer = command.issuer().to_string();
            let action = command.action_type();
            match Self::dispatch(command, crew, vehicle) {
                Ok(()) => {
                    self.stats.accepted += 1;
                    debug!(id, crew = %issuer, ?action, "command accepted");
                    self.events.push(CommandEvent::Accepted {
                        id,
                        crew: issuer,
                        action,
                    });
                }
                Err(e) => {
                    self.stats.rejected += 1;
                    info!(id, crew = %issuer, error = %e, "command rejected");
                    self.events.push(CommandEvent::Rejected {
                        id,
                        crew: issuer,
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_json_shape() {
        let command: CrewCommand = serde_json::from_str(
            r#"{"type": "Repair", "crew_id": "Engineer", "target_id": "Engine2", "success_chance": 0.9}"#,
        )
        .unwrap();
        assert_eq!(command.issuer(), "Engineer");
        assert_eq!(
            command,
            CrewCommand::Repair {
                crew_id: "Engineer".to_string(),
                system_id: "Engine2".to_string(),
                duration: None,
                success_chance: Some(0.9),
                uses_consumable: false,
            }
        );
    }

    #[test]
    fn test_into_action_fills_defaults() {
        let config = CrewConfig::default();
        let action = CrewCommand::TreatInjury {
            medic_id: "Medic1".to_string(),
            target_crew_id: "Gunner2".to_string(),
            duration: None,
            success_chance: None,
            uses_consumable: true,
        }
        .into_action(&config);

        assert_eq!(action.action_type, ActionType::TreatInjury);
        assert_eq!(action.target_id, "Gunner2");
        assert_eq!(action.duration, config.treat_duration);
        assert!(action.uses_consumable);
        assert_eq!(action.success_chance, None);
    }

    #[test]
    fn test_queue_capacity() {
        let mut queue = CommandQueue::new();
        for _ in 0..MAX_COMMAND_QUEUE_SIZE - 1 {
            queue
                .enqueue(CrewCommand::FeatherEngine {
                    crew_id: "Pilot".to_string(),
                    engine_id: "Engine1".to_string(),
                })
                .unwrap();
        }
        assert_eq!(
            queue.enqueue(CrewCommand::FeatherEngine {
                crew_id: "Pilot".to_string(),
                engine_id: "Engine1".to_string(),
            }),
            Err(CommandError::QueueFull)
        );
        assert_eq!(queue.get_stats().dropped, 1);
    }
}
