//! Crew roster, injury timeline and the per-member action state machine.
//!
//! An action walks `MoveToTarget -> Performing -> Returning` and is then
//! cleared. Effects land on the [`VehicleState`] (or on another crew member)
//! at the end of `Performing`. Jobs on a shared target are serialised through
//! [`TargetLocks`]: a lock is taken when an action is accepted and released
//! exactly once when it completes or is cancelled.

mod action;
mod member;

pub use action::{
    ActionPhase, ActionType, ConsumableKind, Consumables, CrewAction, LockKind, TargetLocks,
};
pub use member::{CrewMember, CrewRole, HealthStatus, InjurySeverity, VisualState};

use crate::config::CrewConfig;
use crate::layout::PositionService;
use crate::roster::Roster;
use crate::vehicle::VehicleState;
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CrewEvent {
    ActionAssigned { crew: String, action: ActionType, target: String },
    ActionPhaseChanged { crew: String, action: ActionType, phase: ActionPhase },
    ActionCompleted { crew: String, action: ActionType, target: String, success: bool },
    ActionCancelled { crew: String, action: ActionType, target: String, reason: String },
    InjuryStageChanged { crew: String, from: HealthStatus, to: HealthStatus },
    CrewDied { crew: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssignRejection {
    #[error("unknown crew member {0}")]
    UnknownCrew(String),
    #[error("{0} is dead")]
    CrewDead(String),
    #[error("{crew} is not fit for duty ({status:?})")]
    CrewNotHealthy { crew: String, status: HealthStatus },
    #[error("{0} already has an action")]
    CrewBusy(String),
    #[error("unknown target {0}")]
    UnknownTarget(String),
    #[error("{target} is already taken for {kind:?}")]
    TargetLocked { target: String, kind: LockKind },
    #[error("section {0} is on fire")]
    SectionOnFire(String),
    #[error("nothing to repair at {0}")]
    NothingToRepair(String),
    #[error("{0} does not need treatment")]
    TargetNotInjured(String),
    #[error("{0} is trapped by fire")]
    CrewTrapped(String),
    #[error("path from {from} to {to} is blocked by fire")]
    PathBlocked { from: String, to: String },
    #[error("out of {0:?}")]
    OutOfConsumables(ConsumableKind),
    #[error("invalid action: {0}")]
    InvalidAction(String),
}

struct ResolvedTarget {
    section: Option<String>,
    position: Vec2,
    lock_key: Option<String>,
}

#[derive(Debug)]
pub struct CrewState {
    config: CrewConfig,
    members: Vec<CrewMember>,
    station_sections: HashMap<String, String>,
    positions: Arc<dyn PositionService>,
    locks: TargetLocks,
    consumables: Consumables,
    rng: ChaCha8Rng,
    events: Vec<CrewEvent>,
}

impl CrewState {
    pub fn new(
        roster: &Roster,
        config: CrewConfig,
        positions: Arc<dyn PositionService>,
        seed: u64,
    ) -> Self {
        let station_sections: HashMap<String, String> = roster
            .stations
            .iter()
            .map(|s| (s.id.clone(), s.section_id.clone()))
            .collect();

        let members = roster
            .crew
            .iter()
            .map(|def| {
                let home = positions
                    .station_position(&def.station_id)
                    .or_else(|| {
                        station_sections
                            .get(&def.station_id)
                            .and_then(|section| positions.section_position(section))
                    })
                    .unwrap_or_else(|| {
                        warn!(crew = %def.id, station = %def.station_id, "no position for home station");
                        Vec2::ZERO
                    });
                CrewMember {
                    id: def.id.clone(),
                    name: def.name.clone(),
                    role: def.role,
                    status: HealthStatus::Healthy,
                    current_station_id: def.station_id.clone(),
                    current_action: None,
                    injury_timer: 0.0,
                    home_position: home,
                    current_position: home,
                    move_speed: def.move_speed.unwrap_or(config.default_move_speed),
                    visual_state: VisualState::IdleAtStation,
                }
            })
            .collect();

        Self {
            consumables: config.consumables.into(),
            config,
            members,
            station_sections,
            positions,
            locks: TargetLocks::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &CrewConfig {
        &self.config
    }

    pub fn update_config(&mut self, config: CrewConfig) {
        self.config = config;
    }

    pub fn members(&self) -> &[CrewMember] {
        &self.members
    }

    pub fn member(&self, id: &str) -> Option<&CrewMember> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Section the crew member's current station sits in.
    pub fn member_section(&self, id: &str) -> Option<&str> {
        let member = self.member(id)?;
        self.station_sections
            .get(&member.current_station_id)
            .map(String::as_str)
    }

    pub fn healthy_crew_ids(&self) -> Vec<String> {
        self.members
            .iter()
            .filter(|m| m.is_healthy())
            .map(|m| m.id.clone())
            .collect()
    }

    pub fn locks(&self) -> &TargetLocks {
        &self.locks
    }

    pub fn consumables(&self) -> &Consumables {
        &self.consumables
    }

    pub fn consumables_mut(&mut self) -> &mut Consumables {
        &mut self.consumables
    }

    pub fn events(&self) -> &[CrewEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<CrewEvent> {
        std::mem::take(&mut self.events)
    }

    /// Is the crew member's section cut off by fire on every side?
    pub fn is_crew_trapped(&self, id: &str, vehicle: &VehicleState) -> bool {
        self.member_section(id)
            .map(|section| vehicle.is_crew_trapped_by_fire(section))
            .unwrap_or(false)
    }

    fn member_index(&self, id: &str) -> Option<usize> {
        self.members.iter().position(|m| m.id == id)
    }

    /// Injures a crew member. A lighter wound never downgrades a worse one.
    pub fn apply_injury(&mut self, id: &str, severity: InjurySeverity) -> bool {
        let Some(idx) = self.member_index(id) else {
            return false;
        };
        let member = &mut self.members[idx];
        if member.status == HealthStatus::Dead {
            return false;
        }

        let next = HealthStatus::from(severity);
        if member.status.is_worse_than(next) {
            debug!(crew = id, ?severity, status = ?member.status, "injury absorbed by worse wound");
            return true;
        }

        let from = member.status;
        member.status = next;
        member.injury_timer = next.stage_seconds(&self.config);
        warn!(crew = id, ?from, to = ?next, "crew injured");
        self.events.push(CrewEvent::InjuryStageChanged {
            crew: id.to_string(),
            from,
            to: next,
        });
        true
    }

    /// One stage of treatment toward Healthy. No-op on Healthy or Dead.
    pub fn try_heal_crew(&mut self, id: &str) -> bool {
        let Some(idx) = self.member_index(id) else {
            return false;
        };
        let member = &mut self.members[idx];
        let Some(next) = member.status.healed() else {
            return false;
        };

        let from = member.status;
        member.status = next;
        member.injury_timer = next.stage_seconds(&self.config);
        info!(crew = id, ?from, to = ?next, "crew treated");
        self.events.push(CrewEvent::InjuryStageChanged {
            crew: id.to_string(),
            from,
            to: next,
        });
        true
    }

    /// Validates and starts an action. Nothing is mutated on rejection.
    pub fn try_assign_action(
        &mut self,
        crew_id: &str,
        mut action: CrewAction,
        vehicle: &VehicleState,
    ) -> Result<(), AssignRejection> {
        let idx = self
            .member_index(crew_id)
            .ok_or_else(|| AssignRejection::UnknownCrew(crew_id.to_string()))?;

        let member = &self.members[idx];
        match member.status {
            HealthStatus::Healthy => {}
            HealthStatus::Dead => return Err(AssignRejection::CrewDead(crew_id.to_string())),
            status => {
                return Err(AssignRejection::CrewNotHealthy {
                    crew: crew_id.to_string(),
                    status,
                })
            }
        }
        if member.is_busy() {
            return Err(AssignRejection::CrewBusy(crew_id.to_string()));
        }
        Self::check_parameters(&action)?;

        let action_type = action.action_type;
        let target = self.resolve_target(idx, &action, vehicle)?;

        let lock = match (action_type.lock_kind(), target.lock_key) {
            (Some(kind), Some(key)) => {
                if self.locks.is_held(kind, &key) {
                    return Err(AssignRejection::TargetLocked { target: key, kind });
                }
                Some((kind, key))
            }
            _ => None,
        };

        if action.uses_consumable {
            if let Some(kind) = action_type.consumable() {
                if self.consumables.available(kind) == 0 {
                    return Err(AssignRejection::OutOfConsumables(kind));
                }
            }
        }

        if !action_type.is_in_place() {
            let extinguish_target =
                (action_type == ActionType::ExtinguishFire).then_some(action.target_id.as_str());
            self.check_route(idx, extinguish_target, target.section.as_deref(), vehicle)?;
        }

        // Accepted from here on.
        if action_type == ActionType::Repair && action.repair_amount.is_none() {
            action.repair_amount = Some(self.config.repair.sample(&mut self.rng));
        }
        if let Some((kind, key)) = &lock {
            self.locks.try_acquire(*kind, key);
        }

        let member = &mut self.members[idx];
        let already_there =
            member.current_position.distance(target.position) <= self.config.arrival_threshold;
        action.phase = if action_type.is_in_place() || already_there {
            ActionPhase::Performing
        } else {
            ActionPhase::MoveToTarget
        };
        action.elapsed = 0.0;
        action.travel_seconds = 0.0;
        action.outcome = None;
        action.target_position = target.position;
        action.return_position = member.home_position;
        action.lock = lock;

        member.visual_state = match action.phase {
            ActionPhase::MoveToTarget => VisualState::Moving,
            _ => VisualState::Working,
        };
        info!(crew = crew_id, action = ?action_type, target = %action.target_id, phase = ?action.phase, "action assigned");
        self.events.push(CrewEvent::ActionAssigned {
            crew: crew_id.to_string(),
            action: action_type,
            target: action.target_id.clone(),
        });
        member.current_action = Some(action);
        Ok(())
    }

    fn check_parameters(action: &CrewAction) -> Result<(), AssignRejection> {
        if !action.duration.is_finite() || action.duration < 0.0 {
            return Err(AssignRejection::InvalidAction(format!(
                "duration {} must be finite and non-negative",
                action.duration
            )));
        }
        if let Some(chance) = action.success_chance {
            if !(0.0..=1.0).contains(&chance) {
                return Err(AssignRejection::InvalidAction(format!(
                    "success chance {chance} must be within [0, 1]"
                )));
            }
        }
        if let Some(amount) = action.repair_amount {
            if !amount.is_finite() || amount < 0.0 {
                return Err(AssignRejection::InvalidAction(format!(
                    "repair amount {amount} must be finite and non-negative"
                )));
            }
        }
        Ok(())
    }

    fn resolve_target(
        &self,
        idx: usize,
        action: &CrewAction,
        vehicle: &VehicleState,
    ) -> Result<ResolvedTarget, AssignRejection> {
        let target_id = action.target_id.as_str();
        let unknown = || AssignRejection::UnknownTarget(target_id.to_string());
        let member = &self.members[idx];

        let section_target = |section: &str, lock_key: Option<String>| {
            self.positions
                .section_position(section)
                .map(|position| ResolvedTarget {
                    section: Some(section.to_string()),
                    position,
                    lock_key,
                })
                .ok_or_else(unknown)
        };

        match action.action_type {
            ActionType::Idle => Ok(ResolvedTarget {
                section: None,
                position: member.current_position,
                lock_key: None,
            }),
            ActionType::FeatherEngine | ActionType::RestartEngine => {
                let is_engine = vehicle.system(target_id).map(|s| s.is_engine()).unwrap_or(false);
                if !is_engine {
                    return Err(unknown());
                }
                Ok(ResolvedTarget {
                    section: None,
                    position: member.current_position,
                    lock_key: None,
                })
            }
            ActionType::Move | ActionType::ManStation => {
                let section = self.station_sections.get(target_id).ok_or_else(unknown)?;
                let position = self.positions.station_position(target_id).ok_or_else(unknown)?;
                Ok(ResolvedTarget {
                    section: Some(section.clone()),
                    position,
                    lock_key: None,
                })
            }
            ActionType::ExtinguishFire => {
                let section = if vehicle.section(target_id).is_some() {
                    target_id
                } else {
                    match vehicle.system(target_id) {
                        Some(engine) if engine.is_engine() => engine.section_id(),
                        _ => return Err(unknown()),
                    }
                };
                section_target(section, Some(target_id.to_string()))
            }
            ActionType::Repair => {
                let section = vehicle.owning_section(target_id).ok_or_else(unknown)?;
                if vehicle.is_section_on_fire(section) {
                    return Err(AssignRejection::SectionOnFire(section.to_string()));
                }
                let section_full = vehicle
                    .section(section)
                    .map(|s| s.integrity() >= 100.0)
                    .unwrap_or(true);
                let system_needs_repair =
                    vehicle.system(target_id).is_some() && vehicle.needs_repair(target_id);
                if section_full && !system_needs_repair {
                    return Err(AssignRejection::NothingToRepair(target_id.to_string()));
                }
                section_target(section, Some(section.to_string()))
            }
            ActionType::TreatInjury => {
                let patient = self.member(target_id).ok_or_else(unknown)?;
                if matches!(patient.status, HealthStatus::Healthy | HealthStatus::Dead) {
                    return Err(AssignRejection::TargetNotInjured(target_id.to_string()));
                }
                Ok(ResolvedTarget {
                    section: self.station_sections.get(&patient.current_station_id).cloned(),
                    position: patient.current_position,
                    lock_key: Some(target_id.to_string()),
                })
            }
        }
    }

    fn check_route(
        &self,
        idx: usize,
        extinguish_target: Option<&str>,
        target_section: Option<&str>,
        vehicle: &VehicleState,
    ) -> Result<(), AssignRejection> {
        let member = &self.members[idx];
        let (Some(from), Some(to)) = (
            self.station_sections.get(&member.current_station_id),
            target_section,
        ) else {
            return Ok(());
        };
        if from == to {
            return Ok(());
        }

        if extinguish_target.is_none() && vehicle.is_crew_trapped_by_fire(from) {
            return Err(AssignRejection::CrewTrapped(member.id.clone()));
        }
        if vehicle.is_path_blocked_by_fire(from, to, extinguish_target) {
            return Err(AssignRejection::PathBlocked {
                from: from.clone(),
                to: to.to_string(),
            });
        }
        Ok(())
    }

    /// Drops a crew member's action, snapping them home. False if idle.
    pub fn cancel_action(&mut self, crew_id: &str, reason: &str) -> bool {
        match self.member_index(crew_id) {
            Some(idx) => self.cancel_at(idx, reason),
            None => false,
        }
    }

    fn cancel_at(&mut self, idx: usize, reason: &str) -> bool {
        let member = &mut self.members[idx];
        let Some(action) = member.current_action.take() else {
            return false;
        };
        member.current_position = member.home_position;
        member.visual_state = VisualState::IdleAtStation;
        if let Some((kind, key)) = &action.lock {
            self.locks.release(*kind, key);
        }

        warn!(crew = %member.id, action = ?action.action_type, reason, "action cancelled");
        self.events.push(CrewEvent::ActionCancelled {
            crew: member.id.clone(),
            action: action.action_type,
            target: action.target_id,
            reason: reason.to_string(),
        });
        true
    }

    /// Injury timers, then interruptions, then one phase step per busy member.
    pub fn tick(&mut self, dt: f32, vehicle: &mut VehicleState) {
        if dt <= 0.0 {
            return;
        }
        self.tick_injuries(dt);

        for idx in 0..self.members.len() {
            let member = &self.members[idx];
            if member.is_busy() && !member.is_healthy() {
                let reason = format!("{} is {:?}", member.id, member.status);
                self.cancel_at(idx, &reason);
            }
        }

        for idx in 0..self.members.len() {
            self.process_action(idx, dt, vehicle);
        }
    }

    fn tick_injuries(&mut self, dt: f32) {
        for member in &mut self.members {
            if !member.status.is_injured() {
                continue;
            }
            member.injury_timer -= dt;
            if member.injury_timer > 0.0 {
                continue;
            }

            let from = member.status;
            let Some(next) = from.escalated() else {
                continue;
            };
            member.status = next;
            member.injury_timer = next.stage_seconds(&self.config);
            warn!(crew = %member.id, ?from, to = ?next, "injury worsened");
            self.events.push(CrewEvent::InjuryStageChanged {
                crew: member.id.clone(),
                from,
                to: next,
            });
            if next == HealthStatus::Dead {
                warn!(crew = %member.id, "crew member died");
                self.events.push(CrewEvent::CrewDied {
                    crew: member.id.clone(),
                });
            }
        }
    }

    fn process_action(&mut self, idx: usize, dt: f32, vehicle: &mut VehicleState) {
        let Some(mut action) = self.members[idx].current_action.take() else {
            return;
        };

        let finished = match action.phase {
            ActionPhase::MoveToTarget => {
                if self.step_towards(idx, action.target_position, dt, &mut action.travel_seconds) {
                    self.enter_phase(idx, &mut action, ActionPhase::Performing);
                }
                false
            }
            ActionPhase::Performing => {
                action.elapsed = (action.elapsed + dt).min(action.duration);
                if action.elapsed >= action.duration {
                    let success = self.apply_effect(idx, &mut action, vehicle);
                    action.outcome = Some(success);
                    self.enter_phase(idx, &mut action, ActionPhase::Returning);
                }
                false
            }
            ActionPhase::Returning => {
                self.step_towards(idx, action.return_position, dt, &mut action.travel_seconds)
            }
        };

        if finished {
            self.finish_action(idx, action);
        } else {
            self.members[idx].current_action = Some(action);
        }
    }

    fn enter_phase(&mut self, idx: usize, action: &mut CrewAction, next: ActionPhase) {
        if !action.advance_phase(next) {
            return;
        }
        let member = &mut self.members[idx];
        member.visual_state = match next {
            ActionPhase::Performing => VisualState::Working,
            _ => VisualState::Moving,
        };
        debug!(crew = %member.id, action = ?action.action_type, phase = ?next, "action phase");
        self.events.push(CrewEvent::ActionPhaseChanged {
            crew: member.id.clone(),
            action: action.action_type,
            phase: next,
        });
    }

    fn finish_action(&mut self, idx: usize, action: CrewAction) {
        if let Some((kind, key)) = &action.lock {
            self.locks.release(*kind, key);
        }
        let member = &mut self.members[idx];
        member.visual_state = VisualState::IdleAtStation;

        let success = action.outcome.unwrap_or(false);
        info!(crew = %member.id, action = ?action.action_type, target = %action.target_id, success, "action completed");
        self.events.push(CrewEvent::ActionCompleted {
            crew: member.id.clone(),
            action: action.action_type,
            target: action.target_id,
            success,
        });
    }

    /// Walks a crew member toward `target`. True once they are there.
    ///
    /// Each step covers at least `min_move_step`, and a leg that has taken
    /// longer than `max_travel_seconds` snaps to the destination.
    fn step_towards(&mut self, idx: usize, target: Vec2, dt: f32, travel_seconds: &mut f32) -> bool {
        let threshold = self.config.arrival_threshold;
        let member = &mut self.members[idx];
        *travel_seconds += dt;

        let offset = target - member.current_position;
        let distance = offset.length();
        if distance <= threshold {
            member.current_position = target;
            return true;
        }
        if *travel_seconds >= self.config.max_travel_seconds {
            warn!(crew = %member.id, distance, "movement stalled, snapping to destination");
            member.current_position = target;
            return true;
        }

        let step = (member.move_speed * dt).max(self.config.min_move_step);
        if step >= distance {
            member.current_position = target;
            return true;
        }
        member.current_position += offset / distance * step;
        trace!(crew = %member.id, remaining = distance - step, "moving");
        target.distance(member.current_position) <= threshold
    }

    /// Applies what the action was for. Returns whether it took effect.
    fn apply_effect(&mut self, idx: usize, action: &mut CrewAction, vehicle: &mut VehicleState) -> bool {
        if action.uses_consumable {
            if let Some(kind) = action.action_type.consumable() {
                if !self.consumables.try_spend(kind) {
                    debug!(?kind, "consumable ran out before use");
                    return false;
                }
            }
        }

        if let Some(chance) = action.success_chance {
            if self.rng.gen::<f32>() >= chance {
                debug!(crew = %self.members[idx].id, action = ?action.action_type, "attempt failed");
                return false;
            }
        }

        let target = action.target_id.as_str();
        match action.action_type {
            ActionType::Idle => true,
            ActionType::Move | ActionType::ManStation => {
                let Some(position) = self.positions.station_position(target) else {
                    return false;
                };
                let member = &mut self.members[idx];
                member.current_station_id = target.to_string();
                member.home_position = position;
                action.return_position = position;
                true
            }
            ActionType::ExtinguishFire => vehicle.try_extinguish_fire(target),
            ActionType::Repair => {
                let amount = action.repair_amount.unwrap_or(self.config.repair.mean);
                if vehicle.system(target).is_some() {
                    vehicle.try_repair_system(target, amount)
                } else {
                    vehicle.try_repair_section(target, amount)
                }
            }
            ActionType::TreatInjury => self.try_heal_crew(target),
            ActionType::FeatherEngine => vehicle.feather_engine(target),
            ActionType::RestartEngine => vehicle.restart_engine(target),
        }
    }
}
