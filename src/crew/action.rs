use crate::config::ConsumableStock;
use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionType {
    Idle,
    Move,
    ExtinguishFire,
    Repair,
    TreatInjury,
    ManStation,
    FeatherEngine,
    RestartEngine,
}

impl ActionType {
    pub fn lock_kind(self) -> Option<LockKind> {
        match self {
            Self::ExtinguishFire => Some(LockKind::Extinguish),
            Self::Repair => Some(LockKind::Repair),
            Self::TreatInjury => Some(LockKind::Treatment),
            _ => None,
        }
    }

    pub fn consumable(self) -> Option<ConsumableKind> {
        match self {
            Self::ExtinguishFire => Some(ConsumableKind::Extinguisher),
            Self::Repair => Some(ConsumableKind::RepairKit),
            Self::TreatInjury => Some(ConsumableKind::MedicalKit),
            _ => None,
        }
    }

    /// Worked from the crew member's own station, without walking anywhere.
    pub fn is_in_place(self) -> bool {
        matches!(self, Self::Idle | Self::FeatherEngine | Self::RestartEngine)
    }
}

/// Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionPhase {
    MoveToTarget,
    Performing,
    Returning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrewAction {
    pub action_type: ActionType,
    pub target_id: String,
    pub duration: f32,
    pub success_chance: Option<f32>,
    pub uses_consumable: bool,
    pub repair_amount: Option<f32>,
    pub(crate) elapsed: f32,
    pub(crate) phase: ActionPhase,
    pub(crate) target_position: Vec2,
    pub(crate) return_position: Vec2,
    pub(crate) travel_seconds: f32,
    pub(crate) lock: Option<(LockKind, String)>,
    pub(crate) outcome: Option<bool>,
}

impl CrewAction {
    pub fn new(action_type: ActionType, target_id: impl Into<String>, duration: f32) -> Self {
        Self {
            action_type,
            target_id: target_id.into(),
            duration,
            success_chance: None,
            uses_consumable: false,
            repair_amount: None,
            elapsed: 0.0,
            phase: ActionPhase::MoveToTarget,
            target_position: Vec2::ZERO,
            return_position: Vec2::ZERO,
            travel_seconds: 0.0,
            lock: None,
            outcome: None,
        }
    }

    pub fn move_to(station_id: impl Into<String>, duration: f32) -> Self {
        Self::new(ActionType::Move, station_id, duration)
    }

    pub fn man_station(station_id: impl Into<String>, duration: f32) -> Self {
        Self::new(ActionType::ManStation, station_id, duration)
    }

    pub fn extinguish(target_id: impl Into<String>, duration: f32) -> Self {
        Self::new(ActionType::ExtinguishFire, target_id, duration)
    }

    pub fn repair(target_id: impl Into<String>, duration: f32) -> Self {
        Self::new(ActionType::Repair, target_id, duration)
    }

    pub fn treat(target_crew_id: impl Into<String>, duration: f32) -> Self {
        Self::new(ActionType::TreatInjury, target_crew_id, duration)
    }

    pub fn feather(engine_id: impl Into<String>, duration: f32) -> Self {
        Self::new(ActionType::FeatherEngine, engine_id, duration)
    }

    pub fn restart(engine_id: impl Into<String>, duration: f32) -> Self {
        Self::new(ActionType::RestartEngine, engine_id, duration)
    }

    pub fn with_success_chance(mut self, chance: f32) -> Self {
        self.success_chance = Some(chance);
        self
    }

    pub fn with_consumable(mut self, uses_consumable: bool) -> Self {
        self.uses_consumable = uses_consumable;
        self
    }

    pub fn with_repair_amount(mut self, amount: f32) -> Self {
        self.repair_amount = Some(amount);
        self
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn phase(&self) -> ActionPhase {
        self.phase
    }

    pub fn target_position(&self) -> Vec2 {
        self.target_position
    }

    pub fn return_position(&self) -> Vec2 {
        self.return_position
    }

    /// Lock taken at assignment, released with the action.
    pub fn lock(&self) -> Option<(LockKind, &str)> {
        self.lock.as_ref().map(|(kind, key)| (*kind, key.as_str()))
    }

    /// Moves to `next` and resets the phase clocks. Refuses to go backwards.
    pub(crate) fn advance_phase(&mut self, next: ActionPhase) -> bool {
        if next <= self.phase {
            return false;
        }
        self.phase = next;
        self.elapsed = 0.0;
        self.travel_seconds = 0.0;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockKind {
    Treatment,
    Extinguish,
    Repair,
}

/// One target may be worked by one crew member per kind of job.
#[derive(Debug, Clone, Default)]
pub struct TargetLocks {
    treated: HashSet<String>,
    extinguishing: HashSet<String>,
    repairing: HashSet<String>,
}

impl TargetLocks {
    fn set(&self, kind: LockKind) -> &HashSet<String> {
        match kind {
            LockKind::Treatment => &self.treated,
            LockKind::Extinguish => &self.extinguishing,
            LockKind::Repair => &self.repairing,
        }
    }

    fn set_mut(&mut self, kind: LockKind) -> &mut HashSet<String> {
        match kind {
            LockKind::Treatment => &mut self.treated,
            LockKind::Extinguish => &mut self.extinguishing,
            LockKind::Repair => &mut self.repairing,
        }
    }

    pub fn is_held(&self, kind: LockKind, key: &str) -> bool {
        self.set(kind).contains(key)
    }

    pub fn held(&self, kind: LockKind) -> impl Iterator<Item = &str> {
        self.set(kind).iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.treated.is_empty() && self.extinguishing.is_empty() && self.repairing.is_empty()
    }

    pub(crate) fn try_acquire(&mut self, kind: LockKind, key: &str) -> bool {
        self.set_mut(kind).insert(key.to_string())
    }

    pub(crate) fn release(&mut self, kind: LockKind, key: &str) -> bool {
        self.set_mut(kind).remove(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumableKind {
    Extinguisher,
    MedicalKit,
    RepairKit,
}

/// Crew-wide supplies shared by every action that asks for one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consumables {
    pub extinguishers: u32,
    pub medical_kits: u32,
    pub repair_kits: u32,
}

impl From<ConsumableStock> for Consumables {
    fn from(stock: ConsumableStock) -> Self {
        Self {
            extinguishers: stock.extinguishers,
            medical_kits: stock.medical_kits,
            repair_kits: stock.repair_kits,
        }
    }
}

impl Consumables {
    fn slot(&mut self, kind: ConsumableKind) -> &mut u32 {
        match kind {
            ConsumableKind::Extinguisher => &mut self.extinguishers,
            ConsumableKind::MedicalKit => &mut self.medical_kits,
            ConsumableKind::RepairKit => &mut self.repair_kits,
        }
    }

    pub fn available(&self, kind: ConsumableKind) -> u32 {
        match kind {
            ConsumableKind::Extinguisher => self.extinguishers,
            ConsumableKind::MedicalKit => self.medical_kits,
            ConsumableKind::RepairKit => self.repair_kits,
        }
    }

    pub fn try_spend(&mut self, kind: ConsumableKind) -> bool {
        let slot = self.slot(kind);
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }

    pub fn restock(&mut self, kind: ConsumableKind, amount: u32) {
        let slot = self.slot(kind);
        *slot = slot.saturating_add(amount);
    }
}
