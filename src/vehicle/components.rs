use crate::config::VehicleConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemKind {
    Engine,
    Gun,
    Radio,
    NavigatorStation,
    Bombsight,
    Oxygen,
    Hydraulics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemStatus {
    Operational,
    Damaged,
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialCondition {
    None,
    OnFire,
    Leaking,
    Jammed,
}

/// Integrity cut-offs that decide a system's status.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusTable {
    pub engine_damaged_below: f32,
    pub system_damaged_below: f32,
    pub destroyed_at_or_below: f32,
}

impl StatusTable {
    pub fn from_config(config: &VehicleConfig) -> Self {
        Self {
            engine_damaged_below: config.engine_damaged_below,
            system_damaged_below: config.system_damaged_below,
            destroyed_at_or_below: config.destroyed_threshold,
        }
    }

    pub fn status_for(&self, kind: SystemKind, integrity: f32) -> SystemStatus {
        let damaged_below = match kind {
            SystemKind::Engine => self.engine_damaged_below,
            _ => self.system_damaged_below,
        };

        if integrity <= self.destroyed_at_or_below {
            SystemStatus::Destroyed
        } else if integrity < damaged_below {
            SystemStatus::Damaged
        } else {
            SystemStatus::Operational
        }
    }
}

impl Default for StatusTable {
    fn default() -> Self {
        Self::from_config(&VehicleConfig::default())
    }
}

/// Ten-point integrity band, used to decide when fire damage is worth reporting.
pub fn threshold_band(integrity: f32) -> i32 {
    ((integrity / 10.0).floor() as i32) * 10
}

/// Integrity after `damage`, floored at `floor` and capped at 100.
/// Lasting condition of a system that is not on fire. Damaged engines and
/// plumbing leak, damaged guns jam.
pub fn wear_condition(kind: SystemKind, status: SystemStatus) -> SpecialCondition {
    match (kind, status) {
        (_, SystemStatus::Operational) => SpecialCondition::None,
        (SystemKind::Engine | SystemKind::Oxygen | SystemKind::Hydraulics, _) => {
            SpecialCondition::Leaking
        }
        (SystemKind::Gun, _) => SpecialCondition::Jammed,
        _ => SpecialCondition::None,
    }
}

pub(crate) fn apply_damage(integrity: f32, damage: f32, floor: f32) -> f32 {
    (integrity - damage.max(0.0)).clamp(floor.min(integrity), 100.0)
}

pub(crate) fn apply_repair(integrity: f32, amount: f32) -> f32 {
    (integrity + amount.max(0.0)).min(100.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FireState {
    pub on_fire: bool,
    #[serde(skip)]
    pub damage_accumulator: f32,
    pub last_threshold: i32,
}

impl FireState {
    pub fn new(integrity: f32) -> Self {
        Self {
            on_fire: false,
            damage_accumulator: 0.0,
            last_threshold: threshold_band(integrity),
        }
    }

    pub(crate) fn ignite(&mut self) -> bool {
        if self.on_fire {
            return false;
        }
        self.on_fire = true;
        true
    }

    pub(crate) fn extinguish(&mut self) -> bool {
        if !self.on_fire {
            return false;
        }
        self.on_fire = false;
        self.damage_accumulator = 0.0;
        true
    }

    /// Builds up fire damage and returns the whole points to apply this tick.
    ///
    /// Once a full point has accumulated the application chance is rolled. A
    /// failed roll throws the whole accumulator away instead of carrying it.
    pub(crate) fn accumulate<R: Rng + ?Sized>(
        &mut self,
        rate_per_second: f32,
        dt: f32,
        apply_chance: f32,
        rng: &mut R,
    ) -> Option<f32> {
        if !self.on_fire {
            return None;
        }

        self.damage_accumulator += rate_per_second * dt;
        if self.damage_accumulator < 1.0 {
            return None;
        }

        if rng.gen::<f32>() < apply_chance {
            let whole = self.damage_accumulator.floor();
            self.damage_accumulator -= whole;
            Some(whole)
        } else {
            self.damage_accumulator = 0.0;
            None
        }
    }

    /// Tracks the integrity band. True only when the band dropped.
    pub(crate) fn crossed_band_downward(&mut self, integrity: f32) -> bool {
        let band = threshold_band(integrity);
        let crossed = band < self.last_threshold;
        self.last_threshold = band;
        crossed
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub(crate) id: String,
    pub(crate) integrity: f32,
    pub(crate) fire: FireState,
}

impl Section {
    pub fn new(id: impl Into<String>, integrity: f32) -> Self {
        let integrity = integrity.clamp(0.0, 100.0);
        Self {
            id: id.into(),
            integrity,
            fire: FireState::new(integrity),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn integrity(&self) -> f32 {
        self.integrity
    }

    pub fn is_on_fire(&self) -> bool {
        self.fire.on_fire
    }

    pub fn fire_damage_accumulator(&self) -> f32 {
        self.fire.damage_accumulator
    }

    pub fn last_fire_threshold(&self) -> i32 {
        self.fire.last_threshold
    }

    pub fn is_destroyed(&self, destroyed_threshold: f32) -> bool {
        self.integrity <= destroyed_threshold
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VehicleSystem {
    pub(crate) id: String,
    pub(crate) kind: SystemKind,
    pub(crate) status: SystemStatus,
    pub(crate) special: SpecialCondition,
    pub(crate) section_id: String,
    pub(crate) integrity: f32,
    pub(crate) is_feathered: bool,
    pub(crate) fire: FireState,
}

impl VehicleSystem {
    pub fn new(
        id: impl Into<String>,
        kind: SystemKind,
        section_id: impl Into<String>,
        integrity: f32,
        table: &StatusTable,
    ) -> Self {
        let integrity = integrity.clamp(0.0, 100.0);
        let status = table.status_for(kind, integrity);
        Self {
            id: id.into(),
            kind,
            status,
            special: wear_condition(kind, status),
            section_id: section_id.into(),
            integrity,
            is_feathered: false,
            fire: FireState::new(integrity),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> SystemKind {
        self.kind
    }

    pub fn status(&self) -> SystemStatus {
        self.status
    }

    pub fn special(&self) -> SpecialCondition {
        self.special
    }

    pub fn section_id(&self) -> &str {
        &self.section_id
    }

    pub fn integrity(&self) -> f32 {
        self.integrity
    }

    pub fn is_on_fire(&self) -> bool {
        self.fire.on_fire
    }

    pub fn is_feathered(&self) -> bool {
        self.is_feathered
    }

    pub fn is_engine(&self) -> bool {
        self.kind == SystemKind::Engine
    }

    pub fn fire_damage_accumulator(&self) -> f32 {
        self.fire.damage_accumulator
    }

    /// Re-derives status from integrity. Returns the transition if it changed.
    pub(crate) fn recompute_status(
        &mut self,
        table: &StatusTable,
    ) -> Option<(SystemStatus, SystemStatus)> {
        let next = table.status_for(self.kind, self.integrity);
        if !self.fire.on_fire {
            self.special = wear_condition(self.kind, next);
        }
        if next == self.status {
            return None;
        }
        let previous = self.status;
        self.status = next;
        Some((previous, next))
    }
}
