//! Structural model of the aircraft: sections, systems, engines, fuel and altitude.
//!
//! `VehicleState` owns its own seeded RNG so fire and restart rolls are
//! reproducible independently of the crew and hazard streams. Everything that
//! happens is buffered as a [`VehicleEvent`] until the clock drains it.

mod components;
mod engines;
mod fire;

pub use components::{
    threshold_band, wear_condition, FireState, Section, SpecialCondition, StatusTable, SystemKind,
    SystemStatus, VehicleSystem,
};

use crate::config::VehicleConfig;
use crate::roster::Roster;
use components::{apply_damage, apply_repair};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VehicleEvent {
    SectionDamaged { section: String, integrity: f32 },
    SectionDestroyed { section: String },
    SectionRepaired { section: String, integrity: f32 },
    FireStarted { section: String },
    FireExtinguished { section: String },
    SystemStatusChanged { system: String, from: SystemStatus, to: SystemStatus },
    SystemRepaired { system: String, integrity: f32 },
    EngineDamaged { engine: String, integrity: f32 },
    EngineFireStarted { engine: String },
    EngineFireExtinguished { engine: String },
    EngineFeathered { engine: String },
    EngineRestarted { engine: String },
    EngineRestartFailed { engine: String, extra_damage: Option<f32> },
    FuelChanged { fuel: f32 },
    FuelExhausted,
    AltitudeChanged { altitude: f32 },
    Crashed,
}

/// Aircraft-wide quantities.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleGlobals {
    pub fuel_remaining: f32,
    pub altitude: f32,
}

#[derive(Debug)]
pub struct VehicleState {
    config: VehicleConfig,
    status_table: StatusTable,
    sections: Vec<Section>,
    systems: Vec<VehicleSystem>,
    section_order: Vec<String>,
    fuel_remaining: f32,
    altitude: f32,
    fuel_exhausted: bool,
    crashed: bool,
    rng: ChaCha8Rng,
    events: Vec<VehicleEvent>,
}

impl VehicleState {
    /// Builds the aircraft from roster data. `section_order` is the fuselage
    /// ordering that defines adjacency.
    pub fn new(roster: &Roster, section_order: Vec<String>, config: VehicleConfig, seed: u64) -> Self {
        let status_table = StatusTable::from_config(&config);
        let sections = roster
            .sections
            .iter()
            .map(|def| Section::new(def.id.clone(), def.integrity))
            .collect();
        let systems = roster
            .systems
            .iter()
            .map(|def| {
                VehicleSystem::new(
                    def.id.clone(),
                    def.kind,
                    def.section_id.clone(),
                    def.integrity,
                    &status_table,
                )
            })
            .collect();

        let fuel_remaining = config.initial_fuel.clamp(0.0, config.max_fuel);
        let altitude = config.initial_altitude.clamp(0.0, config.max_altitude);

        Self {
            config,
            status_table,
            sections,
            systems,
            section_order,
            fuel_remaining,
            altitude,
            fuel_exhausted: false,
            crashed: false,
            rng: ChaCha8Rng::seed_from_u64(seed),
            events: Vec::new(),
        }
    }

    /// Replaces tunables. Status is re-derived against the new thresholds.
    pub fn update_config(&mut self, config: VehicleConfig) {
        self.status_table = StatusTable::from_config(&config);
        self.config = config;
        for idx in 0..self.systems.len() {
            self.refresh_status(idx);
        }
    }

    pub fn config(&self) -> &VehicleConfig {
        &self.config
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn systems(&self) -> &[VehicleSystem] {
        &self.systems
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == id)
    }

    pub fn system(&self, id: &str) -> Option<&VehicleSystem> {
        self.systems.iter().find(|s| s.id == id)
    }

    pub fn engines(&self) -> impl Iterator<Item = &VehicleSystem> {
        self.systems.iter().filter(|s| s.is_engine())
    }

    pub fn section_order(&self) -> &[String] {
        &self.section_order
    }

    pub fn globals(&self) -> VehicleGlobals {
        VehicleGlobals {
            fuel_remaining: self.fuel_remaining,
            altitude: self.altitude,
        }
    }

    pub fn fuel_remaining(&self) -> f32 {
        self.fuel_remaining
    }

    pub fn altitude(&self) -> f32 {
        self.altitude
    }

    pub fn is_crashed(&self) -> bool {
        self.crashed
    }

    pub fn is_section_destroyed(&self, id: &str) -> bool {
        self.section(id)
            .map(|s| s.is_destroyed(self.config.destroyed_threshold))
            .unwrap_or(false)
    }

    pub fn is_section_on_fire(&self, id: &str) -> bool {
        self.section(id).map(|s| s.is_on_fire()).unwrap_or(false)
    }

    /// Section an id physically lives in: itself for a section, the housing
    /// section for a system.
    pub fn owning_section(&self, id: &str) -> Option<&str> {
        if let Some(section) = self.section(id) {
            return Some(section.id());
        }
        self.system(id).map(|s| s.section_id())
    }

    /// True if a repair on `id` could currently do anything.
    pub fn needs_repair(&self, id: &str) -> bool {
        if let Some(section) = self.section(id) {
            return section.integrity < 100.0 && !section.is_destroyed(self.config.destroyed_threshold);
        }
        self.system(id)
            .map(|s| s.integrity < 100.0 && s.status != SystemStatus::Destroyed)
            .unwrap_or(false)
    }

    pub fn events(&self) -> &[VehicleEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<VehicleEvent> {
        std::mem::take(&mut self.events)
    }

    /// Damages a section, may ignite it, and passes a share of the hit to
    /// the non-engine systems it houses. Returns false for an unknown id.
    pub fn apply_hit_to_section(
        &mut self,
        section_id: &str,
        damage: f32,
        can_start_fire: bool,
        fire_chance: f32,
    ) -> bool {
        let Some(idx) = self.section_index(section_id) else {
            debug!(section = section_id, "hit on unknown section ignored");
            return false;
        };

        let floor = self.config.destroyed_threshold;
        let section = &mut self.sections[idx];
        let was_destroyed = section.is_destroyed(floor);
        let before = section.integrity;
        section.integrity = apply_damage(before, damage, floor);
        section.fire.crossed_band_downward(section.integrity);

        if section.integrity < before {
            let integrity = section.integrity;
            info!(section = section_id, damage, integrity, "section hit");
            self.events.push(VehicleEvent::SectionDamaged {
                section: section_id.to_string(),
                integrity,
            });
            if !was_destroyed && integrity <= floor {
                warn!(section = section_id, "section destroyed");
                self.events.push(VehicleEvent::SectionDestroyed {
                    section: section_id.to_string(),
                });
            }

            let share = damage.max(0.0) * self.config.system_hit_share;
            if share > 0.0 {
                let housed: Vec<usize> = self
                    .systems
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.section_id == section_id && !s.is_engine())
                    .map(|(i, _)| i)
                    .collect();
                for system_idx in housed {
                    self.damage_system(system_idx, share);
                }
            }
        }

        if can_start_fire && !self.sections[idx].fire.on_fire && self.rng.gen::<f32>() < fire_chance {
            self.ignite_section(idx);
        }

        true
    }

    /// Hits a uniformly chosen section. Returns its id.
    pub fn apply_random_hit(&mut self, damage: f32, can_start_fire: bool, fire_chance: f32) -> Option<String> {
        if self.sections.is_empty() {
            return None;
        }
        let idx = self.rng.gen_range(0..self.sections.len());
        let id = self.sections[idx].id.clone();
        self.apply_hit_to_section(&id, damage, can_start_fire, fire_chance);
        Some(id)
    }

    /// Puts out a section fire, or an engine fire if `id` names an engine.
    pub fn try_extinguish_fire(&mut self, id: &str) -> bool {
        if let Some(idx) = self.section_index(id) {
            if !self.sections[idx].fire.extinguish() {
                return false;
            }
            info!(section = id, "fire extinguished");
            self.events.push(VehicleEvent::FireExtinguished {
                section: id.to_string(),
            });
            return true;
        }

        let Some(idx) = self.engine_index(id) else {
            return false;
        };
        let engine = &mut self.systems[idx];
        if !engine.fire.extinguish() {
            return false;
        }
        engine.special = wear_condition(engine.kind, engine.status);
        info!(engine = id, "engine fire extinguished");
        self.events.push(VehicleEvent::EngineFireExtinguished {
            engine: id.to_string(),
        });
        true
    }

    pub fn try_repair_section(&mut self, id: &str, amount: f32) -> bool {
        let Some(idx) = self.section_index(id) else {
            return false;
        };
        let floor = self.config.destroyed_threshold;
        let section = &mut self.sections[idx];
        if section.is_destroyed(floor) || section.fire.on_fire || section.integrity >= 100.0 || amount <= 0.0 {
            return false;
        }

        section.integrity = apply_repair(section.integrity, amount);
        section.fire.crossed_band_downward(section.integrity);
        let integrity = section.integrity;
        info!(section = id, integrity, "section repaired");
        self.events.push(VehicleEvent::SectionRepaired {
            section: id.to_string(),
            integrity,
        });
        true
    }

    /// Repairs a system. Refused while destroyed, at full integrity, or while
    /// its housing section burns.
    pub fn try_repair_system(&mut self, id: &str, amount: f32) -> bool {
        let Some(idx) = self.system_index(id) else {
            return false;
        };
        let housing_on_fire = self.is_section_on_fire(&self.systems[idx].section_id);
        let system = &mut self.systems[idx];
        if system.status == SystemStatus::Destroyed
            || system.integrity >= 100.0
            || housing_on_fire
            || amount <= 0.0
        {
            return false;
        }

        system.integrity = apply_repair(system.integrity, amount);
        system.fire.crossed_band_downward(system.integrity);
        let integrity = system.integrity;
        info!(system = id, integrity, "system repaired");
        self.events.push(VehicleEvent::SystemRepaired {
            system: id.to_string(),
            integrity,
        });
        self.refresh_status(idx);
        true
    }

    /// Adds (or with a negative delta removes) fuel, clamped to `[0, max_fuel]`.
    pub fn adjust_fuel(&mut self, delta: f32) {
        let before = self.fuel_remaining;
        self.fuel_remaining = (self.fuel_remaining + delta).clamp(0.0, self.config.max_fuel);
        if before.floor() != self.fuel_remaining.floor() {
            self.events.push(VehicleEvent::FuelChanged {
                fuel: self.fuel_remaining,
            });
        }
        if self.fuel_remaining > 0.0 {
            self.fuel_exhausted = false;
        }
    }

    /// Advances fires, fire spread, engine fires, altitude and fuel, in that order.
    pub fn tick(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        self.tick_section_fires(dt);
        self.tick_fire_spread(dt);
        self.tick_engine_fires(dt);
        self.tick_altitude(dt);
        self.tick_fuel(dt);
    }

    pub(crate) fn section_index(&self, id: &str) -> Option<usize> {
        self.sections.iter().position(|s| s.id == id)
    }

    pub(crate) fn system_index(&self, id: &str) -> Option<usize> {
        self.systems.iter().position(|s| s.id == id)
    }

    pub(crate) fn engine_index(&self, id: &str) -> Option<usize> {
        self.systems.iter().position(|s| s.id == id && s.is_engine())
    }

    fn ignite_section(&mut self, idx: usize) {
        if self.sections[idx].fire.ignite() {
            let section = self.sections[idx].id.clone();
            warn!(section = %section, "fire started");
            self.events.push(VehicleEvent::FireStarted { section });
        }
    }

    /// Applies damage to a system and reports the status change, if any.
    pub(crate) fn damage_system(&mut self, idx: usize, amount: f32) {
        let floor = self.config.destroyed_threshold;
        let system = &mut self.systems[idx];
        let before = system.integrity;
        system.integrity = apply_damage(before, amount, floor);
        system.fire.crossed_band_downward(system.integrity);
        if system.integrity < before && system.is_engine() {
            self.events.push(VehicleEvent::EngineDamaged {
                engine: system.id.clone(),
                integrity: system.integrity,
            });
        }
        self.refresh_status(idx);
    }

    fn refresh_status(&mut self, idx: usize) {
        let system = &mut self.systems[idx];
        if let Some((from, to)) = system.recompute_status(&self.status_table) {
            info!(system = %system.id, ?from, ?to, "system status changed");
            self.events.push(VehicleEvent::SystemStatusChanged {
                system: system.id.clone(),
                from,
                to,
            });
        }
    }
}
