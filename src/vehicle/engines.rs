//! Engines, fuel burn and altitude.

use super::components::{apply_damage, SpecialCondition, SystemStatus};
use super::{VehicleEvent, VehicleState};
use rand::Rng;
use tracing::{debug, error, info, warn};

const ALTITUDE_REPORT_BAND: f32 = 1000.0;

impl VehicleState {
    /// Damages an engine and rolls `fire_chance` to set it alight.
    pub fn apply_engine_hit(&mut self, engine_id: &str, damage: f32, fire_chance: f32) -> bool {
        let Some(idx) = self.engine_index(engine_id) else {
            debug!(engine = engine_id, "hit on unknown engine ignored");
            return false;
        };

        info!(engine = engine_id, damage, "engine hit");
        self.damage_system(idx, damage);

        if !self.systems[idx].fire.on_fire && self.rng.gen::<f32>() < fire_chance {
            self.ignite_engine(idx);
        }
        true
    }

    /// Stops an engine's power contribution. False if it is already feathered.
    pub fn feather_engine(&mut self, engine_id: &str) -> bool {
        let Some(idx) = self.engine_index(engine_id) else {
            return false;
        };
        let engine = &mut self.systems[idx];
        if engine.is_feathered {
            return false;
        }
        engine.is_feathered = true;
        info!(engine = engine_id, "engine feathered");
        self.events.push(VehicleEvent::EngineFeathered {
            engine: engine_id.to_string(),
        });
        true
    }

    /// Attempts to bring a feathered engine back. Healthier engines restart
    /// more reliably; a damaged engine may catch fire as it spools up.
    pub fn restart_engine(&mut self, engine_id: &str) -> bool {
        let Some(idx) = self.engine_index(engine_id) else {
            return false;
        };
        let engine = &self.systems[idx];
        if !engine.is_feathered || engine.status == SystemStatus::Destroyed {
            return false;
        }
        if self.fuel_remaining <= 0.0 {
            debug!(engine = engine_id, "restart refused, no fuel");
            return false;
        }

        let integrity = engine.integrity;
        let chance = self.config.restart_base_chance + integrity / 100.0 * self.config.restart_health_weight;

        if self.rng.gen::<f32>() < chance {
            self.systems[idx].is_feathered = false;
            info!(engine = engine_id, "engine restarted");
            self.events.push(VehicleEvent::EngineRestarted {
                engine: engine_id.to_string(),
            });
            if integrity < self.config.engine_damaged_below
                && self.rng.gen::<f32>() < self.config.restart_reignite_chance
            {
                self.ignite_engine(idx);
            }
            return true;
        }

        let extra_damage = if self.rng.gen::<f32>() < self.config.restart_failure_damage_chance {
            let damage = self.config.restart_failure_damage.sample(&mut self.rng);
            self.damage_system(idx, damage);
            Some(damage)
        } else {
            None
        };
        warn!(engine = engine_id, ?extra_damage, "engine restart failed");
        self.events.push(VehicleEvent::EngineRestartFailed {
            engine: engine_id.to_string(),
            extra_damage,
        });
        false
    }

    /// Power an engine contributes: full, reduced when damaged, none when
    /// feathered or destroyed.
    pub fn engine_power_fraction(&self, engine_id: &str) -> f32 {
        self.engine_index(engine_id)
            .map(|idx| self.power_of(idx))
            .unwrap_or(0.0)
    }

    /// Engines that are Operational and turning. Damaged engines still give
    /// power but do not count toward level flight.
    pub fn operational_engine_count(&self) -> usize {
        self.systems
            .iter()
            .filter(|s| s.is_engine() && !s.is_feathered && s.status == SystemStatus::Operational)
            .count()
    }

    /// Mean power over all engines, in `[0, 1]`.
    pub fn total_engine_power(&self) -> f32 {
        let engines: Vec<usize> = (0..self.systems.len())
            .filter(|&idx| self.systems[idx].is_engine())
            .collect();
        if engines.is_empty() {
            return 0.0;
        }
        engines.iter().map(|&idx| self.power_of(idx)).sum::<f32>() / engines.len() as f32
    }

    fn power_of(&self, idx: usize) -> f32 {
        let engine = &self.systems[idx];
        if engine.is_feathered {
            return 0.0;
        }
        match engine.status {
            SystemStatus::Operational => 1.0,
            SystemStatus::Damaged => self.config.damaged_engine_power,
            SystemStatus::Destroyed => 0.0,
        }
    }

    fn ignite_engine(&mut self, idx: usize) {
        let engine = &mut self.systems[idx];
        if engine.fire.ignite() {
            engine.special = SpecialCondition::OnFire;
            warn!(engine = %engine.id, "engine fire");
            self.events.push(VehicleEvent::EngineFireStarted {
                engine: engine.id.clone(),
            });
        }
    }

    pub(super) fn tick_engine_fires(&mut self, dt: f32) {
        let rate = self.config.engine_fire_damage_per_second;
        let chance = self.config.fire_damage_chance_per_second;
        let floor = self.config.destroyed_threshold;

        for idx in 0..self.systems.len() {
            if !self.systems[idx].is_engine() {
                continue;
            }
            let engine = &mut self.systems[idx];
            let Some(damage) = engine.fire.accumulate(rate, dt, chance, &mut self.rng) else {
                continue;
            };

            let was_destroyed = engine.integrity <= floor;
            engine.integrity = apply_damage(engine.integrity, damage, floor);
            let destroyed_now = !was_destroyed && engine.integrity <= floor;
            if engine.fire.crossed_band_downward(engine.integrity) || destroyed_now {
                info!(engine = %engine.id, integrity = engine.integrity, "engine burning");
                self.events.push(VehicleEvent::EngineDamaged {
                    engine: engine.id.clone(),
                    integrity: engine.integrity,
                });
            }
            self.refresh_status(idx);
        }
    }

    /// Descent factor while fuel-starved: the full multiplier at max altitude
    /// tapering to 1 at the ground.
    pub fn fuel_starved_descent_factor(&self) -> f32 {
        let fraction = (self.altitude / self.config.max_altitude).clamp(0.0, 1.0);
        1.0 + (self.config.fuel_starved_descent_multiplier - 1.0) * fraction
    }

    pub(super) fn tick_altitude(&mut self, dt: f32) {
        if self.crashed {
            return;
        }

        let fuel_starved = self.fuel_remaining <= 0.0;
        let underpowered =
            self.operational_engine_count() < self.config.min_engines_for_level_flight;
        if !fuel_starved && !underpowered {
            return;
        }

        let mut rate = self.config.descent_rate_per_second;
        if fuel_starved {
            rate *= self.fuel_starved_descent_factor();
        }

        let before = self.altitude;
        self.altitude = (self.altitude - rate * dt).max(0.0);
        if (before / ALTITUDE_REPORT_BAND).floor() != (self.altitude / ALTITUDE_REPORT_BAND).floor() {
            debug!(altitude = self.altitude, "descending");
            self.events.push(VehicleEvent::AltitudeChanged {
                altitude: self.altitude,
            });
        }

        if self.altitude <= 0.0 {
            self.crashed = true;
            error!("aircraft has hit the ground");
            self.events.push(VehicleEvent::Crashed);
        }
    }

    pub(super) fn tick_fuel(&mut self, dt: f32) {
        if self.fuel_exhausted {
            return;
        }

        let burn = self.config.base_fuel_burn_per_second * self.total_engine_power() * dt;
        if burn > 0.0 {
            self.adjust_fuel(-burn);
        }

        if self.fuel_remaining <= 0.0 {
            self.fuel_exhausted = true;
            warn!("fuel exhausted, feathering all engines");
            self.events.push(VehicleEvent::FuelExhausted);
            let ids: Vec<String> = self.engines().map(|e| e.id.clone()).collect();
            for id in ids {
                self.feather_engine(&id);
            }
        }
    }
}
