//! Tunable numbers for every subsystem.
//!
//! Every rate, threshold and range the simulation uses lives here rather than
//! inline, so a scenario file or a test can re-enter any of them. Defaults are
//! the named constants below.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

// Structure and fire
const DESTROYED_THRESHOLD: f32 = 0.0;
const ENGINE_DAMAGED_BELOW: f32 = 75.0;
const SYSTEM_DAMAGED_BELOW: f32 = 50.0;
const FIRE_DAMAGE_PER_SECOND: f32 = 2.0;
const FIRE_DAMAGE_CHANCE: f32 = 0.6;
const FIRE_SPREAD_CHANCE_PER_SECOND: f32 = 0.02;
const ENGINE_FIRE_DAMAGE_PER_SECOND: f32 = 3.0;
const SYSTEM_HIT_SHARE: f32 = 0.5;

// Engines, fuel, altitude
const MAX_FUEL: f32 = 2780.0; // gallons
const BASE_FUEL_BURN_PER_SECOND: f32 = 0.8;
const DAMAGED_ENGINE_POWER: f32 = 0.75;
const MAX_ALTITUDE: f32 = 25_000.0; // feet
const DESCENT_RATE_PER_SECOND: f32 = 40.0;
const FUEL_STARVED_DESCENT_MULTIPLIER: f32 = 3.0;
const MIN_ENGINES_FOR_LEVEL_FLIGHT: usize = 3;
const RESTART_BASE_CHANCE: f32 = 0.25;
const RESTART_HEALTH_WEIGHT: f32 = 0.5;
const RESTART_REIGNITE_CHANCE: f32 = 0.15;
const RESTART_FAILURE_DAMAGE_CHANCE: f32 = 0.10;

// Crew
const LIGHT_INJURY_SECONDS: f32 = 90.0;
const SERIOUS_INJURY_SECONDS: f32 = 60.0;
const CRITICAL_INJURY_SECONDS: f32 = 45.0;
const ARRIVAL_THRESHOLD: f32 = 2.0;
const MIN_MOVE_STEP: f32 = 0.05;
const MAX_TRAVEL_SECONDS: f32 = 20.0;
const DEFAULT_MOVE_SPEED: f32 = 60.0;

// Hazards
const GRACE_MIN_SECONDS: f32 = 3.0;
const GRACE_MAX_SECONDS: f32 = 5.0;
const FIRST_EVENT_MIN_SECONDS: f32 = 1.0;
const FIRST_EVENT_MAX_SECONDS: f32 = 3.0;
const EVENT_INTERVAL_AT_SAFE: f32 = 8.0;
const EVENT_INTERVAL_AT_DANGER: f32 = 2.0;
const INJURY_INTERVAL_AT_SAFE: f32 = 30.0;
const INJURY_INTERVAL_AT_DANGER: f32 = 10.0;
const MIN_EVENT_INTERVAL: f32 = 0.25;
const INTERVAL_JITTER_FRACTION: f32 = 0.3;

/// Closed `[min, max]` range sampled uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl ValueRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if self.max <= self.min {
            return self.min;
        }
        rng.gen_range(self.min..=self.max)
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }

    fn is_ordered(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }
}

/// A quantity interpolated by danger: `safe` at danger 0, `danger` at danger 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DangerScaled {
    pub safe: f32,
    pub danger: f32,
}

impl DangerScaled {
    pub const fn new(safe: f32, danger: f32) -> Self {
        Self { safe, danger }
    }

    pub fn at(&self, danger: f32) -> f32 {
        lerp(self.safe, self.danger, danger.clamp(0.0, 1.0))
    }
}

pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VehicleConfig {
    pub destroyed_threshold: f32,
    pub engine_damaged_below: f32,
    pub system_damaged_below: f32,
    pub fire_damage_per_second: f32,
    /// Chance that accumulated fire damage is applied once it reaches a whole point.
    pub fire_damage_chance_per_second: f32,
    pub fire_spread_chance_per_second: f32,
    pub engine_fire_damage_per_second: f32,
    /// Fraction of a section hit passed on to each non-engine system housed there.
    pub system_hit_share: f32,
    pub max_fuel: f32,
    pub initial_fuel: f32,
    pub base_fuel_burn_per_second: f32,
    pub damaged_engine_power: f32,
    pub max_altitude: f32,
    pub initial_altitude: f32,
    pub descent_rate_per_second: f32,
    pub fuel_starved_descent_multiplier: f32,
    pub min_engines_for_level_flight: usize,
    pub restart_base_chance: f32,
    pub restart_health_weight: f32,
    pub restart_reignite_chance: f32,
    pub restart_failure_damage_chance: f32,
    pub restart_failure_damage: ValueRange,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            destroyed_threshold: DESTROYED_THRESHOLD,
            engine_damaged_below: ENGINE_DAMAGED_BELOW,
            system_damaged_below: SYSTEM_DAMAGED_BELOW,
            fire_damage_per_second: FIRE_DAMAGE_PER_SECOND,
            fire_damage_chance_per_second: FIRE_DAMAGE_CHANCE,
            fire_spread_chance_per_second: FIRE_SPREAD_CHANCE_PER_SECOND,
            engine_fire_damage_per_second: ENGINE_FIRE_DAMAGE_PER_SECOND,
            system_hit_share: SYSTEM_HIT_SHARE,
            max_fuel: MAX_FUEL,
            initial_fuel: MAX_FUEL,
            base_fuel_burn_per_second: BASE_FUEL_BURN_PER_SECOND,
            damaged_engine_power: DAMAGED_ENGINE_POWER,
            max_altitude: MAX_ALTITUDE,
            initial_altitude: MAX_ALTITUDE,
            descent_rate_per_second: DESCENT_RATE_PER_SECOND,
            fuel_starved_descent_multiplier: FUEL_STARVED_DESCENT_MULTIPLIER,
            min_engines_for_level_flight: MIN_ENGINES_FOR_LEVEL_FLIGHT,
            restart_base_chance: RESTART_BASE_CHANCE,
            restart_health_weight: RESTART_HEALTH_WEIGHT,
            restart_reignite_chance: RESTART_REIGNITE_CHANCE,
            restart_failure_damage_chance: RESTART_FAILURE_DAMAGE_CHANCE,
            restart_failure_damage: ValueRange::new(5.0, 15.0),
        }
    }
}

/// Repair amounts follow a rough bell curve: the mean of three uniform draws
/// over `mean ± spread`, clamped to `[min, max]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairCurve {
    pub mean: f32,
    pub spread: f32,
    pub min: f32,
    pub max: f32,
}

impl Default for RepairCurve {
    fn default() -> Self {
        Self {
            mean: 20.0,
            spread: 10.0,
            min: 5.0,
            max: 40.0,
        }
    }
}

impl RepairCurve {
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        let draw = ValueRange::new(self.mean - self.spread, self.mean + self.spread);
        let total: f32 = (0..3).map(|_| draw.sample(&mut *rng)).sum();
        (total / 3.0).clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumableStock {
    pub extinguishers: u32,
    pub medical_kits: u32,
    pub repair_kits: u32,
}

impl Default for ConsumableStock {
    fn default() -> Self {
        Self {
            extinguishers: 4,
            medical_kits: 6,
            repair_kits: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrewConfig {
    pub light_injury_seconds: f32,
    pub serious_injury_seconds: f32,
    pub critical_injury_seconds: f32,
    pub arrival_threshold: f32,
    pub min_move_step: f32,
    pub max_travel_seconds: f32,
    pub default_move_speed: f32,
    pub move_duration: f32,
    pub man_station_duration: f32,
    pub extinguish_duration: f32,
    pub repair_duration: f32,
    pub treat_duration: f32,
    pub feather_duration: f32,
    pub restart_duration: f32,
    pub repair: RepairCurve,
    pub consumables: ConsumableStock,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            light_injury_seconds: LIGHT_INJURY_SECONDS,
            serious_injury_seconds: SERIOUS_INJURY_SECONDS,
            critical_injury_seconds: CRITICAL_INJURY_SECONDS,
            arrival_threshold: ARRIVAL_THRESHOLD,
            min_move_step: MIN_MOVE_STEP,
            max_travel_seconds: MAX_TRAVEL_SECONDS,
            default_move_speed: DEFAULT_MOVE_SPEED,
            move_duration: 0.5,
            man_station_duration: 1.0,
            extinguish_duration: 5.0,
            repair_duration: 8.0,
            treat_duration: 6.0,
            feather_duration: 3.0,
            restart_duration: 6.0,
            repair: RepairCurve::default(),
            consumables: ConsumableStock::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntervalStrategy {
    /// `-ln(U) * mean`: memoryless, clusters and gaps.
    Exponential,
    /// `mean * (1 ± jitter_fraction)`.
    Jitter,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseWeights {
    pub cruise: f32,
    pub flak: f32,
    pub fighters: f32,
}

impl Default for PhaseWeights {
    fn default() -> Self {
        Self {
            cruise: 0.5,
            flak: 0.3,
            fighters: 0.2,
        }
    }
}

impl PhaseWeights {
    pub const fn new(cruise: f32, flak: f32, fighters: f32) -> Self {
        Self {
            cruise,
            flak,
            fighters,
        }
    }

    /// Weights projected onto the probability simplex, or `None` if they carry no mass.
    pub fn normalized(&self) -> Option<[f32; 3]> {
        let weights = [
            self.cruise.max(0.0),
            self.flak.max(0.0),
            self.fighters.max(0.0),
        ];
        let total: f32 = weights.iter().sum();
        if !total.is_finite() || total <= 0.0 {
            return None;
        }
        Some(weights.map(|w| w / total))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    pub grace_period: ValueRange,
    pub cruise_duration: ValueRange,
    pub flak_duration: ValueRange,
    pub fighters_duration: ValueRange,
    pub default_weights: PhaseWeights,
    pub first_event_window: ValueRange,
    pub event_interval: DangerScaled,
    pub injury_interval: DangerScaled,
    pub interval_strategy: IntervalStrategy,
    pub jitter_fraction: f32,
    pub min_event_interval: f32,
    pub plane_damage: DangerScaled,
    pub damage_jitter: f32,
    pub engine_damage_weight: DangerScaled,
    pub fire_weight: DangerScaled,
    pub crew_injury_weight: DangerScaled,
    pub light_injury_weight: DangerScaled,
    pub serious_injury_weight: DangerScaled,
    pub critical_injury_weight: DangerScaled,
    pub fighter_engine_bias: f32,
    pub fighter_damage_scale: f32,
    pub fighter_fire_scale: f32,
    pub fighter_second_pass_chance: f32,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            grace_period: ValueRange::new(GRACE_MIN_SECONDS, GRACE_MAX_SECONDS),
            cruise_duration: ValueRange::new(20.0, 40.0),
            flak_duration: ValueRange::new(15.0, 30.0),
            fighters_duration: ValueRange::new(20.0, 35.0),
            default_weights: PhaseWeights::default(),
            first_event_window: ValueRange::new(FIRST_EVENT_MIN_SECONDS, FIRST_EVENT_MAX_SECONDS),
            event_interval: DangerScaled::new(EVENT_INTERVAL_AT_SAFE, EVENT_INTERVAL_AT_DANGER),
            injury_interval: DangerScaled::new(INJURY_INTERVAL_AT_SAFE, INJURY_INTERVAL_AT_DANGER),
            interval_strategy: IntervalStrategy::Exponential,
            jitter_fraction: INTERVAL_JITTER_FRACTION,
            min_event_interval: MIN_EVENT_INTERVAL,
            plane_damage: DangerScaled::new(6.0, 18.0),
            damage_jitter: 0.25,
            engine_damage_weight: DangerScaled::new(0.2, 0.4),
            fire_weight: DangerScaled::new(0.05, 0.3),
            crew_injury_weight: DangerScaled::new(0.3, 0.8),
            light_injury_weight: DangerScaled::new(0.7, 0.4),
            serious_injury_weight: DangerScaled::new(0.25, 0.4),
            critical_injury_weight: DangerScaled::new(0.05, 0.2),
            fighter_engine_bias: 1.5,
            fighter_damage_scale: 0.6,
            fighter_fire_scale: 0.5,
            fighter_second_pass_chance: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub seed: u64,
    pub tick_seconds: f32,
    pub telemetry_interval_seconds: f32,
    pub vehicle: VehicleConfig,
    pub crew: CrewConfig,
    pub hazard: HazardConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 1943,
            tick_seconds: 0.1,
            telemetry_interval_seconds: 5.0,
            vehicle: VehicleConfig::default(),
            crew: CrewConfig::default(),
            hazard: HazardConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

fn check(condition: bool, message: &str) -> Result<(), ConfigError> {
    if condition {
        Ok(())
    } else {
        Err(ConfigError::Invalid(message.to_string()))
    }
}

fn is_probability(p: f32) -> bool {
    (0.0..=1.0).contains(&p)
}

impl SimConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check(self.tick_seconds > 0.0, "tick_seconds must be positive")?;
        check(
            self.telemetry_interval_seconds.is_finite() && self.telemetry_interval_seconds >= 0.0,
            "telemetry_interval_seconds must be >= 0 (0 disables sampling)",
        )?;

        let v = &self.vehicle;
        check(
            (0.0..100.0).contains(&v.destroyed_threshold),
            "destroyed_threshold must be within [0, 100)",
        )?;
        check(
            v.engine_damaged_below > v.destroyed_threshold
                && v.system_damaged_below > v.destroyed_threshold,
            "damaged thresholds must sit above the destroyed threshold",
        )?;
        check(v.fire_damage_per_second >= 0.0, "fire_damage_per_second must be >= 0")?;
        check(
            v.engine_fire_damage_per_second >= 0.0,
            "engine_fire_damage_per_second must be >= 0",
        )?;
        check(
            is_probability(v.fire_damage_chance_per_second)
                && is_probability(v.restart_base_chance)
                && is_probability(v.restart_reignite_chance)
                && is_probability(v.restart_failure_damage_chance)
                && is_probability(v.system_hit_share)
                && is_probability(v.damaged_engine_power),
            "vehicle probabilities and fractions must be within [0, 1]",
        )?;
        check(
            v.restart_base_chance + v.restart_health_weight <= 1.0,
            "restart chance can exceed 1",
        )?;
        check(v.max_fuel > 0.0, "max_fuel must be positive")?;
        check(
            (0.0..=v.max_fuel).contains(&v.initial_fuel),
            "initial_fuel must be within [0, max_fuel]",
        )?;
        check(v.max_altitude > 0.0, "max_altitude must be positive")?;
        check(
            (0.0..=v.max_altitude).contains(&v.initial_altitude),
            "initial_altitude must be within [0, max_altitude]",
        )?;
        check(
            v.fuel_starved_descent_multiplier >= 1.0,
            "fuel_starved_descent_multiplier must be >= 1",
        )?;
        check(
            v.restart_failure_damage.is_ordered() && v.restart_failure_damage.min >= 0.0,
            "restart_failure_damage must be an ordered, non-negative range",
        )?;

        let c = &self.crew;
        check(
            c.light_injury_seconds > 0.0
                && c.serious_injury_seconds > 0.0
                && c.critical_injury_seconds > 0.0,
            "injury stage timers must be positive",
        )?;
        check(c.arrival_threshold > 0.0, "arrival_threshold must be positive")?;
        check(c.min_move_step > 0.0, "min_move_step must be positive")?;
        check(c.max_travel_seconds > 0.0, "max_travel_seconds must be positive")?;
        check(
            [
                c.move_duration,
                c.man_station_duration,
                c.extinguish_duration,
                c.repair_duration,
                c.treat_duration,
                c.feather_duration,
                c.restart_duration,
            ]
            .iter()
            .all(|d| d.is_finite() && *d >= 0.0),
            "action durations must be finite and non-negative",
        )?;
        check(
            c.repair.min <= c.repair.max && c.repair.spread >= 0.0,
            "repair curve must have min <= max and a non-negative spread",
        )?;

        let h = &self.hazard;
        for (range, name) in [
            (&h.grace_period, "grace_period"),
            (&h.cruise_duration, "cruise_duration"),
            (&h.flak_duration, "flak_duration"),
            (&h.fighters_duration, "fighters_duration"),
            (&h.first_event_window, "first_event_window"),
        ] {
            if !range.is_ordered() || range.min < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be an ordered, non-negative range"
                )));
            }
        }
        check(
            h.default_weights.normalized().is_some(),
            "default phase weights must carry positive mass",
        )?;
        check(
            h.event_interval.safe > 0.0
                && h.event_interval.danger > 0.0
                && h.injury_interval.safe > 0.0
                && h.injury_interval.danger > 0.0,
            "event interval means must be positive",
        )?;
        check(h.min_event_interval > 0.0, "min_event_interval must be positive")?;
        check(
            (0.0..1.0).contains(&h.jitter_fraction),
            "jitter_fraction must be within [0, 1)",
        )?;
        check(
            (0.0..1.0).contains(&h.damage_jitter),
            "damage_jitter must be within [0, 1)",
        )?;
        for (scaled, name) in [
            (&h.engine_damage_weight, "engine_damage_weight"),
            (&h.fire_weight, "fire_weight"),
            (&h.crew_injury_weight, "crew_injury_weight"),
        ] {
            if !is_probability(scaled.safe) || !is_probability(scaled.danger) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must stay within [0, 1]"
                )));
            }
        }
        check(
            h.light_injury_weight.safe >= 0.0
                && h.light_injury_weight.danger >= 0.0
                && h.serious_injury_weight.safe >= 0.0
                && h.serious_injury_weight.danger >= 0.0
                && h.critical_injury_weight.safe >= 0.0
                && h.critical_injury_weight.danger >= 0.0,
            "injury severity weights must be non-negative",
        )?;
        check(
            h.plane_damage.safe >= 0.0 && h.plane_damage.danger >= 0.0,
            "plane_damage must be non-negative",
        )?;
        check(
            h.fighter_engine_bias >= 0.0
                && h.fighter_damage_scale >= 0.0
                && h.fighter_fire_scale >= 0.0
                && is_probability(h.fighter_second_pass_chance),
            "fighter modifiers must be non-negative",
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_default_config_is_valid() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = SimConfig::from_json_str(r#"{"seed": 7, "hazard": {"jitter_fraction": 0.1}}"#)
            .unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.hazard.jitter_fraction, 0.1);
        assert_eq!(config.vehicle.engine_damaged_below, ENGINE_DAMAGED_BELOW);
    }

    #[test]
    fn test_invalid_probability_rejected() {
        let result = SimConfig::from_json_str(r#"{"vehicle": {"fire_damage_chance_per_second": 1.5}}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_json_rejected() {
        assert!(matches!(
            SimConfig::from_json_str("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_danger_scaled_clamps_input() {
        let scaled = DangerScaled::new(10.0, 20.0);
        assert_eq!(scaled.at(0.0), 10.0);
        assert_eq!(scaled.at(1.0), 20.0);
        assert_eq!(scaled.at(1.5), 20.0);
        assert_eq!(scaled.at(-0.5), 10.0);
    }

    #[test]
    fn test_phase_weights_normalize() {
        let weights = PhaseWeights::new(2.0, 1.0, 1.0).normalized().unwrap();
        assert!((weights[0] - 0.5).abs() < 1e-6);
        assert!((weights.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(PhaseWeights::new(0.0, 0.0, 0.0).normalized().is_none());
    }

    #[test]
    fn test_repair_curve_stays_in_bounds() {
        let curve = RepairCurve::default();
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..500 {
            let amount = curve.sample(&mut rng);
            assert!(amount >= curve.min && amount <= curve.max);
        }
    }
}
