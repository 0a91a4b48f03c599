//! Hazard phase scheduler.
//!
//! Cycles the bomber through Cruise, Flak and Fighters phases and, while
//! under attack, rolls strikes against the airframe and wounds among the
//! crew. Rates and magnitudes are interpolated from the leg's danger, which
//! in turn follows travel progress.

use crate::config::{lerp, HazardConfig, IntervalStrategy, PhaseWeights};
use crate::crew::{CrewState, InjurySeverity};
use crate::vehicle::VehicleState;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HazardPhase {
    Cruise,
    Flak,
    Fighters,
}

impl HazardPhase {
    const ALL: [HazardPhase; 3] = [HazardPhase::Cruise, HazardPhase::Flak, HazardPhase::Fighters];

    pub fn is_hostile(self) -> bool {
        !matches!(self, HazardPhase::Cruise)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardPhaseState {
    pub current_phase: HazardPhase,
    pub phase_timer: f32,
    pub phase_duration: f32,
    pub start_danger: f32,
    pub end_danger: f32,
    pub phase_weights: Option<PhaseWeights>,
}

impl Default for HazardPhaseState {
    fn default() -> Self {
        Self {
            current_phase: HazardPhase::Cruise,
            phase_timer: 0.0,
            phase_duration: 0.0,
            start_danger: 0.0,
            end_danger: 0.0,
            phase_weights: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrikeKind {
    Flak,
    Fighter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HazardEvent {
    PhaseChanged {
        from: HazardPhase,
        to: HazardPhase,
        duration: f32,
    },
    Strike {
        kind: StrikeKind,
        target: String,
        engine: bool,
        damage: f32,
        fire_chance: f32,
    },
    InjuryInflicted {
        crew: String,
        severity: InjurySeverity,
    },
}

/// Hazard statistics for telemetry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HazardStats {
    pub flak_strikes: u32,
    pub fighter_passes: u32,
    pub engine_hits: u32,
    pub section_hits: u32,
    pub light_injuries: u32,
    pub serious_injuries: u32,
    pub critical_injuries: u32,
    pub cruise_entries: u32,
    pub flak_entries: u32,
    pub fighters_entries: u32,
}

#[derive(Debug)]
pub struct HazardScheduler {
    config: HazardConfig,
    state: HazardPhaseState,
    danger: f32,
    time_since_event: f32,
    next_event_interval: f32,
    time_since_injury: f32,
    next_injury_interval: f32,
    stats: HazardStats,
    rng: ChaCha8Rng,
    events: Vec<HazardEvent>,
}

impl HazardScheduler {
    pub fn new(config: HazardConfig, seed: u64) -> Self {
        let mut scheduler = Self {
            config,
            state: HazardPhaseState::default(),
            danger: 0.0,
            time_since_event: 0.0,
            next_event_interval: f32::INFINITY,
            time_since_injury: 0.0,
            next_injury_interval: f32::INFINITY,
            stats: HazardStats::default(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            events: Vec::new(),
        };
        scheduler.configure_leg(0.0, 0.0, None);
        scheduler
    }

    /// Starts a leg: back to Cruise for a short grace period whatever the
    /// weights say.
    pub fn configure_leg(&mut self, start_danger: f32, end_danger: f32, weights: Option<PhaseWeights>) {
        let previous = self.state.current_phase;
        let grace = self.config.grace_period.sample(&mut self.rng);

        self.state = HazardPhaseState {
            current_phase: HazardPhase::Cruise,
            phase_timer: 0.0,
            phase_duration: grace,
            start_danger: start_danger.clamp(0.0, 1.0),
            end_danger: end_danger.clamp(0.0, 1.0),
            phase_weights: weights,
        };
        self.danger = self.state.start_danger;
        self.time_since_event = 0.0;
        self.next_event_interval = f32::INFINITY;
        self.time_since_injury = 0.0;
        self.next_injury_interval = f32::INFINITY;

        info!(
            start_danger = self.state.start_danger,
            end_danger = self.state.end_danger,
            grace,
            "leg configured"
        );
        if previous != HazardPhase::Cruise {
            self.announce(previous, HazardPhase::Cruise, grace);
        }
    }

    pub fn danger_at(&self, progress: f32) -> f32 {
        lerp(self.state.start_danger, self.state.end_danger, progress.clamp(0.0, 1.0)).clamp(0.0, 1.0)
    }

    pub fn danger(&self) -> f32 {
        self.danger
    }

    pub fn current_phase(&self) -> HazardPhase {
        self.state.current_phase
    }

    pub fn phase_state(&self) -> &HazardPhaseState {
        &self.state
    }

    pub fn get_stats(&self) -> &HazardStats {
        &self.stats
    }

    pub fn get_config(&self) -> &HazardConfig {
        &self.config
    }

    pub fn update_config(&mut self, config: HazardConfig) {
        self.config = config;
    }

    pub fn events(&self) -> &[HazardEvent] {
        &self.events
    }

    pub fn drain_events(&mut self) -> Vec<HazardEvent> {
        std::mem::take(&mut self.events)
    }

    /// Advances phase timing and fires any strikes or injuries that are due.
    pub fn tick(&mut self, dt: f32, leg_progress: f32, vehicle: &mut VehicleState, crew: &mut CrewState) {
        if dt <= 0.0 {
            return;
        }
        self.danger = self.danger_at(leg_progress);

        self.state.phase_timer += dt;
        if self.state.phase_timer >= self.state.phase_duration {
            self.next_phase();
        }

        let phase = self.state.current_phase;
        if !phase.is_hostile() {
            return;
        }

        self.time_since_event += dt;
        if self.time_since_event >= self.next_event_interval {
            match phase {
                HazardPhase::Flak => self.flak_strike(vehicle),
                HazardPhase::Fighters => self.fighter_attack(vehicle),
                HazardPhase::Cruise => {}
            }
            self.time_since_event = 0.0;
            self.next_event_interval = self.sample_event_interval();
        }

        self.time_since_injury += dt;
        if self.time_since_injury >= self.next_injury_interval {
            self.roll_injury(crew);
            self.time_since_injury = 0.0;
            self.next_injury_interval = self.sample_injury_interval();
        }
    }

    fn next_phase(&mut self) {
        let weights = self
            .state
            .phase_weights
            .and_then(|w| w.normalized())
            .or_else(|| self.config.default_weights.normalized())
            .unwrap_or([1.0, 0.0, 0.0]);

        let draw = self.rng.gen::<f32>();
        let mut cumulative = 0.0;
        let mut next = HazardPhase::Cruise;
        for (phase, weight) in HazardPhase::ALL.iter().zip(weights) {
            cumulative += weight;
            if weight > 0.0 {
                next = *phase;
            }
            if draw < cumulative {
                break;
            }
        }

        let range = match next {
            HazardPhase::Cruise => self.config.cruise_duration,
            HazardPhase::Flak => self.config.flak_duration,
            HazardPhase::Fighters => self.config.fighters_duration,
        };
        let duration = range.sample(&mut self.rng);
        let previous = self.state.current_phase;
        self.state.current_phase = next;
        self.state.phase_timer = 0.0;
        self.state.phase_duration = duration;

        if next == previous {
            debug!(phase = ?next, duration, "phase extended");
            return;
        }

        if next.is_hostile() {
            self.time_since_event = 0.0;
            self.next_event_interval = self.config.first_event_window.sample(&mut self.rng);
            self.time_since_injury = 0.0;
            self.next_injury_interval = self.sample_injury_interval();
        }
        self.announce(previous, next, duration);
    }

    fn announce(&mut self, from: HazardPhase, to: HazardPhase, duration: f32) {
        match to {
            HazardPhase::Cruise => self.stats.cruise_entries += 1,
            HazardPhase::Flak => self.stats.flak_entries += 1,
            HazardPhase::Fighters => self.stats.fighters_entries += 1,
        }
        if to.is_hostile() {
            warn!(?from, ?to, duration, danger = self.danger, "hazard phase");
        } else {
            info!(?from, ?to, duration, "hazard phase");
        }
        self.events.push(HazardEvent::PhaseChanged { from, to, duration });
    }

    /// Draws the wait until the next strike from the danger-scaled mean.
    pub fn sample_event_interval(&mut self) -> f32 {
        let mean = self.config.event_interval.at(self.danger);
        self.sample_interval(mean)
    }

    pub fn sample_injury_interval(&mut self) -> f32 {
        let mean = self.config.injury_interval.at(self.danger);
        self.sample_interval(mean)
    }

    fn sample_interval(&mut self, mean: f32) -> f32 {
        let interval = match self.config.interval_strategy {
            IntervalStrategy::Exponential => {
                // 1 - U lies in (0, 1], keeping ln finite.
                let u: f32 = 1.0 - self.rng.gen::<f32>();
                -u.ln() * mean
            }
            IntervalStrategy::Jitter => {
                let jitter = self.config.jitter_fraction;
                mean * (1.0 + self.rng.gen_range(-jitter..=jitter))
            }
        };
        interval.max(self.config.min_event_interval)
    }

    fn jittered(&mut self, value: f32) -> f32 {
        let jitter = self.config.damage_jitter;
        if jitter <= 0.0 {
            return value;
        }
        (value * (1.0 + self.rng.gen_range(-jitter..=jitter))).max(0.0)
    }

    fn random_engine(&mut self, vehicle: &VehicleState) -> Option<String> {
        let engines: Vec<&str> = vehicle.engines().map(|e| e.id()).collect();
        if engines.is_empty() {
            return None;
        }
        Some(engines[self.rng.gen_range(0..engines.len())].to_string())
    }

    fn strike(
        &mut self,
        kind: StrikeKind,
        vehicle: &mut VehicleState,
        engine_weight: f32,
        damage: f32,
        fire_chance: f32,
    ) {
        let engine = if self.rng.gen::<f32>() < engine_weight {
            self.random_engine(vehicle)
        } else {
            None
        };

        let (target, is_engine) = match engine {
            Some(engine) => {
                vehicle.apply_engine_hit(&engine, damage, fire_chance);
                self.stats.engine_hits += 1;
                (engine, true)
            }
            None => {
                let Some(section) = vehicle.apply_random_hit(damage, true, fire_chance) else {
                    return;
                };
                self.stats.section_hits += 1;
                (section, false)
            }
        };

        info!(?kind, target = %target, engine = is_engine, damage, "strike");
        self.events.push(HazardEvent::Strike {
            kind,
            target,
            engine: is_engine,
            damage,
            fire_chance,
        });
    }

    fn flak_strike(&mut self, vehicle: &mut VehicleState) {
        let engine_weight = self.config.engine_damage_weight.at(self.danger);
        let damage = self.config.plane_damage.at(self.danger);
        let damage = self.jittered(damage);
        let fire_chance = self.config.fire_weight.at(self.danger);

        self.stats.flak_strikes += 1;
        self.strike(StrikeKind::Flak, vehicle, engine_weight, damage, fire_chance);
    }

    /// One or two strafing passes, each lighter than a flak burst but more
    /// likely to find an engine.
    fn fighter_attack(&mut self, vehicle: &mut VehicleState) {
        let passes = if self.rng.gen::<f32>() < self.config.fighter_second_pass_chance {
            2
        } else {
            1
        };

        for _ in 0..passes {
            let engine_weight =
                (self.config.engine_damage_weight.at(self.danger) * self.config.fighter_engine_bias).min(1.0);
            let damage = self.config.plane_damage.at(self.danger) * self.config.fighter_damage_scale;
            let damage = self.jittered(damage);
            let fire_chance = (self.config.fire_weight.at(self.danger) * self.config.fighter_fire_scale).min(1.0);

            self.stats.fighter_passes += 1;
            self.strike(StrikeKind::Fighter, vehicle, engine_weight, damage, fire_chance);
        }
    }

    /// Severity from the three danger-scaled weights, via one cumulative draw.
    pub fn pick_severity(&mut self) -> InjurySeverity {
        let weights = [
            self.config.light_injury_weight.at(self.danger).max(0.0),
            self.config.serious_injury_weight.at(self.danger).max(0.0),
            self.config.critical_injury_weight.at(self.danger).max(0.0),
        ];
        let total: f32 = weights.iter().sum();
        if total <= 0.0 {
            return InjurySeverity::Light;
        }

        let draw = self.rng.gen::<f32>();
        let mut cumulative = 0.0;
        for (severity, weight) in [
            InjurySeverity::Light,
            InjurySeverity::Serious,
            InjurySeverity::Critical,
        ]
        .into_iter()
        .zip(weights)
        {
            cumulative += weight / total;
            if draw < cumulative {
                return severity;
            }
        }
        InjurySeverity::Critical
    }

    fn roll_injury(&mut self, crew: &mut CrewState) {
        if self.rng.gen::<f32>() >= self.config.crew_injury_weight.at(self.danger) {
            return;
        }
        let healthy = crew.healthy_crew_ids();
        if healthy.is_empty() {
            return;
        }

        let victim = healthy[self.rng.gen_range(0..healthy.len())].clone();
        let severity = self.pick_severity();
        if !crew.apply_injury(&victim, severity) {
            return;
        }

        match severity {
            InjurySeverity::Light => self.stats.light_injuries += 1,
            InjurySeverity::Serious => self.stats.serious_injuries += 1,
            InjurySeverity::Critical => self.stats.critical_injuries += 1,
        }
        warn!(crew = %victim, ?severity, "crew hit");
        self.events.push(HazardEvent::InjuryInflicted {
            crew: victim,
            severity,
        });
    }
}
