//! Simulation clock.
//!
//! One step runs: travel, crew, vehicle, hazard, scripted-command release,
//! command queue. Signals are published to the [`EventBus`] only after the
//! whole step has run, so listeners always observe a consistent state.

use crate::command_queue::{CommandError, CommandQueue, CrewCommand};
use crate::config::{ConfigError, SimConfig};
use crate::crew::CrewState;
use crate::events::{EventBus, Listener, SimEvent};
use crate::hazard::HazardScheduler;
use crate::layout::{PositionService, StaticLayout};
use crate::protocol::{CommandEnvelope, CommandOutcome, OutcomeStatus, ProtocolError, ProtocolHandler};
use crate::roster::Roster;
use crate::scheduler::{CommandScheduler, ScheduleError};
use crate::telemetry::{SimSnapshot, SnapshotSources, TelemetryCollector};
use crate::travel::{LegConfig, TimedLeg, TravelFeed};
use crate::vehicle::VehicleState;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, trace, warn};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("script line {line}: {source}")]
    Script {
        line: usize,
        #[source]
        source: ProtocolError,
    },
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

#[derive(Debug)]
pub struct Simulation {
    config: SimConfig,
    vehicle: VehicleState,
    crew: CrewState,
    hazard: HazardScheduler,
    queue: CommandQueue,
    scheduler: CommandScheduler,
    protocol: ProtocolHandler,
    travel: Box<dyn TravelFeed>,
    telemetry: TelemetryCollector,
    bus: EventBus,
    steps: u64,
    time: f32,
    leg_complete: bool,
}

impl Simulation {
    pub fn new(
        config: SimConfig,
        roster: Roster,
        positions: Arc<dyn PositionService>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        check_roster(&roster, positions.as_ref())?;

        let seed = config.seed;
        let section_order = positions.ordered_section_ids().to_vec();
        let vehicle = VehicleState::new(&roster, section_order, config.vehicle.clone(), seed);
        let crew = CrewState::new(&roster, config.crew.clone(), positions, seed.wrapping_add(1));
        let hazard = HazardScheduler::new(config.hazard.clone(), seed.wrapping_add(2));
        let leg = LegConfig::default();

        info!(
            seed,
            sections = roster.sections.len(),
            systems = roster.systems.len(),
            crew = roster.crew.len(),
            "simulation created"
        );

        let mut simulation = Self {
            telemetry: TelemetryCollector::new(config.telemetry_interval_seconds),
            config,
            vehicle,
            crew,
            hazard,
            queue: CommandQueue::new(),
            scheduler: CommandScheduler::new(),
            protocol: ProtocolHandler::new(),
            travel: Box::new(TimedLeg::new(leg.duration_seconds)),
            bus: EventBus::new(),
            steps: 0,
            time: 0.0,
            leg_complete: false,
        };
        simulation.begin_leg(&leg);
        Ok(simulation)
    }

    /// Default heavy-bomber roster and layout.
    pub fn with_b17(config: SimConfig) -> Result<Self, ConfigError> {
        Self::new(config, Roster::b17(), Arc::new(StaticLayout::b17()))
    }

    /// Configures danger bounds and phase weights, and restarts the travel feed.
    pub fn begin_leg(&mut self, leg: &LegConfig) {
        self.hazard
            .configure_leg(leg.start_danger, leg.end_danger, leg.phase_weights);
        self.travel = Box::new(TimedLeg::new(leg.duration_seconds));
        self.leg_complete = false;
        self.flush_events();
    }

    /// Replaces the travel feed, keeping the current danger bounds.
    pub fn set_travel_feed(&mut self, feed: Box<dyn TravelFeed>) {
        self.leg_complete = feed.is_complete();
        self.travel = feed;
    }

    /// Runs one step with the configured tick length.
    pub fn tick(&mut self) -> Option<SimSnapshot> {
        self.step(self.config.tick_seconds)
    }

    /// Advances the whole simulation by `dt` seconds. Returns a snapshot
    /// when telemetry is due.
    pub fn step(&mut self, dt: f32) -> Option<SimSnapshot> {
        if dt <= 0.0 || self.vehicle.is_crashed() {
            return None;
        }
        self.steps += 1;
        self.time += dt;

        self.travel.advance(dt);
        let progress = self.travel.leg_progress();

        self.crew.tick(dt, &mut self.vehicle);
        self.vehicle.tick(dt);
        self.hazard
            .tick(dt, progress, &mut self.vehicle, &mut self.crew);

        for envelope in self.scheduler.get_ready_commands(self.time) {
            let crew = envelope.command.issuer().to_string();
            if let Err(e) = self.queue.enqueue_with_id(envelope.id, envelope.command) {
                self.queue.record_rejection(envelope.id, crew, &e);
            }
        }
        self.queue.tick(&mut self.crew, &self.vehicle);

        self.flush_events();
        trace!(step = self.steps, time = self.time, progress, "step");

        if self.vehicle.is_crashed() {
            warn!(time = self.time, step = self.steps, "bomber lost");
        }
        if !self.leg_complete && self.travel.is_complete() {
            self.leg_complete = true;
            info!(time = self.time, "leg complete");
        }

        if self.telemetry.advance(dt) {
            return Some(self.telemetry.sample(&SnapshotSources {
                step: self.steps,
                time: self.time,
                leg_progress: progress,
                vehicle: &self.vehicle,
                crew: &self.crew,
                hazard: &self.hazard,
                queue: &self.queue,
                scheduler: &self.scheduler,
            }));
        }
        None
    }

    /// Steps until `seconds` of sim time have passed, the leg completes or
    /// the bomber is lost. Returns every snapshot taken on the way.
    pub fn run_for(&mut self, seconds: f32) -> Vec<SimSnapshot> {
        let until = self.time + seconds;
        let mut snapshots = Vec::new();
        while self.time < until && !self.is_crashed() && !self.is_leg_complete() {
            if let Some(snapshot) = self.tick() {
                snapshots.push(snapshot);
            }
        }
        snapshots
    }

    /// Snapshot of the current state, outside the telemetry cadence.
    pub fn snapshot(&mut self) -> SimSnapshot {
        let progress = self.travel.leg_progress();
        self.telemetry.sample(&SnapshotSources {
            step: self.steps,
            time: self.time,
            leg_progress: progress,
            vehicle: &self.vehicle,
            crew: &self.crew,
            hazard: &self.hazard,
            queue: &self.queue,
            scheduler: &self.scheduler,
        })
    }

    /// Queues a command for validation at the end of the next step.
    pub fn queue_command(&mut self, command: CrewCommand) -> Result<u32, CommandError> {
        self.queue.enqueue(command)
    }

    /// Holds a command until its `at_seconds` (or the next step if untagged).
    pub fn schedule_command(&mut self, envelope: CommandEnvelope) -> Result<(), ScheduleError> {
        self.scheduler.schedule_command(envelope, self.time)
    }

    /// Accepts one JSON command envelope.
    pub fn submit_json(&mut self, json: &str) -> Result<CommandOutcome, SimulationError> {
        let envelope = self.protocol.parse_command(json)?;
        let id = envelope.id;
        self.schedule_command(envelope)?;
        Ok(self.protocol.create_outcome(id, OutcomeStatus::Scheduled, None))
    }

    /// Schedules every command of a JSON-lines script. Nothing is scheduled
    /// if any line fails to parse.
    pub fn load_script(&mut self, text: &str) -> Result<usize, SimulationError> {
        let envelopes = self
            .protocol
            .parse_script(text)
            .map_err(|(line, source)| SimulationError::Script { line, source })?;
        let count = envelopes.len();
        for envelope in envelopes {
            self.schedule_command(envelope)?;
        }
        info!(count, "script loaded");
        Ok(count)
    }

    pub fn subscribe(&mut self, listener: Listener) {
        self.bus.subscribe(listener);
    }

    /// Pushes new tunables to every component.
    pub fn update_config(&mut self, config: SimConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.vehicle.update_config(config.vehicle.clone());
        self.crew.update_config(config.crew.clone());
        self.hazard.update_config(config.hazard.clone());
        self.telemetry.set_interval(config.telemetry_interval_seconds);
        self.config = config;
        Ok(())
    }

    fn flush_events(&mut self) {
        let events = self
            .crew
            .drain_events()
            .into_iter()
            .map(SimEvent::Crew)
            .chain(self.vehicle.drain_events().into_iter().map(SimEvent::Vehicle))
            .chain(self.hazard.drain_events().into_iter().map(SimEvent::Hazard))
            .chain(self.queue.drain_events().into_iter().map(SimEvent::Command));
        self.bus.publish_all(self.steps, self.time, events);
    }

    pub fn is_crashed(&self) -> bool {
        self.vehicle.is_crashed()
    }

    pub fn is_leg_complete(&self) -> bool {
        self.leg_complete
    }

    pub fn leg_progress(&self) -> f32 {
        self.travel.leg_progress()
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn step_count(&self) -> u64 {
        self.steps
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn vehicle(&self) -> &VehicleState {
        &self.vehicle
    }

    pub fn vehicle_mut(&mut self) -> &mut VehicleState {
        &mut self.vehicle
    }

    pub fn crew(&self) -> &CrewState {
        &self.crew
    }

    pub fn crew_mut(&mut self) -> &mut CrewState {
        &mut self.crew
    }

    pub fn hazard(&self) -> &HazardScheduler {
        &self.hazard
    }

    pub fn hazard_mut(&mut self) -> &mut HazardScheduler {
        &mut self.hazard
    }

    pub fn command_queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn scheduler(&self) -> &CommandScheduler {
        &self.scheduler
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }
}

/// Every id a roster references must resolve, and the layout's fuselage
/// order must name real sections.
fn check_roster(roster: &Roster, positions: &dyn PositionService) -> Result<(), ConfigError> {
    let invalid = |message: String| Err(ConfigError::Invalid(message));

    let mut sections = HashSet::new();
    for section in &roster.sections {
        if !sections.insert(section.id.as_str()) {
            return invalid(format!("duplicate section {}", section.id));
        }
    }

    let mut systems = HashSet::new();
    for system in &roster.systems {
        if !systems.insert(system.id.as_str()) {
            return invalid(format!("duplicate system {}", system.id));
        }
        if !sections.contains(system.section_id.as_str()) {
            return invalid(format!("system {} sits in unknown section {}", system.id, system.section_id));
        }
    }

    let mut stations = HashSet::new();
    for station in &roster.stations {
        if !stations.insert(station.id.as_str()) {
            return invalid(format!("duplicate station {}", station.id));
        }
        if !sections.contains(station.section_id.as_str()) {
            return invalid(format!("station {} sits in unknown section {}", station.id, station.section_id));
        }
    }

    let mut crew = HashSet::new();
    for member in &roster.crew {
        if !crew.insert(member.id.as_str()) {
            return invalid(format!("duplicate crew member {}", member.id));
        }
        if !stations.contains(member.station_id.as_str()) {
            return invalid(format!("crew member {} has unknown station {}", member.id, member.station_id));
        }
        if let Some(speed) = member.move_speed {
            if speed.is_nan() || speed <= 0.0 {
                return invalid(format!("crew member {} has non-positive move speed", member.id));
            }
        }
    }

    for id in positions.ordered_section_ids() {
        if !sections.contains(id.as_str()) {
            return invalid(format!("layout orders unknown section {id}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::CrewDef;

    #[test]
    fn test_b17_builds() {
        let sim = Simulation::with_b17(SimConfig::default()).unwrap();
        assert_eq!(sim.crew().members().len(), 10);
        assert_eq!(sim.vehicle().engines().count(), 4);
        assert_eq!(sim.step_count(), 0);
    }

    #[test]
    fn test_roster_with_dangling_station_rejected() {
        let mut roster = Roster::b17();
        roster.crew.push(CrewDef {
            id: "BallGunner".to_string(),
            name: "Ball Turret".to_string(),
            role: crate::crew::CrewRole::BallTurretGunner,
            station_id: "BallTurret".to_string(),
            move_speed: None,
        });
        let result = Simulation::new(SimConfig::default(), roster, Arc::new(StaticLayout::b17()));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_dt_is_a_no_op() {
        let mut sim = Simulation::with_b17(SimConfig::default()).unwrap();
        assert!(sim.step(0.0).is_none());
        assert_eq!(sim.step_count(), 0);
        assert_eq!(sim.time(), 0.0);
    }
}
